//! Snapshots of the live entity set.
//!
//! A snapshot records entity state, never quad contents. Restoring a session
//! spawns the recorded entities and lets the sync system rebuild the quad
//! field by adding each one, so the index can never disagree with the
//! entities it describes.

use crate::components::*;
use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Snapshot of a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub team: TeamId,
    pub pos: Vec3,
    pub vel: Vec3,
    pub radius: f32,
    pub sensor_range: f32,
}

/// Snapshot of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub id: FeatureId,
    pub pos: Vec3,
    pub radius: f32,
}

/// Snapshot of a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: ProjectileId,
    pub pos: Vec3,
    pub vel: Vec3,
    pub radius: f32,
}

/// Complete simulation state snapshot. Entities are listed in id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub units: Vec<UnitSnapshot>,
    pub features: Vec<FeatureSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut units: Vec<UnitSnapshot> = world
            .query::<(&Unit, &Position, Option<&Velocity>, &CollisionRadius, Option<&SensorRange>)>()
            .iter(world)
            .map(|(unit, pos, vel, radius, sensor)| UnitSnapshot {
                id: unit.id,
                team: unit.team,
                pos: pos.0,
                vel: vel.map_or(Vec3::ZERO, |v| v.0),
                radius: radius.0,
                sensor_range: sensor.copied().unwrap_or_default().0,
            })
            .collect();
        units.sort_by_key(|u| u.id);

        let mut features: Vec<FeatureSnapshot> = world
            .query::<(&Feature, &Position, &CollisionRadius)>()
            .iter(world)
            .map(|(feature, pos, radius)| FeatureSnapshot {
                id: feature.id,
                pos: pos.0,
                radius: radius.0,
            })
            .collect();
        features.sort_by_key(|f| f.id);

        let mut projectiles: Vec<ProjectileSnapshot> = world
            .query::<(&Projectile, &Position, Option<&Velocity>, &CollisionRadius)>()
            .iter(world)
            .map(|(projectile, pos, vel, radius)| ProjectileSnapshot {
                id: projectile.id,
                pos: pos.0,
                vel: vel.map_or(Vec3::ZERO, |v| v.0),
                radius: radius.0,
            })
            .collect();
        projectiles.sort_by_key(|p| p.id);

        Self {
            tick,
            time,
            units,
            features,
            projectiles,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a snapshot from a JSON string.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_sorted_by_id() {
        let mut world = World::new();
        for id in [4, 1, 3] {
            world.spawn(UnitBundle::new(UnitId(id), TeamId(0), Vec3::new(id as f32, 0.0, 0.0), 2.0));
        }
        world.spawn(FeatureBundle {
            feature: Feature { id: FeatureId(7) },
            position: Position::new(5.0, 0.0, 5.0),
            radius: CollisionRadius(12.0),
        });

        let snapshot = Snapshot::from_world(&mut world, 3, 0.1);
        let ids: Vec<u32> = snapshot.units.iter().map(|u| u.id.0).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(snapshot.features.len(), 1);
        assert_eq!(snapshot.features[0].radius, 12.0);
        assert!(snapshot.projectiles.is_empty());
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let snapshot = Snapshot {
            tick: 42,
            time: 1.4,
            units: vec![UnitSnapshot {
                id: UnitId(1),
                team: TeamId(1),
                pos: Vec3::new(10.0, 2.0, 20.0),
                vel: Vec3::new(1.0, 0.0, 0.0),
                radius: 8.0,
                sensor_range: 300.0,
            }],
            features: vec![],
            projectiles: vec![],
        };

        let json = snapshot.to_json().unwrap();
        let restored = Snapshot::from_json(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
