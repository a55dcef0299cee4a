//! ECS components for the quad field host simulation.
//!
//! Components are pure data containers attached to entities. The quad field
//! never reads them directly; the sync system copies position, radius and
//! team into the field during the mutation phase.

use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Stable identifier of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Stable identifier of a feature (trees, wrecks, rocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(pub u32);

/// Stable identifier of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectileId(pub u32);

/// Team a unit belongs to. Teams are numbered from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u8);

impl TeamId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World position (x = east/west, y = elevation, z = north/south).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec3);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

/// Velocity in world units per second.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

impl Velocity {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }

    pub fn is_moving(&self) -> bool {
        self.0 != Vec3::ZERO
    }
}

/// Bounding-sphere radius used for quad membership and exact queries.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionRadius(pub f32);

impl Default for CollisionRadius {
    fn default() -> Self {
        Self(8.0)
    }
}

// ============================================================================
// KIND COMPONENTS
// ============================================================================

/// Marks an entity as a unit indexed in the quad field.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub team: TeamId,
}

/// Marks an entity as a feature indexed in the quad field.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub id: FeatureId,
}

/// Marks an entity as a projectile indexed in the quad field.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    pub id: ProjectileId,
}

// ============================================================================
// PERCEPTION COMPONENTS
// ============================================================================

/// How far a unit looks for enemies.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorRange(pub f32);

impl Default for SensorRange {
    fn default() -> Self {
        Self(400.0)
    }
}

/// What a unit saw during the last read phase.
#[derive(Component, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatAwareness {
    /// Closest enemy unit, ties broken by lowest id.
    pub nearest_enemy: Option<UnitId>,
    /// Horizontal distance to `nearest_enemy`.
    pub nearest_enemy_dist: f32,
    /// Number of enemy units within sensor range.
    pub enemies_in_range: u32,
}

impl ThreatAwareness {
    pub fn has_enemy_contact(&self) -> bool {
        self.nearest_enemy.is_some()
    }

    pub fn clear(&mut self) {
        self.nearest_enemy = None;
        self.nearest_enemy_dist = f32::MAX;
        self.enemies_in_range = 0;
    }
}

/// Units whose bounding sphere a projectile's path crossed this tick.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ProjectileHits {
    pub units: Vec<UnitId>,
}

// ============================================================================
// BUNDLES
// ============================================================================

/// Bundle for spawning a unit.
#[derive(Bundle, Clone)]
pub struct UnitBundle {
    pub unit: Unit,
    pub position: Position,
    pub velocity: Velocity,
    pub radius: CollisionRadius,
    pub sensor: SensorRange,
    pub awareness: ThreatAwareness,
}

impl UnitBundle {
    pub fn new(id: UnitId, team: TeamId, position: Vec3, radius: f32) -> Self {
        Self {
            unit: Unit { id, team },
            position: Position(position),
            velocity: Velocity::default(),
            radius: CollisionRadius(radius),
            sensor: SensorRange::default(),
            awareness: ThreatAwareness::default(),
        }
    }
}

/// Bundle for spawning a feature. Features do not move on their own.
#[derive(Bundle, Clone)]
pub struct FeatureBundle {
    pub feature: Feature,
    pub position: Position,
    pub radius: CollisionRadius,
}

/// Bundle for spawning a projectile.
#[derive(Bundle, Clone)]
pub struct ProjectileBundle {
    pub projectile: Projectile,
    pub position: Position,
    pub velocity: Velocity,
    pub radius: CollisionRadius,
    pub hits: ProjectileHits,
}
