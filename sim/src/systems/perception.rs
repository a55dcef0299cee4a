//! Read-phase consumers of the quad field.
//!
//! Both systems only take `Res<QuadField>` and write disjoint components, so
//! the executor is free to run them side by side.
//!
//! ## Parallel Feature
//!
//! When compiled with `--features parallel`, the threat gather phase fans the
//! per-unit queries out over rayon. Results are collected in unit order and
//! applied sequentially, so the outcome does not depend on thread count.

use crate::components::*;
use crate::field::QuadField;
use crate::query::DistanceMode;
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Input for one unit's threat scan.
struct ThreatProbe {
    entity: Entity,
    team: TeamId,
    pos: Vec3,
    range: f32,
}

/// Scan for enemies around one unit. Pure, safe to call from any thread.
fn scan_threats(field: &QuadField, probe: &ThreatProbe) -> ThreatAwareness {
    let mut awareness = ThreatAwareness::default();
    awareness.clear();

    let enemies =
        field.get_enemy_units_exact(probe.pos, probe.range, probe.team, DistanceMode::Cylindrical);
    awareness.enemies_in_range = enemies.len() as u32;

    for id in enemies {
        let Some(enemy) = field.tracker().unit(id) else {
            continue;
        };
        let dx = enemy.pos.x - probe.pos.x;
        let dz = enemy.pos.z - probe.pos.z;
        let dist = (dx * dx + dz * dz).sqrt();
        let closer = match awareness.nearest_enemy {
            None => true,
            Some(best) => {
                dist < awareness.nearest_enemy_dist
                    || (dist == awareness.nearest_enemy_dist && id < best)
            }
        };
        if closer {
            awareness.nearest_enemy = Some(id);
            awareness.nearest_enemy_dist = dist;
        }
    }
    awareness
}

/// System that refreshes every unit's view of nearby enemies.
///
/// - Reads: QuadField, Unit, Position, SensorRange
/// - Writes: ThreatAwareness
pub fn threat_awareness_system(
    field: Res<QuadField>,
    mut query: Query<(Entity, &Unit, &Position, &SensorRange, &mut ThreatAwareness)>,
) {
    // GATHER PHASE
    let mut probes: Vec<(UnitId, ThreatProbe)> = query
        .iter()
        .map(|(entity, unit, pos, range, _)| {
            (
                unit.id,
                ThreatProbe {
                    entity,
                    team: unit.team,
                    pos: pos.0,
                    range: range.0,
                },
            )
        })
        .collect();
    probes.sort_unstable_by_key(|(id, _)| *id);

    // COMPUTE PHASE
    let field: &QuadField = &field;

    #[cfg(feature = "parallel")]
    let results: Vec<ThreatAwareness> = probes
        .par_iter()
        .map(|(_, probe)| scan_threats(field, probe))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<ThreatAwareness> = probes
        .iter()
        .map(|(_, probe)| scan_threats(field, probe))
        .collect();

    // APPLY PHASE
    for ((_, probe), result) in probes.iter().zip(results) {
        if let Ok((_, _, _, _, mut awareness)) = query.get_mut(probe.entity) {
            if *awareness != result {
                *awareness = result;
            }
        }
    }
}

/// System that records which units each projectile passed through this tick.
///
/// The path is the segment from last tick's position to the current one.
pub fn projectile_impact_system(
    field: Res<QuadField>,
    dt: Res<DeltaTime>,
    mut query: Query<(&Position, &Velocity, &mut ProjectileHits), With<Projectile>>,
) {
    for (pos, vel, mut hits) in query.iter_mut() {
        let travel = vel.0 * dt.0;
        let units = field.get_units_on_ray(pos.0 - travel, travel, travel.length());
        if hits.units != units {
            hits.units = units;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_with_units() -> QuadField {
        let mut field = QuadField::new(2048.0, 2048.0, 2).unwrap();
        field.add_unit(UnitId(1), TeamId(0), Vec3::new(100.0, 0.0, 100.0), 5.0);
        field.add_unit(UnitId(2), TeamId(1), Vec3::new(400.0, 0.0, 100.0), 5.0);
        field.add_unit(UnitId(3), TeamId(1), Vec3::new(100.0, 0.0, 300.0), 5.0);
        field.add_unit(UnitId(4), TeamId(0), Vec3::new(130.0, 0.0, 100.0), 5.0);
        field
    }

    #[test]
    fn test_scan_threats_picks_nearest_enemy() {
        let field = field_with_units();
        let probe = ThreatProbe {
            entity: Entity::from_raw(0),
            team: TeamId(0),
            pos: Vec3::new(100.0, 0.0, 100.0),
            range: 400.0,
        };
        let awareness = scan_threats(&field, &probe);
        assert_eq!(awareness.enemies_in_range, 2);
        assert_eq!(awareness.nearest_enemy, Some(UnitId(3)));
        assert!((awareness.nearest_enemy_dist - 200.0).abs() < 0.001);
    }

    #[test]
    fn test_scan_threats_tie_breaks_by_id() {
        let mut field = QuadField::new(1024.0, 1024.0, 2).unwrap();
        field.add_unit(UnitId(8), TeamId(1), Vec3::new(600.0, 0.0, 500.0), 1.0);
        field.add_unit(UnitId(5), TeamId(1), Vec3::new(400.0, 0.0, 500.0), 1.0);
        let probe = ThreatProbe {
            entity: Entity::from_raw(0),
            team: TeamId(0),
            pos: Vec3::new(500.0, 0.0, 500.0),
            range: 200.0,
        };
        assert_eq!(scan_threats(&field, &probe).nearest_enemy, Some(UnitId(5)));
    }

    #[test]
    fn test_no_enemies_in_range() {
        let field = field_with_units();
        let probe = ThreatProbe {
            entity: Entity::from_raw(0),
            team: TeamId(1),
            pos: Vec3::new(1800.0, 0.0, 1800.0),
            range: 100.0,
        };
        let awareness = scan_threats(&field, &probe);
        assert!(!awareness.has_enemy_contact());
        assert_eq!(awareness.enemies_in_range, 0);
    }

    #[test]
    fn test_projectile_impact_system() {
        let mut world = World::new();
        world.insert_resource(field_with_units());
        world.insert_resource(DeltaTime(0.5));
        let shell = world
            .spawn((
                Projectile { id: ProjectileId(1) },
                Position::new(500.0, 0.0, 100.0),
                Velocity::new(800.0, 0.0, 0.0),
                ProjectileHits::default(),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(projectile_impact_system);
        schedule.run(&mut world);

        // Path runs from x=100 to x=500 along z=100.
        let hits = world.get::<ProjectileHits>(shell).unwrap();
        assert_eq!(hits.units, vec![UnitId(1), UnitId(4), UnitId(2)]);
    }
}
