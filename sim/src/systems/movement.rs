//! Movement system - integrates velocity into position.

use crate::components::*;
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// System that applies velocity to position.
///
/// Stationary entities are skipped so their `Position` is not flagged as
/// changed and the quad field sync leaves them alone.
pub fn movement_system(dt: Res<DeltaTime>, mut query: Query<(&mut Position, &Velocity)>) {
    let delta = dt.0;
    for (mut pos, vel) in query.iter_mut() {
        if !vel.is_moving() {
            continue;
        }
        pos.0 += vel.0 * delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_applies_velocity() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.5));

        world.spawn((Position::new(0.0, 10.0, 0.0), Velocity::new(4.0, -2.0, 6.0)));

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(&mut world);

        let mut query = world.query::<&Position>();
        let pos = query.single(&world);
        assert!((pos.0.x - 2.0).abs() < 0.001);
        assert!((pos.0.y - 9.0).abs() < 0.001);
        assert!((pos.0.z - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_stationary_entity_not_marked_changed() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));
        world.spawn((Position::new(1.0, 0.0, 1.0), Velocity::default()));

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(&mut world);
        world.clear_trackers();

        schedule.run(&mut world);
        let mut changed = world.query_filtered::<&Position, Changed<Position>>();
        assert_eq!(changed.iter(&world).count(), 0);
    }
}
