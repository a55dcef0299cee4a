//! Public API for the simulation session.
//!
//! `SimWorld` owns the ECS world, the quad field resource and the three tick
//! schedules. Callers spawn and despawn entities through it, step it, and
//! read the quad field between steps.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 30 Hz). When
//! `step(dt)` is called, the simulation accumulates time and runs fixed
//! updates as needed, so every peer runs the same sequence of ticks
//! regardless of frame rate.

use crate::components::*;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::field::QuadField;
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use glam::Vec3;
use tracing::info;

/// The main simulation world container.
pub struct SimWorld {
    world: World,
    /// Moves entities.
    motion: Schedule,
    /// Sole writer of the quad field.
    mutation: Schedule,
    /// Parallel readers of the quad field.
    read: Schedule,
    tick: u64,
    time: f32,
    fixed_timestep: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create an empty simulation world.
    pub fn with_config(config: SimConfig) -> Result<Self, SimError> {
        if !(config.fixed_timestep.is_finite() && config.fixed_timestep > 0.0) {
            return Err(SimError::InvalidTimestep(config.fixed_timestep));
        }
        let field = QuadField::new(config.map_width, config.map_depth, config.num_teams)?;

        let mut world = World::new();
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(field);
        world.insert_resource(IndexedEntities::default());

        let mut motion = Schedule::default();
        motion.add_systems(movement_system);

        let mut mutation = Schedule::default();
        mutation.add_systems(quad_field_sync_system);

        let mut read = Schedule::default();
        read.set_executor_kind(ExecutorKind::MultiThreaded);
        read.add_systems((threat_awareness_system, projectile_impact_system));

        Ok(Self {
            world,
            motion,
            mutation,
            read,
            tick: 0,
            time: 0.0,
            fixed_timestep: config.fixed_timestep,
            time_accumulator: 0.0,
        })
    }

    /// Create a world from a JSON config document.
    pub fn from_json_config(data: &str) -> Result<Self, SimError> {
        Self::with_config(SimConfig::from_json(data)?)
    }

    /// Rebuild a session from a snapshot. The quad field is repopulated by
    /// adding every recorded entity, then the read phase runs once so derived
    /// components are current.
    pub fn restore(config: SimConfig, snapshot: &Snapshot) -> Result<Self, SimError> {
        let mut sim = Self::with_config(config)?;
        for u in &snapshot.units {
            let entity = sim.spawn_unit(u.id, u.team, u.pos, u.radius);
            sim.world
                .entity_mut(entity)
                .insert((Velocity(u.vel), SensorRange(u.sensor_range)));
        }
        for f in &snapshot.features {
            sim.spawn_feature(f.id, f.pos, f.radius);
        }
        for p in &snapshot.projectiles {
            sim.spawn_projectile(p.id, p.pos, p.vel, p.radius);
        }
        sim.sync();
        sim.read.run(&mut sim.world);
        sim.tick = snapshot.tick;
        sim.time = snapshot.time;

        let field = sim.quad_field();
        info!(
            tick = sim.tick,
            units = field.tracker().num_units(),
            features = field.tracker().num_features(),
            projectiles = field.tracker().num_projectiles(),
            "session restored"
        );
        Ok(sim)
    }

    /// Step the simulation by `dt` seconds of wall time.
    pub fn step(&mut self, dt: f32) {
        self.time_accumulator += dt;
        while self.time_accumulator >= self.fixed_timestep {
            self.fixed_update();
            self.time_accumulator -= self.fixed_timestep;
        }
    }

    /// Run exactly one fixed tick.
    pub fn fixed_update(&mut self) {
        self.world.resource_mut::<DeltaTime>().0 = self.fixed_timestep;

        self.motion.run(&mut self.world);
        self.mutation.run(&mut self.world);
        self.read.run(&mut self.world);
        self.world.clear_trackers();

        self.tick += 1;
        self.time += self.fixed_timestep;
    }

    /// Apply pending spawns, moves and despawns to the quad field without
    /// advancing time.
    pub fn sync(&mut self) {
        self.mutation.run(&mut self.world);
    }

    /// The quad field. Reflects entity state as of the last sync.
    pub fn quad_field(&self) -> &QuadField {
        self.world.resource::<QuadField>()
    }

    // ========================================================================
    // ENTITY LIFECYCLE
    // ========================================================================

    pub fn spawn_unit(&mut self, id: UnitId, team: TeamId, pos: Vec3, radius: f32) -> Entity {
        self.world.spawn(UnitBundle::new(id, team, pos, radius)).id()
    }

    pub fn spawn_feature(&mut self, id: FeatureId, pos: Vec3, radius: f32) -> Entity {
        self.world
            .spawn(FeatureBundle {
                feature: Feature { id },
                position: Position(pos),
                radius: CollisionRadius(radius),
            })
            .id()
    }

    pub fn spawn_projectile(&mut self, id: ProjectileId, pos: Vec3, vel: Vec3, radius: f32) -> Entity {
        self.world
            .spawn(ProjectileBundle {
                projectile: Projectile { id },
                position: Position(pos),
                velocity: Velocity(vel),
                radius: CollisionRadius(radius),
                hits: ProjectileHits::default(),
            })
            .id()
    }

    fn find_unit(&mut self, id: UnitId) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &Unit)>();
        query
            .iter(&self.world)
            .find(|(_, unit)| unit.id == id)
            .map(|(entity, _)| entity)
    }

    fn find_feature(&mut self, id: FeatureId) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &Feature)>();
        query
            .iter(&self.world)
            .find(|(_, feature)| feature.id == id)
            .map(|(entity, _)| entity)
    }

    fn find_projectile(&mut self, id: ProjectileId) -> Option<Entity> {
        let mut query = self.world.query::<(Entity, &Projectile)>();
        query
            .iter(&self.world)
            .find(|(_, projectile)| projectile.id == id)
            .map(|(entity, _)| entity)
    }

    /// Despawn a unit. Returns `false` if no such unit exists.
    pub fn despawn_unit(&mut self, id: UnitId) -> bool {
        self.find_unit(id).is_some_and(|e| self.world.despawn(e))
    }

    pub fn despawn_feature(&mut self, id: FeatureId) -> bool {
        self.find_feature(id).is_some_and(|e| self.world.despawn(e))
    }

    pub fn despawn_projectile(&mut self, id: ProjectileId) -> bool {
        self.find_projectile(id).is_some_and(|e| self.world.despawn(e))
    }

    /// Set a unit's velocity. Returns `false` if no such unit exists.
    pub fn set_unit_velocity(&mut self, id: UnitId, vel: Vec3) -> bool {
        let Some(entity) = self.find_unit(id) else {
            return false;
        };
        self.world.entity_mut(entity).insert(Velocity(vel));
        true
    }

    /// Move a unit instantly. Returns `false` if no such unit exists.
    pub fn teleport_unit(&mut self, id: UnitId, pos: Vec3) -> bool {
        let Some(entity) = self.find_unit(id) else {
            return false;
        };
        self.world.entity_mut(entity).insert(Position(pos));
        true
    }

    /// Threat awareness computed for a unit in the last read phase.
    pub fn threat_awareness(&mut self, id: UnitId) -> Option<ThreatAwareness> {
        let entity = self.find_unit(id)?;
        self.world.get::<ThreatAwareness>(entity).cloned()
    }

    /// Units a projectile passed through in the last read phase.
    pub fn projectile_hits(&mut self, id: ProjectileId) -> Option<Vec<UnitId>> {
        let entity = self.find_projectile(id)?;
        self.world.get::<ProjectileHits>(entity).map(|h| h.units.clone())
    }

    // ========================================================================
    // STATE
    // ========================================================================

    /// Get a snapshot of the live entities.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get current tick.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get current simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::DistanceMode;

    fn small_config() -> SimConfig {
        SimConfig {
            fixed_timestep: 0.1,
            map_width: 1024.0,
            map_depth: 1024.0,
            num_teams: 2,
        }
    }

    #[test]
    fn test_new_world() {
        let sim = SimWorld::with_config(SimConfig::default()).unwrap();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.quad_field().num_quads_x(), 32);
    }

    #[test]
    fn test_invalid_config() {
        let config = SimConfig {
            fixed_timestep: 0.0,
            ..small_config()
        };
        assert!(matches!(
            SimWorld::with_config(config),
            Err(SimError::InvalidTimestep(_))
        ));
        assert!(matches!(
            SimWorld::from_json_config(r#"{ "map_width": -5.0 }"#),
            Err(SimError::QuadField(_))
        ));
    }

    #[test]
    fn test_step_advances_tick() {
        let mut sim = SimWorld::with_config(small_config()).unwrap();
        sim.step(0.25);
        assert_eq!(sim.current_tick(), 2);
        sim.step(0.05);
        assert_eq!(sim.current_tick(), 3);
    }

    #[test]
    fn test_unit_crosses_quads_while_moving() {
        let mut sim = SimWorld::with_config(small_config()).unwrap();
        sim.spawn_unit(UnitId(1), TeamId(0), Vec3::new(10.0, 0.0, 10.0), 5.0);
        sim.sync();
        assert_eq!(sim.quad_field().quad_at(0, 0).units(), &[UnitId(1)]);

        sim.set_unit_velocity(UnitId(1), Vec3::new(2400.0, 0.0, 0.0));
        sim.fixed_update();
        assert!((sim.quad_field().tracker().unit(UnitId(1)).unwrap().pos.x - 250.0).abs() < 0.01);
        assert!(sim.quad_field().quad_at(0, 0).units().contains(&UnitId(1)));
        assert!(sim.quad_field().quad_at(1, 0).units().contains(&UnitId(1)));

        sim.teleport_unit(UnitId(1), Vec3::new(1000.0, 0.0, 10.0));
        sim.set_unit_velocity(UnitId(1), Vec3::ZERO);
        sim.fixed_update();
        let field = sim.quad_field();
        assert!(field.quad_at(0, 0).units().is_empty());
        assert!(field.quad_at(1, 0).units().is_empty());
        assert_eq!(field.quad_at(3, 0).units(), &[UnitId(1)]);
    }

    #[test]
    fn test_despawn_clears_membership() {
        let mut sim = SimWorld::with_config(small_config()).unwrap();
        sim.spawn_unit(UnitId(1), TeamId(1), Vec3::new(256.0, 0.0, 256.0), 100.0);
        sim.spawn_feature(FeatureId(1), Vec3::new(500.0, 0.0, 500.0), 30.0);
        sim.sync();

        assert!(sim.despawn_unit(UnitId(1)));
        assert!(!sim.despawn_unit(UnitId(1)));
        sim.sync();

        let field = sim.quad_field();
        assert!(!field.contains_unit(UnitId(1)));
        assert!(field.grid().iter().all(|q| q.units().is_empty()));
        assert!(field.contains_feature(FeatureId(1)));
    }

    #[test]
    fn test_threat_awareness_in_read_phase() {
        let mut sim = SimWorld::with_config(small_config()).unwrap();
        sim.spawn_unit(UnitId(1), TeamId(0), Vec3::new(100.0, 0.0, 100.0), 8.0);
        sim.spawn_unit(UnitId(2), TeamId(1), Vec3::new(300.0, 0.0, 100.0), 8.0);
        sim.spawn_unit(UnitId(3), TeamId(1), Vec3::new(900.0, 0.0, 900.0), 8.0);
        sim.fixed_update();

        let awareness = sim.threat_awareness(UnitId(1)).unwrap();
        assert_eq!(awareness.nearest_enemy, Some(UnitId(2)));
        assert_eq!(awareness.enemies_in_range, 1);

        let awareness = sim.threat_awareness(UnitId(3)).unwrap();
        assert!(!awareness.has_enemy_contact());
    }

    #[test]
    fn test_projectile_hits_in_read_phase() {
        let mut sim = SimWorld::with_config(small_config()).unwrap();
        sim.spawn_unit(UnitId(1), TeamId(0), Vec3::new(300.0, 0.0, 500.0), 10.0);
        sim.spawn_projectile(ProjectileId(1), Vec3::new(100.0, 0.0, 500.0), Vec3::new(3000.0, 0.0, 0.0), 1.0);
        sim.fixed_update();

        assert_eq!(sim.projectile_hits(ProjectileId(1)).unwrap(), vec![UnitId(1)]);
        let shell = sim.quad_field().tracker().projectile(ProjectileId(1)).unwrap();
        assert!((shell.pos.x - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_read_phase_runs_multi_threaded() {
        let sim = SimWorld::with_config(small_config()).unwrap();
        assert_eq!(sim.read.get_executor_kind(), ExecutorKind::MultiThreaded);
    }

    #[test]
    fn test_multi_threaded_read_matches_single_threaded() {
        let build = || {
            let mut sim = SimWorld::with_config(small_config()).unwrap();
            for i in 0..30u32 {
                let f = i as f32;
                sim.spawn_unit(
                    UnitId(i),
                    TeamId((i % 2) as u8),
                    Vec3::new((f * 97.0) % 1000.0, 0.0, (f * 61.0) % 1000.0),
                    8.0,
                );
            }
            sim.spawn_projectile(ProjectileId(1), Vec3::new(20.0, 0.0, 500.0), Vec3::new(4000.0, 0.0, 300.0), 1.0);
            sim
        };
        let mut threaded = build();
        let mut single = build();
        single.read.set_executor_kind(ExecutorKind::SingleThreaded);
        for _ in 0..3 {
            threaded.fixed_update();
            single.fixed_update();
        }

        for i in 0..30u32 {
            assert_eq!(threaded.threat_awareness(UnitId(i)), single.threat_awareness(UnitId(i)));
        }
        assert_eq!(
            threaded.projectile_hits(ProjectileId(1)),
            single.projectile_hits(ProjectileId(1))
        );
    }

    #[test]
    fn test_snapshot_restore_rebuilds_field() {
        let mut sim = SimWorld::with_config(small_config()).unwrap();
        sim.spawn_unit(UnitId(5), TeamId(1), Vec3::new(250.0, 0.0, 10.0), 5.0);
        sim.spawn_unit(UnitId(2), TeamId(0), Vec3::new(600.0, 20.0, 600.0), 40.0);
        sim.spawn_feature(FeatureId(1), Vec3::new(512.0, 0.0, 512.0), 64.0);
        sim.spawn_projectile(ProjectileId(3), Vec3::new(50.0, 80.0, 900.0), Vec3::new(10.0, 0.0, 0.0), 1.0);
        sim.set_unit_velocity(UnitId(2), Vec3::new(30.0, 0.0, -20.0));
        for _ in 0..5 {
            sim.fixed_update();
        }

        let snapshot = sim.snapshot();
        let json = snapshot.to_json().unwrap();
        let restored = SimWorld::restore(small_config(), &Snapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored.current_tick(), 5);
        let (a, b) = (sim.quad_field(), restored.quad_field());
        for q in 0..a.grid().num_quads() {
            assert_eq!(a.quad(q), b.quad(q), "quad {q} differs after restore");
        }
        let probe = Vec3::new(600.0, 0.0, 500.0);
        assert_eq!(
            a.get_units_exact(probe, 200.0, DistanceMode::Spherical),
            b.get_units_exact(probe, 200.0, DistanceMode::Spherical)
        );
    }

    #[test]
    fn test_identical_sessions_stay_identical() {
        let build = || {
            let mut sim = SimWorld::with_config(small_config()).unwrap();
            for i in 0..40u32 {
                let f = i as f32;
                sim.spawn_unit(
                    UnitId(i),
                    TeamId((i % 2) as u8),
                    Vec3::new(20.0 + f * 24.0, 0.0, 1000.0 - f * 23.0),
                    6.0 + (i % 5) as f32,
                );
                sim.set_unit_velocity(UnitId(i), Vec3::new((f * 7.0) % 50.0 - 25.0, 0.0, (f * 13.0) % 40.0 - 20.0));
            }
            for _ in 0..30 {
                sim.fixed_update();
            }
            sim
        };
        let (a, b) = (build(), build());
        for q in 0..a.quad_field().grid().num_quads() {
            assert_eq!(a.quad_field().quad(q), b.quad_field().quad(q));
        }
    }
}
