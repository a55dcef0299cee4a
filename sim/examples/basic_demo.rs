//! Basic demonstration of the quad field.
//!
//! Run with: RUST_LOG=quadfield=debug cargo run --example basic_demo

use glam::Vec3;
use quadfield::{DistanceMode, ProjectileId, SimConfig, SimWorld, TeamId, UnitId};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Quad Field - Simulation Demo ===\n");

    let config = SimConfig {
        map_width: 2048.0,
        map_depth: 2048.0,
        ..SimConfig::default()
    };
    let mut sim = SimWorld::with_config(config.clone())?;

    // Two lines of units closing on each other
    for i in 0..6u32 {
        let z = 400.0 + i as f32 * 120.0;
        sim.spawn_unit(UnitId(i), TeamId(0), Vec3::new(200.0, 0.0, z), 12.0);
        sim.set_unit_velocity(UnitId(i), Vec3::new(60.0, 0.0, 0.0));
        sim.spawn_unit(UnitId(100 + i), TeamId(1), Vec3::new(1800.0, 0.0, z), 12.0);
        sim.set_unit_velocity(UnitId(100 + i), Vec3::new(-60.0, 0.0, 0.0));
    }
    sim.spawn_projectile(
        ProjectileId(1),
        Vec3::new(100.0, 30.0, 400.0),
        Vec3::new(400.0, 0.0, 0.0),
        1.0,
    );

    println!("Running simulation for 300 ticks (10 seconds at 30 ticks/sec)...\n");
    for tick in 0..300 {
        sim.step(1.0 / 30.0);

        if (tick + 1) % 60 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_state(&mut sim);
        }
    }

    let field = sim.quad_field();
    let centre = Vec3::new(1024.0, 0.0, 700.0);
    println!(
        "\nUnits within 300 of centre: {:?}",
        field.get_units_exact(centre, 300.0, DistanceMode::Cylindrical)
    );
    println!(
        "Quads on diagonal ray: {:?}",
        field.get_quads_on_ray(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0), 2000.0)
    );

    // Save and rebuild the session from its entities
    let snapshot = sim.snapshot();
    let restored = SimWorld::restore(config, &snapshot)?;
    println!(
        "\nRestored {} units at tick {}",
        restored.quad_field().tracker().num_units(),
        restored.current_tick()
    );

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", snapshot.to_json_pretty()?);
    Ok(())
}

fn print_state(sim: &mut SimWorld) {
    for id in [UnitId(0), UnitId(100)] {
        if let Some(awareness) = sim.threat_awareness(id) {
            let pos = sim.quad_field().tracker().unit(id).map(|u| u.pos).unwrap_or_default();
            println!(
                "  Unit {}: pos=({:.0}, {:.0}) quads={:?} enemies={} nearest={:?}",
                id.0,
                pos.x,
                pos.z,
                sim.quad_field().unit_footprint(id).unwrap_or(&[]),
                awareness.enemies_in_range,
                awareness.nearest_enemy.map(|e| e.0)
            );
        }
    }
    if let Some(hits) = sim.projectile_hits(ProjectileId(1)) {
        println!("  Projectile 1 crossed: {:?}", hits);
    }
}
