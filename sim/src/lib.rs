//! Quad Field - Simulation Core
//!
//! A deterministic uniform-grid spatial index for lockstep simulations,
//! hosted in a `bevy_ecs` world. Units, features and projectiles are indexed
//! by stable identifiers in fixed-size quads and kept current by incremental
//! per-tick reconciliation; circle, rectangle, ray and exact queries run
//! concurrently between mutation phases.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod field;
pub mod membership;
pub mod quad;
pub mod query;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use components::*;
pub use config::SimConfig;
pub use error::{QuadFieldError, SimError};
pub use field::QuadField;
pub use membership::{MembershipTracker, TrackedObject, TrackedUnit};
pub use quad::{Quad, QuadGrid, QUAD_SIZE};
pub use query::{DistanceMode, SolidRef};
pub use systems::*;
pub use world::Snapshot;
