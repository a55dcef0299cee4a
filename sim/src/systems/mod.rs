//! ECS systems driving the quad field.
//!
//! ## Tick Phases
//!
//! Each fixed update runs three schedules back to back:
//!
//! **Motion** - entities move:
//! - `movement_system` - integrates velocity into position
//!
//! **Mutation** - the quad field catches up, single writer:
//! - `quad_field_sync_system` - applies spawns, moves and despawns
//!
//! **Read** - any number of readers, run in parallel:
//! - `threat_awareness_system` - enemy units within sensor range
//! - `projectile_impact_system` - units crossed by each projectile's path
//!
//! No reader runs while the field is being written and no writer runs while
//! readers are active. The schedule boundaries enforce this; the field itself
//! takes no locks.

pub mod movement;
pub mod perception;
pub mod quad_sync;

pub use movement::*;
pub use perception::*;
pub use quad_sync::*;
