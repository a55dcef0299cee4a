//! Error types for the quad field and the simulation host.
//!
//! Misuse of the mutation API (double add, moving an unregistered entity,
//! out-of-range quads) is a programming error and panics instead.

/// Errors raised while building a [`QuadField`](crate::QuadField).
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QuadFieldError {
    /// Map extents must be finite and strictly positive.
    #[error("invalid map size {width}x{depth}")]
    InvalidMapSize { width: f32, depth: f32 },

    /// At least one team is required for the per-team partitions.
    #[error("team count must be in 1..=256, got {0}")]
    InvalidTeamCount(usize),
}

/// Errors surfaced at the simulation session boundary.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The configured map or team layout was rejected.
    #[error("quad field: {0}")]
    QuadField(#[from] QuadFieldError),

    /// A config or snapshot document failed to parse.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// The fixed timestep must be finite and positive.
    #[error("invalid fixed timestep {0}")]
    InvalidTimestep(f32),
}
