//! Session configuration.

use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// Configuration for a simulation session.
///
/// Missing fields in a JSON document fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Map extent along x in world units.
    pub map_width: f32,
    /// Map extent along z in world units.
    pub map_depth: f32,
    /// Number of teams. Fixed for the session.
    pub num_teams: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            map_width: 8192.0,          // 32 quads
            map_depth: 8192.0,
            num_teams: 2,
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON.
    pub fn from_json(data: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Serialize the config to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json(r#"{ "map_width": 1024.0, "num_teams": 4 }"#).unwrap();
        assert_eq!(config.map_width, 1024.0);
        assert_eq!(config.num_teams, 4);
        assert_eq!(config.map_depth, SimConfig::default().map_depth);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(matches!(
            SimConfig::from_json("{ \"num_teams\": -1 }"),
            Err(SimError::Json(_))
        ));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = SimConfig {
            fixed_timestep: 0.05,
            ..SimConfig::default()
        };
        let json = config.to_json_pretty().unwrap();
        assert_eq!(SimConfig::from_json(&json).unwrap(), config);
    }
}
