//! The quad field context object.
//!
//! A [`QuadField`] owns the grid and the per-entity membership records for
//! one simulation session. It is a `bevy_ecs` resource: the mutation phase
//! borrows it as `ResMut<QuadField>` from a single system, the read phase
//! borrows it as `Res<QuadField>` from any number of systems in parallel.
//!
//! The mutation API lives in [`crate::membership`], the queries in
//! [`crate::query`].

use crate::error::QuadFieldError;
use crate::membership::MembershipTracker;
use crate::quad::{Quad, QuadGrid, QUAD_SIZE};
use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};
use tracing::info;

/// Uniform-grid spatial index over units, features and projectiles.
#[derive(Resource, Debug, Clone)]
pub struct QuadField {
    pub(crate) grid: QuadGrid,
    pub(crate) tracker: MembershipTracker,
    map_width: f32,
    map_depth: f32,
    /// Reused footprint buffer for the move path.
    pub(crate) scratch: Vec<usize>,
}

impl QuadField {
    /// Build an empty field covering a `map_width` x `map_depth` world plane.
    ///
    /// The grid has `ceil(extent / QUAD_SIZE)` quads per axis and one unit
    /// partition per team.
    pub fn new(map_width: f32, map_depth: f32, num_teams: usize) -> Result<Self, QuadFieldError> {
        if !(map_width.is_finite() && map_depth.is_finite() && map_width > 0.0 && map_depth > 0.0)
        {
            return Err(QuadFieldError::InvalidMapSize {
                width: map_width,
                depth: map_depth,
            });
        }
        if num_teams == 0 || num_teams > usize::from(u8::MAX) + 1 {
            return Err(QuadFieldError::InvalidTeamCount(num_teams));
        }

        let num_quads_x = ((map_width / QUAD_SIZE).ceil() as usize).max(1);
        let num_quads_z = ((map_depth / QUAD_SIZE).ceil() as usize).max(1);
        info!(
            num_quads_x,
            num_quads_z, num_teams, map_width, map_depth, "quad field created"
        );

        Ok(Self {
            grid: QuadGrid::new(num_quads_x, num_quads_z, num_teams),
            tracker: MembershipTracker::default(),
            map_width,
            map_depth,
            scratch: Vec::new(),
        })
    }

    pub fn map_width(&self) -> f32 {
        self.map_width
    }

    pub fn map_depth(&self) -> f32 {
        self.map_depth
    }

    pub fn num_quads_x(&self) -> usize {
        self.grid.num_quads_x()
    }

    pub fn num_quads_z(&self) -> usize {
        self.grid.num_quads_z()
    }

    pub fn num_teams(&self) -> usize {
        self.grid.num_teams()
    }

    /// Quad by row-major index. Panics when out of range.
    pub fn quad(&self, index: usize) -> &Quad {
        self.grid.quad(index)
    }

    /// Quad by grid coordinates. Panics when out of range.
    pub fn quad_at(&self, x: usize, z: usize) -> &Quad {
        self.grid.quad_at(x, z)
    }

    /// Direct access to the grid, for callers that walk it themselves.
    pub fn grid(&self) -> &QuadGrid {
        &self.grid
    }

    /// Membership records, keyed by identifier.
    pub fn tracker(&self) -> &MembershipTracker {
        &self.tracker
    }

    /// Project a world position onto the map plane, clamped to the map.
    #[inline]
    pub(crate) fn clamp_to_map(&self, pos: Vec3) -> Vec2 {
        let x = if pos.x.is_nan() { 0.0 } else { pos.x };
        let z = if pos.z.is_nan() { 0.0 } else { pos.z };
        Vec2::new(x.clamp(0.0, self.map_width), z.clamp(0.0, self.map_depth))
    }

    /// Grid coordinates of a clamped map-plane point.
    #[inline]
    pub(crate) fn quad_coords(&self, p: Vec2) -> (usize, usize) {
        let x = ((p.x / QUAD_SIZE) as usize).min(self.grid.num_quads_x() - 1);
        let z = ((p.y / QUAD_SIZE) as usize).min(self.grid.num_quads_z() - 1);
        (x, z)
    }

    /// Row-major index of the quad containing `pos`, clamped to the map.
    pub fn quad_index_at(&self, pos: Vec3) -> usize {
        let (x, z) = self.quad_coords(self.clamp_to_map(pos));
        self.grid.index_of(x, z)
    }

    /// Forget every entity, keeping the grid extents.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.tracker.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extents_round_up() {
        let field = QuadField::new(1024.0, 1000.0, 2).unwrap();
        assert_eq!(field.num_quads_x(), 4);
        assert_eq!(field.num_quads_z(), 4);

        let small = QuadField::new(10.0, 10.0, 1).unwrap();
        assert_eq!(small.num_quads_x(), 1);
        assert_eq!(small.num_quads_z(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert_eq!(
            QuadField::new(0.0, 512.0, 1).unwrap_err(),
            QuadFieldError::InvalidMapSize {
                width: 0.0,
                depth: 512.0
            }
        );
        assert!(QuadField::new(f32::INFINITY, 512.0, 1).is_err());
        assert_eq!(
            QuadField::new(512.0, 512.0, 0).unwrap_err(),
            QuadFieldError::InvalidTeamCount(0)
        );
    }

    #[test]
    fn test_out_of_map_positions_clamp_to_border() {
        let field = QuadField::new(1024.0, 1024.0, 1).unwrap();
        assert_eq!(field.quad_index_at(Vec3::new(-50.0, 0.0, -50.0)), 0);
        assert_eq!(field.quad_index_at(Vec3::new(5000.0, 0.0, 10.0)), 3);
        assert_eq!(field.quad_index_at(Vec3::new(1024.0, 0.0, 1024.0)), 15);
    }
}
