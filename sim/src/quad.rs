//! Grid storage: the fixed array of quads and their membership lists.
//!
//! Quads only hold identifiers. Every list is kept in insertion order and
//! erased in place, so iteration order depends only on the order of
//! mutations and never on hashing or thread scheduling.

use crate::components::{FeatureId, ProjectileId, TeamId, UnitId};

/// Side length of a quad in world units.
pub const QUAD_SIZE: f32 = 256.0;

/// A single grid cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quad {
    units: Vec<UnitId>,
    /// Same unit set as `units`, partitioned by team.
    team_units: Vec<Vec<UnitId>>,
    features: Vec<FeatureId>,
    projectiles: Vec<ProjectileId>,
}

impl Quad {
    fn with_teams(num_teams: usize) -> Self {
        Self {
            team_units: vec![Vec::new(); num_teams],
            ..Default::default()
        }
    }

    /// Units in this quad, in insertion order.
    pub fn units(&self) -> &[UnitId] {
        &self.units
    }

    /// Units of one team in this quad.
    ///
    /// Panics if `team` is beyond the configured team count.
    pub fn team_units(&self, team: TeamId) -> &[UnitId] {
        &self.team_units[team.index()]
    }

    /// Iterate the team partitions in team order.
    pub fn teams(&self) -> impl Iterator<Item = (TeamId, &[UnitId])> {
        self.team_units
            .iter()
            .enumerate()
            .map(|(t, units)| (TeamId(t as u8), units.as_slice()))
    }

    pub fn features(&self) -> &[FeatureId] {
        &self.features
    }

    pub fn projectiles(&self) -> &[ProjectileId] {
        &self.projectiles
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.features.is_empty() && self.projectiles.is_empty()
    }
}

/// Append `id`, which must not already be present.
fn push_unique<T: PartialEq + Copy + std::fmt::Debug>(list: &mut Vec<T>, id: T) {
    assert!(!list.contains(&id), "{id:?} already listed in quad");
    list.push(id);
}

/// Order-preserving erase of an entry that must be present.
fn erase<T: PartialEq + Copy + std::fmt::Debug>(list: &mut Vec<T>, id: T) {
    match list.iter().position(|&e| e == id) {
        Some(pos) => {
            list.remove(pos);
        }
        None => panic!("{id:?} missing from quad"),
    }
}

/// Row-major array of quads (`index = z * num_quads_x + x`).
#[derive(Debug, Clone)]
pub struct QuadGrid {
    quads: Vec<Quad>,
    num_quads_x: usize,
    num_quads_z: usize,
    num_teams: usize,
}

impl QuadGrid {
    /// Create an empty grid. Extents are fixed for the grid's lifetime.
    pub fn new(num_quads_x: usize, num_quads_z: usize, num_teams: usize) -> Self {
        assert!(num_quads_x > 0 && num_quads_z > 0, "grid must have at least one quad");
        Self {
            quads: vec![Quad::with_teams(num_teams); num_quads_x * num_quads_z],
            num_quads_x,
            num_quads_z,
            num_teams,
        }
    }

    #[inline]
    pub fn num_quads_x(&self) -> usize {
        self.num_quads_x
    }

    #[inline]
    pub fn num_quads_z(&self) -> usize {
        self.num_quads_z
    }

    #[inline]
    pub fn num_quads(&self) -> usize {
        self.quads.len()
    }

    #[inline]
    pub fn num_teams(&self) -> usize {
        self.num_teams
    }

    /// Quad by row-major index. Panics when out of range.
    pub fn quad(&self, index: usize) -> &Quad {
        assert!(index < self.quads.len(), "quad index {index} out of range");
        &self.quads[index]
    }

    /// Quad by grid coordinates. Panics when out of range.
    pub fn quad_at(&self, x: usize, z: usize) -> &Quad {
        self.quad(self.index_of(x, z))
    }

    /// Row-major index of grid coordinates. Panics when out of range.
    #[inline]
    pub fn index_of(&self, x: usize, z: usize) -> usize {
        assert!(
            x < self.num_quads_x && z < self.num_quads_z,
            "quad ({x}, {z}) outside {}x{} grid",
            self.num_quads_x,
            self.num_quads_z
        );
        z * self.num_quads_x + x
    }

    /// Grid coordinates of a row-major index.
    #[inline]
    pub fn coords_of(&self, index: usize) -> (usize, usize) {
        (index % self.num_quads_x, index / self.num_quads_x)
    }

    /// World-plane bounds `(min_x, min_z, max_x, max_z)` of a quad.
    pub fn quad_rect(&self, index: usize) -> (f32, f32, f32, f32) {
        assert!(index < self.quads.len(), "quad index {index} out of range");
        let (x, z) = self.coords_of(index);
        let (x0, z0) = (x as f32 * QUAD_SIZE, z as f32 * QUAD_SIZE);
        (x0, z0, x0 + QUAD_SIZE, z0 + QUAD_SIZE)
    }

    /// All quads in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }

    pub(crate) fn insert_unit(&mut self, id: UnitId, team: TeamId, quads: &[usize]) {
        assert!(team.index() < self.num_teams, "team {} out of range", team.0);
        for &q in quads {
            let quad = &mut self.quads[q];
            push_unique(&mut quad.units, id);
            push_unique(&mut quad.team_units[team.index()], id);
        }
    }

    pub(crate) fn remove_unit(&mut self, id: UnitId, team: TeamId, quads: &[usize]) {
        for &q in quads {
            let quad = &mut self.quads[q];
            erase(&mut quad.units, id);
            erase(&mut quad.team_units[team.index()], id);
        }
    }

    pub(crate) fn insert_feature(&mut self, id: FeatureId, quads: &[usize]) {
        for &q in quads {
            push_unique(&mut self.quads[q].features, id);
        }
    }

    pub(crate) fn remove_feature(&mut self, id: FeatureId, quads: &[usize]) {
        for &q in quads {
            erase(&mut self.quads[q].features, id);
        }
    }

    pub(crate) fn insert_projectile(&mut self, id: ProjectileId, quads: &[usize]) {
        for &q in quads {
            push_unique(&mut self.quads[q].projectiles, id);
        }
    }

    pub(crate) fn remove_projectile(&mut self, id: ProjectileId, quads: &[usize]) {
        for &q in quads {
            erase(&mut self.quads[q].projectiles, id);
        }
    }

    /// Drop every membership entry, keeping extents.
    pub fn clear(&mut self) {
        let num_teams = self.num_teams;
        for quad in &mut self.quads {
            *quad = Quad::with_teams(num_teams);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_unit() {
        let mut grid = QuadGrid::new(4, 4, 2);
        let a = UnitId(1);
        let b = UnitId(2);

        grid.insert_unit(a, TeamId(0), &[0, 1]);
        grid.insert_unit(b, TeamId(1), &[1]);

        assert_eq!(grid.quad(0).units(), &[a]);
        assert_eq!(grid.quad(1).units(), &[a, b]);
        assert_eq!(grid.quad(1).team_units(TeamId(0)), &[a]);
        assert_eq!(grid.quad(1).team_units(TeamId(1)), &[b]);

        grid.remove_unit(a, TeamId(0), &[0, 1]);
        assert!(grid.quad(0).is_empty());
        assert_eq!(grid.quad(1).units(), &[b]);
        assert!(grid.quad(1).team_units(TeamId(0)).is_empty());
    }

    #[test]
    fn test_erase_preserves_order() {
        let mut grid = QuadGrid::new(1, 1, 1);
        for i in 0..4 {
            grid.insert_feature(FeatureId(i), &[0]);
        }
        grid.remove_feature(FeatureId(1), &[0]);
        assert_eq!(
            grid.quad(0).features(),
            &[FeatureId(0), FeatureId(2), FeatureId(3)]
        );
    }

    #[test]
    fn test_index_and_rect() {
        let grid = QuadGrid::new(4, 3, 1);
        assert_eq!(grid.num_quads(), 12);
        assert_eq!(grid.index_of(3, 2), 11);
        assert_eq!(grid.coords_of(6), (2, 1));
        assert_eq!(grid.quad_rect(5), (256.0, 256.0, 512.0, 512.0));
    }

    #[test]
    #[should_panic]
    fn test_quad_at_out_of_range_panics() {
        let grid = QuadGrid::new(2, 2, 1);
        grid.quad_at(2, 0);
    }

    #[test]
    #[should_panic]
    fn test_unknown_team_panics() {
        let mut grid = QuadGrid::new(2, 2, 2);
        grid.insert_unit(UnitId(0), TeamId(2), &[0]);
    }

    #[test]
    #[should_panic(expected = "already listed")]
    fn test_duplicate_insert_panics() {
        let mut grid = QuadGrid::new(2, 2, 1);
        grid.insert_feature(FeatureId(3), &[1]);
        grid.insert_feature(FeatureId(3), &[1]);
    }

    #[test]
    #[should_panic(expected = "missing from quad")]
    fn test_erase_of_absent_entry_panics() {
        let mut grid = QuadGrid::new(2, 2, 1);
        grid.insert_projectile(ProjectileId(1), &[0]);
        grid.remove_projectile(ProjectileId(1), &[0, 3]);
    }
}
