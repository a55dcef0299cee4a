//! Read-only queries over the quad field.
//!
//! Every query first picks candidate quads cheaply (circle, rectangle or
//! ray), then runs an exact test against the state stored at the entity's
//! last add/move. Entities spanning several candidate quads are reported
//! once, in the order they are first met: candidate quads in row-major (or
//! ray) order, entities in quad insertion order. Identical field state
//! therefore gives identical results on every peer.

use crate::components::{FeatureId, ProjectileId, TeamId, UnitId};
use crate::field::QuadField;
use crate::membership::{TrackedObject, TrackedUnit};
use crate::quad::QUAD_SIZE;
use glam::{Vec2, Vec3};
use std::collections::HashSet;

/// Slack added to the query radius when testing quad centres. Slightly above
/// the half-diagonal of a quad (0.7071) so no intersecting quad is dropped.
const QUAD_CENTRE_SLACK: f32 = QUAD_SIZE * 0.72;

/// How exact radius queries measure distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DistanceMode {
    /// Full 3D distance.
    #[default]
    Spherical,
    /// Horizontal distance only, elevation ignored.
    Cylindrical,
}

/// A unit or feature returned by [`QuadField::get_solids_exact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidRef {
    Unit(UnitId),
    Feature(FeatureId),
}

#[inline]
fn within(pos: Vec3, other: Vec3, reach: f32, mode: DistanceMode) -> bool {
    let reach_sq = reach * reach;
    match mode {
        DistanceMode::Spherical => pos.distance_squared(other) <= reach_sq,
        DistanceMode::Cylindrical => {
            let dx = pos.x - other.x;
            let dz = pos.z - other.z;
            dx * dx + dz * dz <= reach_sq
        }
    }
}

#[inline]
fn in_rect(p: Vec3, lo: Vec2, hi: Vec2) -> bool {
    p.x >= lo.x && p.x <= hi.x && p.z >= lo.y && p.z <= hi.y
}

/// Normalised rectangle corners on the map plane.
#[inline]
fn rect_bounds(corner1: Vec3, corner2: Vec3) -> (Vec2, Vec2) {
    let a = Vec2::new(corner1.x, corner1.z);
    let b = Vec2::new(corner2.x, corner2.z);
    (a.min(b), a.max(b))
}

/// Distance from `center` to the segment `start + t * (end - start)`.
fn segment_distance(start: Vec3, end: Vec3, center: Vec3) -> f32 {
    let seg = end - start;
    let len_sq = seg.length_squared();
    let t = if len_sq > 0.0 {
        ((center - start).dot(seg) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (start + seg * t).distance(center)
}

impl QuadField {
    // ========================================================================
    // CANDIDATE QUADS
    // ========================================================================

    /// Quads touched by the circle `(pos, radius)`, row-major order.
    ///
    /// Conservative: may include a few quads near the circle's diagonal that
    /// it does not actually reach, never omits one it does. Always contains
    /// the quad at `pos`.
    pub fn get_quads(&self, pos: Vec3, radius: f32) -> Vec<usize> {
        let mut out = Vec::new();
        self.get_quads_into(pos, radius, &mut out);
        out
    }

    /// Buffer-reusing form of [`get_quads`](Self::get_quads).
    pub fn get_quads_into(&self, pos: Vec3, radius: f32, out: &mut Vec<usize>) {
        out.clear();
        let p = self.clamp_to_map(pos);
        // max() maps NaN to zero
        let r = radius.max(0.0);
        let last_x = (self.num_quads_x() - 1) as f32;
        let last_z = (self.num_quads_z() - 1) as f32;

        let min_x = (((p.x - r) / QUAD_SIZE).floor() - 1.0).clamp(0.0, last_x) as usize;
        let max_x = (((p.x + r) / QUAD_SIZE).floor() + 1.0).clamp(0.0, last_x) as usize;
        let min_z = (((p.y - r) / QUAD_SIZE).floor() - 1.0).clamp(0.0, last_z) as usize;
        let max_z = (((p.y + r) / QUAD_SIZE).floor() + 1.0).clamp(0.0, last_z) as usize;

        let reach = r + QUAD_CENTRE_SLACK;
        let reach_sq = reach * reach;
        for z in min_z..=max_z {
            for x in min_x..=max_x {
                let centre = Vec2::new(
                    (x as f32 + 0.5) * QUAD_SIZE,
                    (z as f32 + 0.5) * QUAD_SIZE,
                );
                if centre.distance_squared(p) < reach_sq {
                    out.push(self.grid.index_of(x, z));
                }
            }
        }
    }

    /// Quads overlapping the rectangle spanned by two corners, which extends
    /// infinitely along the vertical axis. Row-major order.
    pub fn get_quads_rectangle(&self, corner1: Vec3, corner2: Vec3) -> Vec<usize> {
        let (lo, hi) = rect_bounds(corner1, corner2);
        let (x0, z0) = self.quad_coords(self.clamp_to_map(Vec3::new(lo.x, 0.0, lo.y)));
        let (x1, z1) = self.quad_coords(self.clamp_to_map(Vec3::new(hi.x, 0.0, hi.y)));

        let mut out = Vec::with_capacity((x1 - x0 + 1) * (z1 - z0 + 1));
        for z in z0..=z1 {
            for x in x0..=x1 {
                out.push(self.grid.index_of(x, z));
            }
        }
        out
    }

    /// Quads crossed by the segment from `start` along `dir` for `length`,
    /// in order along the ray.
    ///
    /// Both endpoints are clamped to the map. Consecutive quads share an
    /// edge. A zero-length segment, a zero or vertical direction, or
    /// non-finite input yields the single quad at `start`.
    pub fn get_quads_on_ray(&self, start: Vec3, dir: Vec3, length: f32) -> Vec<usize> {
        let mut out = Vec::new();
        self.get_quads_on_ray_into(start, dir, length, &mut out);
        out
    }

    /// Buffer-reusing form of [`get_quads_on_ray`](Self::get_quads_on_ray).
    pub fn get_quads_on_ray_into(&self, start: Vec3, dir: Vec3, length: f32, out: &mut Vec<usize>) {
        out.clear();
        let from = self.clamp_to_map(start);
        let (mut qx, mut qz) = self.quad_coords(from);
        out.push(self.grid.index_of(qx, qz));

        let dir = dir.normalize_or_zero();
        if !(length.is_finite() && length > 0.0) || dir == Vec3::ZERO || !start.is_finite() {
            return;
        }
        let to = self.clamp_to_map(start + dir * length);
        let (end_x, end_z) = self.quad_coords(to);
        if (qx, qz) == (end_x, end_z) {
            return;
        }

        // Amanatides-Woo traversal, parameterised by t in [0, 1] over `from..to`.
        let delta = to - from;
        let step_x: isize = if delta.x > 0.0 { 1 } else { -1 };
        let step_z: isize = if delta.y > 0.0 { 1 } else { -1 };
        let (t_delta_x, mut t_max_x) = if delta.x != 0.0 {
            let boundary = (if step_x > 0 { qx + 1 } else { qx }) as f32 * QUAD_SIZE;
            (QUAD_SIZE / delta.x.abs(), (boundary - from.x) / delta.x)
        } else {
            (f32::INFINITY, f32::INFINITY)
        };
        let (t_delta_z, mut t_max_z) = if delta.y != 0.0 {
            let boundary = (if step_z > 0 { qz + 1 } else { qz }) as f32 * QUAD_SIZE;
            (QUAD_SIZE / delta.y.abs(), (boundary - from.y) / delta.y)
        } else {
            (f32::INFINITY, f32::INFINITY)
        };

        // Each step moves one quad toward the end quad on one axis, so the
        // walk takes exactly the Manhattan distance between the two.
        let steps = qx.abs_diff(end_x) + qz.abs_diff(end_z);
        out.reserve(steps);
        for _ in 0..steps {
            let advance_x = if qx == end_x {
                false
            } else if qz == end_z {
                true
            } else {
                t_max_x < t_max_z
            };
            if advance_x {
                qx = qx.wrapping_add_signed(step_x);
                t_max_x += t_delta_x;
            } else {
                qz = qz.wrapping_add_signed(step_z);
                t_max_z += t_delta_z;
            }
            out.push(self.grid.index_of(qx, qz));
        }
    }

    // ========================================================================
    // EXACT UNIT QUERIES
    // ========================================================================

    /// Collect units from `quads` passing `test`, each once.
    fn collect_units<'a>(
        &'a self,
        quads: &[usize],
        mut test: impl FnMut(&'a TrackedUnit) -> bool,
    ) -> Vec<UnitId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &q in quads {
            for &id in self.grid.quad(q).units() {
                if !seen.insert(id) {
                    continue;
                }
                if let Some(unit) = self.tracker.unit(id) {
                    if test(unit) {
                        out.push(id);
                    }
                }
            }
        }
        out
    }

    /// Units whose position lies within `radius` of `pos`, treating each
    /// unit as a 3D point.
    pub fn get_units(&self, pos: Vec3, radius: f32) -> Vec<UnitId> {
        let quads = self.get_quads(pos, radius);
        self.collect_units(&quads, |u| within(pos, u.pos, radius, DistanceMode::Spherical))
    }

    /// Units whose bounding sphere reaches within `radius` of `pos`.
    pub fn get_units_exact(&self, pos: Vec3, radius: f32, mode: DistanceMode) -> Vec<UnitId> {
        let quads = self.get_quads(pos, radius);
        self.collect_units(&quads, |u| within(pos, u.pos, radius + u.radius, mode))
    }

    /// Units positioned inside the rectangle spanned by `mins` and `maxs`,
    /// which extends infinitely along the vertical axis.
    pub fn get_units_exact_rect(&self, mins: Vec3, maxs: Vec3) -> Vec<UnitId> {
        let (lo, hi) = rect_bounds(mins, maxs);
        let quads = self.get_quads_rectangle(mins, maxs);
        self.collect_units(&quads, |u| in_rect(u.pos, lo, hi))
    }

    /// Like [`get_units_exact`](Self::get_units_exact) but only for one team,
    /// walking that team's partition of each quad.
    pub fn get_team_units_exact(
        &self,
        pos: Vec3,
        radius: f32,
        team: TeamId,
        mode: DistanceMode,
    ) -> Vec<UnitId> {
        assert!(team.index() < self.num_teams(), "team {} out of range", team.0);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for q in self.get_quads(pos, radius) {
            for &id in self.grid.quad(q).team_units(team) {
                if seen.insert(id) {
                    if let Some(u) = self.tracker.unit(id) {
                        if within(pos, u.pos, radius + u.radius, mode) {
                            out.push(id);
                        }
                    }
                }
            }
        }
        out
    }

    /// Units of every team except `team` whose bounding sphere reaches within
    /// `radius` of `pos`. Per quad, teams are visited in team order.
    pub fn get_enemy_units_exact(
        &self,
        pos: Vec3,
        radius: f32,
        team: TeamId,
        mode: DistanceMode,
    ) -> Vec<UnitId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for q in self.get_quads(pos, radius) {
            for (other, units) in self.grid.quad(q).teams() {
                if other == team {
                    continue;
                }
                for &id in units {
                    if seen.insert(id) {
                        if let Some(u) = self.tracker.unit(id) {
                            if within(pos, u.pos, radius + u.radius, mode) {
                                out.push(id);
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Units whose bounding sphere the segment `start + dir * [0, length]`
    /// passes through, in order of the quads along the ray.
    pub fn get_units_on_ray(&self, start: Vec3, dir: Vec3, length: f32) -> Vec<UnitId> {
        let quads = self.get_quads_on_ray(start, dir, length);
        let end = start + dir.normalize_or_zero() * length.max(0.0);
        self.collect_units(&quads, |u| segment_distance(start, end, u.pos) <= u.radius)
    }

    // ========================================================================
    // EXACT FEATURE / PROJECTILE QUERIES
    // ========================================================================

    fn collect_features<'a>(
        &'a self,
        quads: &[usize],
        mut test: impl FnMut(&'a TrackedObject) -> bool,
    ) -> Vec<FeatureId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &q in quads {
            for &id in self.grid.quad(q).features() {
                if seen.insert(id) && self.tracker.feature(id).is_some_and(&mut test) {
                    out.push(id);
                }
            }
        }
        out
    }

    fn collect_projectiles<'a>(
        &'a self,
        quads: &[usize],
        mut test: impl FnMut(&'a TrackedObject) -> bool,
    ) -> Vec<ProjectileId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &q in quads {
            for &id in self.grid.quad(q).projectiles() {
                if seen.insert(id) && self.tracker.projectile(id).is_some_and(&mut test) {
                    out.push(id);
                }
            }
        }
        out
    }

    /// Features whose bounding sphere reaches within `radius` of `pos`.
    pub fn get_features_exact(&self, pos: Vec3, radius: f32, mode: DistanceMode) -> Vec<FeatureId> {
        let quads = self.get_quads(pos, radius);
        self.collect_features(&quads, |f| within(pos, f.pos, radius + f.radius, mode))
    }

    /// Features positioned inside the vertical-infinite rectangle.
    pub fn get_features_exact_rect(&self, mins: Vec3, maxs: Vec3) -> Vec<FeatureId> {
        let (lo, hi) = rect_bounds(mins, maxs);
        let quads = self.get_quads_rectangle(mins, maxs);
        self.collect_features(&quads, |f| in_rect(f.pos, lo, hi))
    }

    /// Projectiles whose bounding sphere reaches within `radius` of `pos`.
    pub fn get_projectiles_exact(&self, pos: Vec3, radius: f32) -> Vec<ProjectileId> {
        let quads = self.get_quads(pos, radius);
        self.collect_projectiles(&quads, |p| {
            within(pos, p.pos, radius + p.radius, DistanceMode::Spherical)
        })
    }

    pub fn get_projectiles_exact_rect(&self, mins: Vec3, maxs: Vec3) -> Vec<ProjectileId> {
        let (lo, hi) = rect_bounds(mins, maxs);
        let quads = self.get_quads_rectangle(mins, maxs);
        self.collect_projectiles(&quads, |p| in_rect(p.pos, lo, hi))
    }

    /// Units and features within reach of `pos`, sharing one candidate set.
    pub fn get_units_and_features_exact(
        &self,
        pos: Vec3,
        radius: f32,
    ) -> (Vec<UnitId>, Vec<FeatureId>) {
        let quads = self.get_quads(pos, radius);
        let units = self.collect_units(&quads, |u| {
            within(pos, u.pos, radius + u.radius, DistanceMode::Spherical)
        });
        let features = self.collect_features(&quads, |f| {
            within(pos, f.pos, radius + f.radius, DistanceMode::Spherical)
        });
        (units, features)
    }

    /// Solid objects within reach of `pos`, walked quad by quad: each
    /// candidate quad contributes its units, then its features.
    pub fn get_solids_exact(&self, pos: Vec3, radius: f32) -> Vec<SolidRef> {
        let quads = self.get_quads(pos, radius);
        let mut seen_units = HashSet::new();
        let mut seen_features = HashSet::new();
        let mut out = Vec::new();
        for &q in &quads {
            let quad = self.grid.quad(q);
            for &id in quad.units() {
                if seen_units.insert(id)
                    && self.tracker.unit(id).is_some_and(|u| {
                        within(pos, u.pos, radius + u.radius, DistanceMode::Spherical)
                    })
                {
                    out.push(SolidRef::Unit(id));
                }
            }
            for &id in quad.features() {
                if seen_features.insert(id)
                    && self.tracker.feature(id).is_some_and(|f| {
                        within(pos, f.pos, radius + f.radius, DistanceMode::Spherical)
                    })
                {
                    out.push(SolidRef::Feature(id));
                }
            }
        }
        out
    }

    /// Run a batch of [`get_units_exact`](Self::get_units_exact) probes in
    /// parallel. Results come back in probe order.
    #[cfg(feature = "parallel")]
    pub fn par_units_exact(&self, probes: &[(Vec3, f32)], mode: DistanceMode) -> Vec<Vec<UnitId>> {
        use rayon::prelude::*;
        probes
            .par_iter()
            .map(|&(pos, radius)| self.get_units_exact(pos, radius, mode))
            .collect()
    }
}
