//! Per-entity membership bookkeeping and the mutation API.
//!
//! Each registered entity remembers the position, radius and footprint read
//! at its last add or move. A move recomputes the footprint and touches only
//! the quads that entered or left it, so an entity drifting inside one quad
//! costs a footprint computation and nothing else.
//!
//! Lifecycle per entity is `Unregistered -> add -> Registered -> move* ->
//! remove -> Unregistered`. Moving or removing an unregistered entity, or
//! adding one twice, panics.

use crate::components::{FeatureId, ProjectileId, TeamId, UnitId};
use crate::field::QuadField;
use glam::Vec3;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Stored state of a registered unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedUnit {
    pub pos: Vec3,
    pub radius: f32,
    pub team: TeamId,
    footprint: Vec<usize>,
}

impl TrackedUnit {
    /// Quads the unit is listed in, row-major order.
    pub fn footprint(&self) -> &[usize] {
        &self.footprint
    }
}

/// Stored state of a registered feature or projectile.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub pos: Vec3,
    pub radius: f32,
    footprint: Vec<usize>,
}

impl TrackedObject {
    pub fn footprint(&self) -> &[usize] {
        &self.footprint
    }
}

/// Identifier-keyed side tables for every registered entity.
#[derive(Debug, Clone, Default)]
pub struct MembershipTracker {
    units: BTreeMap<UnitId, TrackedUnit>,
    features: BTreeMap<FeatureId, TrackedObject>,
    projectiles: BTreeMap<ProjectileId, TrackedObject>,
}

impl MembershipTracker {
    pub fn unit(&self, id: UnitId) -> Option<&TrackedUnit> {
        self.units.get(&id)
    }

    pub fn feature(&self, id: FeatureId) -> Option<&TrackedObject> {
        self.features.get(&id)
    }

    pub fn projectile(&self, id: ProjectileId) -> Option<&TrackedObject> {
        self.projectiles.get(&id)
    }

    /// Registered units in identifier order.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, &TrackedUnit)> {
        self.units.iter().map(|(&id, u)| (id, u))
    }

    pub fn features(&self) -> impl Iterator<Item = (FeatureId, &TrackedObject)> {
        self.features.iter().map(|(&id, f)| (id, f))
    }

    pub fn projectiles(&self) -> impl Iterator<Item = (ProjectileId, &TrackedObject)> {
        self.projectiles.iter().map(|(&id, p)| (id, p))
    }

    pub fn num_units(&self) -> usize {
        self.units.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn num_projectiles(&self) -> usize {
        self.projectiles.len()
    }

    pub(crate) fn clear(&mut self) {
        self.units.clear();
        self.features.clear();
        self.projectiles.clear();
    }
}

/// Quads that left and entered a footprint. Both inputs must be sorted.
pub(crate) fn footprint_delta(old: &[usize], new: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut removed = Vec::new();
    let mut added = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        match old[i].cmp(&new[j]) {
            std::cmp::Ordering::Less => {
                removed.push(old[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                added.push(new[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    removed.extend_from_slice(&old[i..]);
    added.extend_from_slice(&new[j..]);
    (removed, added)
}

impl QuadField {
    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    /// Register a unit and list it in every quad of its footprint.
    pub fn add_unit(&mut self, id: UnitId, team: TeamId, pos: Vec3, radius: f32) {
        assert!(
            !self.tracker.units.contains_key(&id),
            "unit {} added twice",
            id.0
        );
        let footprint = self.get_quads(pos, radius);
        self.grid.insert_unit(id, team, &footprint);
        debug!(unit = id.0, team = team.0, quads = footprint.len(), "unit added");
        self.tracker.units.insert(
            id,
            TrackedUnit {
                pos,
                radius,
                team,
                footprint,
            },
        );
    }

    /// Reconcile a unit's membership after its position or radius changed.
    ///
    /// Returns `true` when quad membership changed.
    pub fn moved_unit(&mut self, id: UnitId, pos: Vec3, radius: f32) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        self.get_quads_into(pos, radius, &mut scratch);

        let Some(unit) = self.tracker.units.get_mut(&id) else {
            panic!("moved unit {} is not registered", id.0);
        };
        unit.pos = pos;
        unit.radius = radius;

        let changed = unit.footprint != scratch;
        if changed {
            let (removed, added) = footprint_delta(&unit.footprint, &scratch);
            trace!(unit = id.0, ?removed, ?added, "unit footprint changed");
            self.grid.remove_unit(id, unit.team, &removed);
            self.grid.insert_unit(id, unit.team, &added);
            std::mem::swap(&mut unit.footprint, &mut scratch);
        }
        self.scratch = scratch;
        changed
    }

    /// Unregister a unit and erase it from every quad and team partition.
    pub fn remove_unit(&mut self, id: UnitId) {
        let Some(unit) = self.tracker.units.remove(&id) else {
            panic!("removed unit {} is not registered", id.0);
        };
        self.grid.remove_unit(id, unit.team, &unit.footprint);
        debug!(unit = id.0, "unit removed");
    }

    pub fn contains_unit(&self, id: UnitId) -> bool {
        self.tracker.units.contains_key(&id)
    }

    pub fn unit_footprint(&self, id: UnitId) -> Option<&[usize]> {
        self.tracker.unit(id).map(TrackedUnit::footprint)
    }

    // ------------------------------------------------------------------
    // Features
    // ------------------------------------------------------------------

    pub fn add_feature(&mut self, id: FeatureId, pos: Vec3, radius: f32) {
        assert!(
            !self.tracker.features.contains_key(&id),
            "feature {} added twice",
            id.0
        );
        let footprint = self.get_quads(pos, radius);
        self.grid.insert_feature(id, &footprint);
        debug!(feature = id.0, quads = footprint.len(), "feature added");
        self.tracker.features.insert(
            id,
            TrackedObject {
                pos,
                radius,
                footprint,
            },
        );
    }

    /// Returns `true` when quad membership changed.
    pub fn moved_feature(&mut self, id: FeatureId, pos: Vec3, radius: f32) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        self.get_quads_into(pos, radius, &mut scratch);

        let Some(feature) = self.tracker.features.get_mut(&id) else {
            panic!("moved feature {} is not registered", id.0);
        };
        feature.pos = pos;
        feature.radius = radius;

        let changed = feature.footprint != scratch;
        if changed {
            let (removed, added) = footprint_delta(&feature.footprint, &scratch);
            trace!(feature = id.0, ?removed, ?added, "feature footprint changed");
            self.grid.remove_feature(id, &removed);
            self.grid.insert_feature(id, &added);
            std::mem::swap(&mut feature.footprint, &mut scratch);
        }
        self.scratch = scratch;
        changed
    }

    pub fn remove_feature(&mut self, id: FeatureId) {
        let Some(feature) = self.tracker.features.remove(&id) else {
            panic!("removed feature {} is not registered", id.0);
        };
        self.grid.remove_feature(id, &feature.footprint);
        debug!(feature = id.0, "feature removed");
    }

    pub fn contains_feature(&self, id: FeatureId) -> bool {
        self.tracker.features.contains_key(&id)
    }

    pub fn feature_footprint(&self, id: FeatureId) -> Option<&[usize]> {
        self.tracker.feature(id).map(TrackedObject::footprint)
    }

    // ------------------------------------------------------------------
    // Projectiles
    // ------------------------------------------------------------------

    pub fn add_projectile(&mut self, id: ProjectileId, pos: Vec3, radius: f32) {
        assert!(
            !self.tracker.projectiles.contains_key(&id),
            "projectile {} added twice",
            id.0
        );
        let footprint = self.get_quads(pos, radius);
        self.grid.insert_projectile(id, &footprint);
        debug!(projectile = id.0, quads = footprint.len(), "projectile added");
        self.tracker.projectiles.insert(
            id,
            TrackedObject {
                pos,
                radius,
                footprint,
            },
        );
    }

    /// Returns `true` when quad membership changed.
    pub fn moved_projectile(&mut self, id: ProjectileId, pos: Vec3, radius: f32) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        self.get_quads_into(pos, radius, &mut scratch);

        let Some(projectile) = self.tracker.projectiles.get_mut(&id) else {
            panic!("moved projectile {} is not registered", id.0);
        };
        projectile.pos = pos;
        projectile.radius = radius;

        let changed = projectile.footprint != scratch;
        if changed {
            let (removed, added) = footprint_delta(&projectile.footprint, &scratch);
            trace!(projectile = id.0, ?removed, ?added, "projectile footprint changed");
            self.grid.remove_projectile(id, &removed);
            self.grid.insert_projectile(id, &added);
            std::mem::swap(&mut projectile.footprint, &mut scratch);
        }
        self.scratch = scratch;
        changed
    }

    pub fn remove_projectile(&mut self, id: ProjectileId) {
        let Some(projectile) = self.tracker.projectiles.remove(&id) else {
            panic!("removed projectile {} is not registered", id.0);
        };
        self.grid.remove_projectile(id, &projectile.footprint);
        debug!(projectile = id.0, "projectile removed");
    }

    pub fn contains_projectile(&self, id: ProjectileId) -> bool {
        self.tracker.projectiles.contains_key(&id)
    }

    pub fn projectile_footprint(&self, id: ProjectileId) -> Option<&[usize]> {
        self.tracker.projectile(id).map(TrackedObject::footprint)
    }
}
