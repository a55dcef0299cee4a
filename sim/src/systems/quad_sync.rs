//! Quad field sync - the only writer of the quad field.
//!
//! Runs in the mutation phase. Despawned entities are removed first, then
//! every entity whose `Position` or `CollisionRadius` changed is added (if
//! the field has not seen it yet) or moved. Changes are applied in
//! identifier order so quad lists come out identical on every peer,
//! whatever order the ECS stores entities in.

use crate::components::*;
use crate::field::QuadField;
use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::HashMap;

/// What an ECS entity is registered as in the quad field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexedRef {
    Unit(UnitId),
    Feature(FeatureId),
    Projectile(ProjectileId),
}

/// Entities currently registered in the quad field.
///
/// Needed because a despawned entity's components are gone by the time the
/// sync system learns about it.
#[derive(Resource, Debug, Default)]
pub struct IndexedEntities {
    map: HashMap<Entity, IndexedRef>,
}

impl IndexedEntities {
    pub fn get(&self, entity: Entity) -> Option<IndexedRef> {
        self.map.get(&entity).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

type MovedFilter = Or<(Changed<Position>, Changed<CollisionRadius>)>;

/// Apply this tick's spawns, moves and despawns to the quad field.
#[allow(clippy::too_many_arguments)]
pub fn quad_field_sync_system(
    mut field: ResMut<QuadField>,
    mut indexed: ResMut<IndexedEntities>,
    mut removed_units: RemovedComponents<Unit>,
    mut removed_features: RemovedComponents<Feature>,
    mut removed_projectiles: RemovedComponents<Projectile>,
    units: Query<(Entity, &Unit, &Position, &CollisionRadius), MovedFilter>,
    features: Query<(Entity, &Feature, &Position, &CollisionRadius), MovedFilter>,
    projectiles: Query<(Entity, &Projectile, &Position, &CollisionRadius), MovedFilter>,
) {
    // REMOVE PHASE
    let mut gone: Vec<IndexedRef> = removed_units
        .read()
        .chain(removed_features.read())
        .chain(removed_projectiles.read())
        .filter_map(|entity| indexed.map.remove(&entity))
        .collect();
    gone.sort_unstable();
    for r in gone {
        match r {
            IndexedRef::Unit(id) => field.remove_unit(id),
            IndexedRef::Feature(id) => field.remove_feature(id),
            IndexedRef::Projectile(id) => field.remove_projectile(id),
        }
    }

    // ADD / MOVE PHASE
    let mut moved_units: Vec<(Unit, Entity, Vec3, f32)> = units
        .iter()
        .map(|(e, unit, pos, radius)| (*unit, e, pos.0, radius.0))
        .collect();
    moved_units.sort_unstable_by_key(|(unit, ..)| unit.id);
    for (unit, entity, pos, radius) in moved_units {
        if indexed.map.contains_key(&entity) {
            field.moved_unit(unit.id, pos, radius);
        } else {
            field.add_unit(unit.id, unit.team, pos, radius);
            indexed.map.insert(entity, IndexedRef::Unit(unit.id));
        }
    }

    let mut moved_features: Vec<(FeatureId, Entity, Vec3, f32)> = features
        .iter()
        .map(|(e, feature, pos, radius)| (feature.id, e, pos.0, radius.0))
        .collect();
    moved_features.sort_unstable_by_key(|(id, ..)| *id);
    for (id, entity, pos, radius) in moved_features {
        if indexed.map.contains_key(&entity) {
            field.moved_feature(id, pos, radius);
        } else {
            field.add_feature(id, pos, radius);
            indexed.map.insert(entity, IndexedRef::Feature(id));
        }
    }

    let mut moved_projectiles: Vec<(ProjectileId, Entity, Vec3, f32)> = projectiles
        .iter()
        .map(|(e, projectile, pos, radius)| (projectile.id, e, pos.0, radius.0))
        .collect();
    moved_projectiles.sort_unstable_by_key(|(id, ..)| *id);
    for (id, entity, pos, radius) in moved_projectiles {
        if indexed.map.contains_key(&entity) {
            field.moved_projectile(id, pos, radius);
        } else {
            field.add_projectile(id, pos, radius);
            indexed.map.insert(entity, IndexedRef::Projectile(id));
        }
    }
}
