//! The compiled dependency table.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::definition::{EntityDefinition, KeyPath};
use crate::error::{Result, SchemaError};
use crate::model::{Attribute, ChangeSet, EntityKind, EntityRef, KeySet};
use crate::store::ObjectStore;

static NO_KEYS: KeySet = BTreeSet::new();

/// Related objects affected by a change, with what changed on each.
///
/// Most objects reach only a handful of related objects, so the list is
/// stored inline.
pub type RelatedChanges = SmallVec<[(EntityRef, ChangeSet); 4]>;

/// A propagation with its target kind resolved.
#[derive(Debug)]
struct CompiledPropagation {
    via: Attribute,
    target: EntityKind,
    as_path: Attribute,
    on_insert_or_delete: Option<Attribute>,
    forward_as: Option<Attribute>,
    required_keys: KeySet,
}

#[derive(Debug)]
struct KindTable {
    definition: EntityDefinition,
    observable: KeySet,
    /// Inverse of the `affected_by` declarations: key path -> observable keys.
    /// Observable raw keys map to themselves.
    affected: HashMap<KeyPath, KeySet>,
    propagations: Vec<CompiledPropagation>,
}

/// Static per-kind table mapping raw mutations to affected observable keys.
///
/// Built once from [`EntityDefinition`]s and immutable afterwards.
#[derive(Debug)]
pub struct DependencyKeyStore {
    kinds: HashMap<EntityKind, KindTable>,
}

impl DependencyKeyStore {
    /// Compile and validate a set of definitions.
    pub fn new(
        definitions: impl IntoIterator<Item = EntityDefinition>,
    ) -> Result<Self, SchemaError> {
        let mut by_kind: IndexMap<EntityKind, EntityDefinition> = IndexMap::new();
        for def in definitions {
            if by_kind.contains_key(&def.kind) {
                return Err(SchemaError::DuplicateKind(def.kind));
            }
            by_kind.insert(def.kind.clone(), def);
        }

        let mut kinds = HashMap::with_capacity(by_kind.len());
        for def in by_kind.values() {
            let table = compile(def, &by_kind)?;
            if table.observable.is_empty() {
                warn!("There are no observable keys defined for {}", def.kind);
            }
            kinds.insert(def.kind.clone(), table);
        }

        debug!(kinds = kinds.len(), "Built dependency key store");
        Ok(Self { kinds })
    }

    /// Compile a JSON array of entity definitions.
    pub fn from_json(json: &str) -> Result<Self> {
        let definitions: Vec<EntityDefinition> = serde_json::from_str(json)?;
        Ok(Self::new(definitions)?)
    }

    /// The definition a kind was compiled from.
    pub fn definition(&self, kind: &EntityKind) -> Option<&EntityDefinition> {
        self.kinds.get(kind).map(|t| &t.definition)
    }

    /// Every kind the store knows.
    pub fn kinds(&self) -> impl Iterator<Item = &EntityKind> {
        self.kinds.keys()
    }

    /// All keys observers of `kind` can be notified about.
    pub fn observable_keys(&self, kind: &EntityKind) -> &KeySet {
        self.kinds.get(kind).map_or(&NO_KEYS, |t| &t.observable)
    }

    /// Observable keys on the same object affected by a mutation of `raw_key`.
    pub fn affected_keys(&self, kind: &EntityKind, raw_key: &Attribute) -> &KeySet {
        self.affected_keys_for_path(kind, &KeyPath::local(raw_key.clone()))
    }

    /// Observable keys of `kind` affected by a change at `path`.
    pub fn affected_keys_for_path(&self, kind: &EntityKind, path: &KeyPath) -> &KeySet {
        self.kinds
            .get(kind)
            .and_then(|t| t.affected.get(path))
            .unwrap_or(&NO_KEYS)
    }

    /// Whether changes on `kind` can affect objects of other kinds.
    pub fn has_propagations(&self, kind: &EntityKind) -> bool {
        self.kinds
            .get(kind)
            .is_some_and(|t| !t.propagations.is_empty())
    }

    /// Related objects affected by `raw_keys` changing on `source`, together
    /// with the observable keys affected on each of them.
    ///
    /// Only reads from `store`. Targets receiving no observable key and no
    /// forwarded change are left out.
    pub fn affected_objects<S: ObjectStore + ?Sized>(
        &self,
        source: &EntityRef,
        raw_keys: &KeySet,
        store: &S,
    ) -> RelatedChanges {
        let mut related = RelatedChanges::new();
        let Some(table) = self.kinds.get(source.kind()) else {
            return related;
        };
        if raw_keys.is_empty() {
            return related;
        }

        for propagation in &table.propagations {
            let targets = store.related(source, &propagation.via);
            if targets.is_empty() {
                continue;
            }

            let keys: KeySet = raw_keys
                .iter()
                .flat_map(|key| {
                    let path = KeyPath::through(propagation.as_path.clone(), key.clone());
                    self.affected_keys_for_path(&propagation.target, &path)
                        .iter()
                        .cloned()
                })
                .collect();
            let mut changes = ChangeSet::from_keys(keys);

            if let Some(label) = &propagation.forward_as {
                if propagation.required_keys.is_empty()
                    || !propagation.required_keys.is_disjoint(raw_keys)
                {
                    changes.forward(label.clone(), source.clone(), raw_keys);
                }
            }

            if changes.is_empty() {
                continue;
            }

            trace!(
                source = %source,
                via = %propagation.via,
                targets = targets.len(),
                "Propagating update"
            );
            for target in targets {
                related.push((target, changes.clone()));
            }
        }

        related
    }

    /// Related objects affected by `source` being inserted or deleted.
    pub fn affected_objects_for_insertion_or_deletion<S: ObjectStore + ?Sized>(
        &self,
        source: &EntityRef,
        store: &S,
    ) -> RelatedChanges {
        let mut related = RelatedChanges::new();
        let Some(table) = self.kinds.get(source.kind()) else {
            return related;
        };

        for propagation in &table.propagations {
            let Some(key) = &propagation.on_insert_or_delete else {
                continue;
            };
            let keys = self.affected_keys(&propagation.target, key);
            if keys.is_empty() {
                continue;
            }
            for target in store.related(source, &propagation.via) {
                related.push((target, ChangeSet::from_keys(keys.iter().cloned())));
            }
        }

        related
    }
}

fn compile(
    def: &EntityDefinition,
    all: &IndexMap<EntityKind, EntityDefinition>,
) -> Result<KindTable, SchemaError> {
    if let Some(path) = def.malformed_paths.first() {
        return Err(SchemaError::MalformedKeyPath(path.clone()));
    }

    for rel in &def.relationships {
        if !all.contains_key(&rel.target) {
            return Err(SchemaError::UnknownTargetKind {
                kind: def.kind.clone(),
                relationship: rel.name.clone(),
                target: rel.target.clone(),
            });
        }
    }

    let mut observable = KeySet::new();
    let mut affected: HashMap<KeyPath, KeySet> = HashMap::new();

    for obs in &def.observable {
        observable.insert(obs.key.clone());
        if def.is_raw(&obs.key) {
            affected
                .entry(KeyPath::local(obs.key.clone()))
                .or_default()
                .insert(obs.key.clone());
        } else if obs.affected_by.is_empty() {
            warn!("Observable key {}.{} can never change", def.kind, obs.key);
        }

        for path in &obs.affected_by {
            resolve_path(def, &obs.key, path, all)?;
            affected
                .entry(path.clone())
                .or_default()
                .insert(obs.key.clone());
        }
    }

    let mut propagations = Vec::with_capacity(def.propagations.len());
    for prop in &def.propagations {
        let rel = def
            .relationship(&prop.via)
            .ok_or_else(|| SchemaError::UnknownRelationship {
                kind: def.kind.clone(),
                relationship: prop.via.clone(),
            })?;
        if rel.target == def.kind {
            return Err(SchemaError::SelfPropagation {
                kind: def.kind.clone(),
                via: prop.via.clone(),
            });
        }

        // Targets were checked above, so the lookup cannot miss.
        let Some(target) = all.get(&rel.target) else {
            continue;
        };
        let back = target
            .relationship(&prop.as_path)
            .ok_or_else(|| SchemaError::UnknownRelationship {
                kind: target.kind.clone(),
                relationship: prop.as_path.clone(),
            })?;
        if back.target != def.kind {
            return Err(SchemaError::UnresolvableTraversal {
                kind: def.kind.clone(),
                via: prop.via.clone(),
                target: target.kind.clone(),
                as_path: prop.as_path.clone(),
            });
        }

        if let Some(key) = &prop.on_insert_or_delete {
            if !target.is_raw(key) {
                return Err(SchemaError::UnknownKey {
                    kind: target.kind.clone(),
                    key: key.clone(),
                });
            }
        }
        for key in &prop.required_keys {
            if !def.is_raw(key) {
                return Err(SchemaError::UnknownKey {
                    kind: def.kind.clone(),
                    key: key.clone(),
                });
            }
        }

        propagations.push(CompiledPropagation {
            via: prop.via.clone(),
            target: target.kind.clone(),
            as_path: prop.as_path.clone(),
            on_insert_or_delete: prop.on_insert_or_delete.clone(),
            forward_as: prop.forward_as.clone(),
            required_keys: prop.required_keys.iter().cloned().collect(),
        });
    }

    Ok(KindTable {
        definition: def.clone(),
        observable,
        affected,
        propagations,
    })
}

/// Check that `path` names a raw key, either on `def` or one hop away.
fn resolve_path(
    def: &EntityDefinition,
    observed: &Attribute,
    path: &KeyPath,
    all: &IndexMap<EntityKind, EntityDefinition>,
) -> Result<(), SchemaError> {
    let owner = match path.relationship() {
        None => {
            if path.key() == observed {
                return Err(SchemaError::SelfDependency {
                    kind: def.kind.clone(),
                    key: observed.clone(),
                });
            }
            def
        }
        Some(rel_name) => {
            let rel = def
                .relationship(rel_name)
                .ok_or_else(|| SchemaError::UnknownRelationship {
                    kind: def.kind.clone(),
                    relationship: rel_name.clone(),
                })?;
            all.get(&rel.target)
                .ok_or_else(|| SchemaError::UnknownTargetKind {
                    kind: def.kind.clone(),
                    relationship: rel.name.clone(),
                    target: rel.target.clone(),
                })?
        }
    };

    if owner.is_raw(path.key()) {
        return Ok(());
    }
    if owner.observable.iter().any(|o| o.key == *path.key()) {
        return Err(SchemaError::DerivedDependency {
            kind: def.kind.clone(),
            key: observed.clone(),
            dependency: Attribute::new(path.to_string()),
        });
    }
    Err(SchemaError::UnknownKey {
        kind: owner.kind.clone(),
        key: path.key().clone(),
    })
}
