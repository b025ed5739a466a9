//! Notification Dispatch
//!
//! The dispatcher is the session object for one observation scope. It owns
//! the change accumulator, is told about every tick of the store, and hands
//! consumers the accumulated changes whenever it fires.
//!
//! # Lifecycle
//!
//! 1. The host creates one dispatcher per consistent view of its store and
//!    registers consumers. Consumers are held weakly.
//! 2. After each tick the host calls
//!    [`objects_did_change`](NotificationDispatcher::objects_did_change).
//! 3. On save (or whenever the host wants observers to catch up) it calls
//!    [`fire`](NotificationDispatcher::fire). The accumulated changes are
//!    drained, grouped by entity kind and delivered outside the lock.
//!
//! # Operation modes
//!
//! [`OperationMode::Normal`] resolves observable keys precisely.
//! [`OperationMode::Economical`] only tracks which objects were touched and
//! keeps no snapshots, for hosts running in the background.

mod dispatcher;

pub use dispatcher::NotificationDispatcher;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::detect::PotentialChangeRecord;
use crate::model::{ChangeRecord, EntityKind};

/// Which accumulator strategy a dispatcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    #[default]
    Normal,
    Economical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub operation_mode: OperationMode,
    pub enabled: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            operation_mode: OperationMode::Normal,
            enabled: true,
        }
    }
}

/// Changes delivered to consumers, grouped by entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Detailed(IndexMap<EntityKind, ChangeRecord>),
    Potential(IndexMap<EntityKind, PotentialChangeRecord>),
}

impl Notification {
    /// Group a detailed record by entity kind.
    pub fn from_record(record: ChangeRecord) -> Self {
        let mut groups: IndexMap<EntityKind, ChangeRecord> = IndexMap::new();
        for (object, changes) in record {
            groups
                .entry(object.kind().clone())
                .or_default()
                .merge(object, changes);
        }
        Notification::Detailed(groups)
    }

    /// Group a potential record by entity kind.
    pub fn from_potential(record: PotentialChangeRecord) -> Self {
        let mut groups: IndexMap<EntityKind, PotentialChangeRecord> = IndexMap::new();
        for (object, flags) in record {
            groups
                .entry(object.kind().clone())
                .or_default()
                .insert(object, flags);
        }
        Notification::Potential(groups)
    }

    /// Detailed changes of one kind. `None` for potential notifications.
    pub fn detailed(&self, kind: &EntityKind) -> Option<&ChangeRecord> {
        match self {
            Notification::Detailed(groups) => groups.get(kind),
            Notification::Potential(_) => None,
        }
    }

    /// Potential changes of one kind. `None` for detailed notifications.
    pub fn potential(&self, kind: &EntityKind) -> Option<&PotentialChangeRecord> {
        match self {
            Notification::Potential(groups) => groups.get(kind),
            Notification::Detailed(_) => None,
        }
    }

    /// Kinds with at least one change.
    pub fn kinds(&self) -> Vec<&EntityKind> {
        match self {
            Notification::Detailed(groups) => groups.keys().collect(),
            Notification::Potential(groups) => groups.keys().collect(),
        }
    }

    /// Number of changed objects across all kinds.
    pub fn len(&self) -> usize {
        match self {
            Notification::Detailed(groups) => groups.values().map(ChangeRecord::len).sum(),
            Notification::Potential(groups) => groups.values().map(IndexMap::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receives the changes of a dispatcher.
///
/// Called outside the dispatcher's locks, so consumers may call back into
/// the dispatcher.
pub trait ChangeConsumer: Send + Sync {
    fn objects_did_change(&self, notification: &Notification);

    /// The dispatcher was re-enabled.
    fn start_observing(&self) {}

    /// The dispatcher was disabled and dropped all pending changes.
    fn stop_observing(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::PotentialChanges;
    use crate::model::{ChangeSet, EntityRef};

    #[test]
    fn config_defaults() {
        let config: DispatcherConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DispatcherConfig::default());

        let config: DispatcherConfig =
            serde_json::from_str(r#"{"operation_mode": "economical"}"#).unwrap();
        assert_eq!(config.operation_mode, OperationMode::Economical);
        assert!(config.enabled);
    }

    #[test]
    fn groups_by_kind() {
        let record: ChangeRecord = [
            (EntityRef::new("User", 1), ChangeSet::from_keys(["name"])),
            (EntityRef::new("Conversation", 2), ChangeSet::from_keys(["displayName"])),
            (EntityRef::new("User", 3), ChangeSet::from_keys(["handle"])),
        ]
        .into_iter()
        .collect();

        let notification = Notification::from_record(record);
        assert_eq!(notification.len(), 3);
        assert_eq!(
            notification.kinds(),
            [&EntityKind::new("User"), &EntityKind::new("Conversation")]
        );
        assert_eq!(notification.detailed(&EntityKind::new("User")).unwrap().len(), 2);
        assert!(notification.potential(&EntityKind::new("User")).is_none());
    }

    #[test]
    fn groups_potential_changes() {
        let record: PotentialChangeRecord = [
            (EntityRef::new("User", 1), PotentialChanges::UPDATED),
            (EntityRef::new("Team", 2), PotentialChanges::DELETED),
        ]
        .into_iter()
        .collect();

        let notification = Notification::from_potential(record);
        assert_eq!(
            notification.potential(&EntityKind::new("Team")).unwrap()[&EntityRef::new("Team", 2)],
            PotentialChanges::DELETED
        );
        assert!(!notification.is_empty());
    }
}
