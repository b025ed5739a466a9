//! Ripple Core
//!
//! This crate provides change observation for object graphs kept in an
//! external store. It implements:
//!
//! - A static dependency table from raw attribute writes to the observable
//!   keys they affect, on the written object and one relationship away
//! - Per-object snapshots for recovering changes the store cannot report
//! - Precise and coarse change accumulators behind one contract
//! - An ordered-collection differ producing edit scripts for list widgets
//! - A dispatcher session object delivering accumulated changes to consumers
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `model`: Entity references, attribute names, values and change records
//! - `schema`: Entity definitions and the dependency key store
//! - `store`: The read-only interface to the backing store
//! - `snapshot`: Last-known object values
//! - `detect`: Change accumulators
//! - `diff`: Ordered-collection differ
//! - `dispatch`: Notification dispatcher
//!
//! Nothing in the crate blocks or performs I/O. The dependency key store is
//! immutable once built and can be shared between sessions; snapshots and
//! accumulators belong to one session.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ripple_core::detect::{ChangeDetector, DetailedChangeDetector};
//! use ripple_core::schema::{DependencyKeyStore, EntityDefinition, PropagationDefinition};
//! use ripple_core::store::MemoryStore;
//!
//! let key_store = Arc::new(DependencyKeyStore::new([
//!     EntityDefinition::new("User")
//!         .attribute("name")
//!         .to_many("conversations", "Conversation")
//!         .observe_raw("name")
//!         .propagate(PropagationDefinition::new("conversations", "participants")),
//!     EntityDefinition::new("Conversation")
//!         .attribute("userDefinedName")
//!         .to_many("participants", "User")
//!         .observe("displayName", ["userDefinedName", "participants.name"]),
//! ])?);
//!
//! let mut store = MemoryStore::new();
//! let user = store.insert("User");
//! let conversation = store.insert("Conversation");
//! store.relate(&user, "conversations", [conversation.clone()]);
//! store.save();
//! store.take_batch();
//!
//! let mut detector = DetailedChangeDetector::new(key_store);
//! store.set(&user, "name", "Bruno");
//! detector.detect_changes(&store.take_batch(), &store);
//!
//! let changes = detector.consume();
//! assert!(changes.get(&conversation).unwrap().contains("displayName"));
//! # Ok::<(), ripple_core::error::SchemaError>(())
//! ```

pub mod model;
pub mod schema;
pub mod store;
pub mod snapshot;
pub mod detect;
pub mod diff;
pub mod dispatch;
pub mod error;

pub use detect::{
    ChangeDetector, DetailedChangeDetector, PotentialChangeDetector, PotentialChanges,
};
pub use diff::{EditScript, ListSnapshot, MoveMode, MovedIndex, OrderedState};
pub use dispatch::{
    ChangeConsumer, DispatcherConfig, Notification, NotificationDispatcher, OperationMode,
};
pub use error::{DiffError, Error, Result, SchemaError};
pub use model::{
    Attribute, ChangeRecord, ChangeSet, EntityKind, EntityRef, ModifiedObjects, Value,
};
pub use schema::{DependencyKeyStore, EntityDefinition};
pub use snapshot::SnapshotStore;
pub use store::{MemoryStore, ObjectStore};
