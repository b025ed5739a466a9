//! Dependency Key Store
//!
//! This module turns declarative per-kind entity definitions into the static
//! table that maps a raw attribute mutation to the observable attributes it
//! affects.
//!
//! # Overview
//!
//! Every entity kind declares:
//!
//! - its raw attributes and relationships (the fields the store writes),
//! - its observable keys, each with the key paths affecting it,
//! - propagations: relationships through which a change on this kind affects
//!   observable keys on *another* kind.
//!
//! A key path is either a raw key on the same object (`name`) or a raw key on
//! an object reached through one relationship (`participants.name`).
//!
//! # Propagation is one hop
//!
//! A mutation affects observable keys on its own object, and observable keys
//! on objects one relationship away. Nothing chains further within a pass, so
//! definitions that would need chaining (an observable key depending on a
//! derived key, or a key depending on itself) are rejected when the table is
//! built, as are traversals that do not resolve.
//!
//! # Lookups
//!
//! The table is compiled once and is immutable afterwards. Every lookup is a
//! single hash-map probe; the store is safe to share between sessions behind
//! an `Arc`.

mod definition;
mod key_store;

pub use definition::{
    Cardinality, EntityDefinition, KeyPath, ObservableDefinition, PropagationDefinition,
    RelationshipDefinition,
};
pub use key_store::{DependencyKeyStore, RelatedChanges};
