//! Data Model
//!
//! The types every other module speaks in: who an object is, what its fields
//! are called, what values they hold, and which objects a transaction touched.
//!
//! # Identity
//!
//! An [`EntityRef`] is an opaque handle to an object living in the backing
//! store. It is compared and hashed by identity (kind plus object id), never
//! by the values the object holds. The core never owns or dereferences the
//! object behind it; it only uses the handle as a map and set key.
//!
//! # Names
//!
//! Entity kinds and attribute names are cheap-to-clone interned strings.
//! Raw attributes are the fields the store writes; observable attributes are
//! the names observers subscribe to. Both share the [`Attribute`] type.

mod entity;
mod value;
mod batch;
mod changes;

pub use entity::{Attribute, EntityKind, EntityRef, KeySet, ObjectId};
pub use value::Value;
pub use batch::ModifiedObjects;
pub use changes::{ChangeRecord, ChangeSet, ForwardedChanges};
