//! Declarative entity definitions.
//!
//! These are plain data and round-trip through serde, so a schema can live in
//! a JSON document next to the application instead of in code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::model::{Attribute, EntityKind};

/// How many objects a relationship holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// A relationship from one kind to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub name: Attribute,
    pub target: EntityKind,
    pub cardinality: Cardinality,
}

/// A key that is either local (`name`) or reached through one relationship
/// (`participants.name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath {
    relationship: Option<Attribute>,
    key: Attribute,
}

impl KeyPath {
    /// A key on the object itself.
    pub fn local(key: impl Into<Attribute>) -> Self {
        Self {
            relationship: None,
            key: key.into(),
        }
    }

    /// A key on the objects behind `relationship`.
    pub fn through(relationship: impl Into<Attribute>, key: impl Into<Attribute>) -> Self {
        Self {
            relationship: Some(relationship.into()),
            key: key.into(),
        }
    }

    /// The relationship crossed, if any.
    pub fn relationship(&self) -> Option<&Attribute> {
        self.relationship.as_ref()
    }

    /// The raw key read at the end of the path.
    pub fn key(&self) -> &Attribute {
        &self.key
    }
}

impl FromStr for KeyPath {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SchemaError::MalformedKeyPath(s.to_owned());
        let mut parts = s.split('.');
        let first = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        match (parts.next(), parts.next()) {
            (None, _) => Ok(KeyPath::local(first)),
            (Some(second), None) if !second.is_empty() => Ok(KeyPath::through(first, second)),
            _ => Err(malformed()),
        }
    }
}

impl TryFrom<String> for KeyPath {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relationship {
            Some(rel) => write!(f, "{rel}.{}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// An observable key and the key paths that affect it.
///
/// When the observable key is also a raw key it reports itself; it must not
/// list itself in `affected_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservableDefinition {
    pub key: Attribute,
    #[serde(default)]
    pub affected_by: Vec<KeyPath>,
}

/// How a change on this kind reaches objects of another kind.
///
/// Objects reached through `via` see this object's raw keys as
/// `<as_path>.<key>`; `as_path` is the relationship on the target that points
/// back at this kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationDefinition {
    pub via: Attribute,
    pub as_path: Attribute,
    /// Raw key on the target treated as changed when an object of this kind
    /// is inserted or deleted.
    #[serde(default)]
    pub on_insert_or_delete: Option<Attribute>,
    /// Label under which this object's raw changes are forwarded to targets.
    #[serde(default)]
    pub forward_as: Option<Attribute>,
    /// Forward only when one of these raw keys changed. Empty means always.
    #[serde(default)]
    pub required_keys: Vec<Attribute>,
}

impl PropagationDefinition {
    /// Propagate along `via`; `as_path` is the reverse relationship on the target.
    pub fn new(via: impl Into<Attribute>, as_path: impl Into<Attribute>) -> Self {
        Self {
            via: via.into(),
            as_path: as_path.into(),
            on_insert_or_delete: None,
            forward_as: None,
            required_keys: Vec::new(),
        }
    }

    /// Key reported on the targets when the source is inserted or deleted.
    pub fn on_insert_or_delete(mut self, key: impl Into<Attribute>) -> Self {
        self.on_insert_or_delete = Some(key.into());
        self
    }

    /// Forward the source's raw changes to the targets under `label`.
    pub fn forward_as(mut self, label: impl Into<Attribute>) -> Self {
        self.forward_as = Some(label.into());
        self
    }

    /// Only forward when one of these raw keys changed.
    pub fn required_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Attribute>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything the key store needs to know about one entity kind.
///
/// # Example
///
/// ```rust
/// use ripple_core::schema::{EntityDefinition, PropagationDefinition};
///
/// let user = EntityDefinition::new("User")
///     .attribute("name")
///     .to_many("conversations", "Conversation")
///     .observe_raw("name")
///     .propagate(PropagationDefinition::new("conversations", "participants"));
/// assert_eq!(user.attributes.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub kind: EntityKind,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
    #[serde(default)]
    pub observable: Vec<ObservableDefinition>,
    #[serde(default)]
    pub propagations: Vec<PropagationDefinition>,
    /// Key paths handed to [`EntityDefinition::observe`] that failed to parse.
    #[serde(skip)]
    pub(crate) malformed_paths: Vec<String>,
}

impl EntityDefinition {
    /// Start a definition for `kind`.
    pub fn new(kind: impl Into<EntityKind>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            observable: Vec::new(),
            propagations: Vec::new(),
            malformed_paths: Vec::new(),
        }
    }

    /// Declare a raw attribute.
    pub fn attribute(mut self, name: impl Into<Attribute>) -> Self {
        self.attributes.push(name.into());
        self
    }

    /// Declare a to-one relationship.
    pub fn to_one(mut self, name: impl Into<Attribute>, target: impl Into<EntityKind>) -> Self {
        self.relationships.push(RelationshipDefinition {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToOne,
        });
        self
    }

    /// Declare a to-many relationship.
    pub fn to_many(mut self, name: impl Into<Attribute>, target: impl Into<EntityKind>) -> Self {
        self.relationships.push(RelationshipDefinition {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::ToMany,
        });
        self
    }

    /// Declare an observable key. Each entry of `affected_by` is parsed as a
    /// key path; a malformed path is reported when the table is built.
    pub fn observe<I, P>(mut self, key: impl Into<Attribute>, affected_by: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut paths = Vec::new();
        for path in affected_by {
            match path.as_ref().parse::<KeyPath>() {
                Ok(parsed) => paths.push(parsed),
                Err(_) => self.malformed_paths.push(path.as_ref().to_owned()),
            }
        }
        self.observable.push(ObservableDefinition {
            key: key.into(),
            affected_by: paths,
        });
        self
    }

    /// Declare a raw key as observable with no further dependencies.
    pub fn observe_raw(mut self, key: impl Into<Attribute>) -> Self {
        self.observable.push(ObservableDefinition {
            key: key.into(),
            affected_by: Vec::new(),
        });
        self
    }

    /// Add a propagation to related objects.
    pub fn propagate(mut self, propagation: PropagationDefinition) -> Self {
        self.propagations.push(propagation);
        self
    }

    pub(crate) fn relationship(&self, name: &Attribute) -> Option<&RelationshipDefinition> {
        self.relationships.iter().find(|r| &r.name == name)
    }

    pub(crate) fn is_raw(&self, key: &Attribute) -> bool {
        self.attributes.contains(key) || self.relationship(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_paths_parse() {
        assert_eq!("name".parse::<KeyPath>().unwrap(), KeyPath::local("name"));
        assert_eq!(
            "participants.name".parse::<KeyPath>().unwrap(),
            KeyPath::through("participants", "name")
        );
        assert!("a.b.c".parse::<KeyPath>().is_err());
        assert!("".parse::<KeyPath>().is_err());
        assert!("participants.".parse::<KeyPath>().is_err());
    }

    #[test]
    fn key_path_display_round_trips() {
        let path = KeyPath::through("participants", "name");
        assert_eq!(path.to_string(), "participants.name");
        assert_eq!(path.to_string().parse::<KeyPath>().unwrap(), path);
    }

    #[test]
    fn definitions_deserialize_from_json() {
        let json = r#"{
            "kind": "Conversation",
            "attributes": ["userDefinedName"],
            "relationships": [
                {"name": "participants", "target": "User", "cardinality": "to_many"}
            ],
            "observable": [
                {"key": "displayName", "affected_by": ["userDefinedName", "participants.name"]}
            ]
        }"#;

        let def: EntityDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.kind, EntityKind::new("Conversation"));
        assert_eq!(def.relationships[0].cardinality, Cardinality::ToMany);
        assert_eq!(
            def.observable[0].affected_by[1],
            KeyPath::through("participants", "name")
        );
        assert!(def.propagations.is_empty());
    }

    #[test]
    fn malformed_paths_fail_deserialization() {
        let json = r#"{"key": "displayName", "affected_by": ["a.b.c"]}"#;
        assert!(serde_json::from_str::<ObservableDefinition>(json).is_err());
    }
}
