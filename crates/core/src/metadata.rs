//! Export metadata and typed metadata views

use crate::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single metadata value. Equality is structural, arrays included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// String
    Str(String),
    /// A type reference
    Type(TypeRef),
    /// Ordered collection of values
    Array(Vec<MetadataValue>),
}

/// Export metadata: key order is irrelevant
pub type Metadata = BTreeMap<String, MetadataValue>;

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        MetadataValue::Int(v as i64)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Str(v)
    }
}

impl From<TypeRef> for MetadataValue {
    fn from(v: TypeRef) -> Self {
        MetadataValue::Type(v)
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(v: Vec<T>) -> Self {
        MetadataValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl MetadataValue {
    /// String payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Declaration of a typed metadata view.
///
/// Each key is either required (`None`) or optional with a default. An
/// export is visible through the view only if it carries every required key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataViewDefinition {
    /// The view type importers name
    pub view_type: TypeRef,
    /// Key -> default value (`None` = required)
    pub keys: BTreeMap<String, Option<MetadataValue>>,
}

impl MetadataViewDefinition {
    /// A view with no keys; every export satisfies it
    pub fn new(view_type: TypeRef) -> Self {
        MetadataViewDefinition {
            view_type,
            keys: BTreeMap::new(),
        }
    }

    /// Add a required key
    pub fn required(mut self, key: impl Into<String>) -> Self {
        self.keys.insert(key.into(), None);
        self
    }

    /// Add an optional key with a default
    pub fn optional(mut self, key: impl Into<String>, default: impl Into<MetadataValue>) -> Self {
        self.keys.insert(key.into(), Some(default.into()));
        self
    }

    /// Whether `metadata` carries every required key
    pub fn accepts(&self, metadata: &Metadata) -> bool {
        self.keys
            .iter()
            .all(|(key, default)| default.is_some() || metadata.contains_key(key))
    }

    /// Project `metadata` onto this view, filling defaults.
    ///
    /// Returns `None` when a required key is missing.
    pub fn project(&self, metadata: &Metadata) -> Option<MetadataView> {
        let mut values = Metadata::new();
        for (key, default) in &self.keys {
            let value = metadata.get(key).or(default.as_ref())?;
            values.insert(key.clone(), value.clone());
        }
        Some(MetadataView {
            view_type: self.view_type.clone(),
            values,
        })
    }
}

/// Metadata as seen through a [`MetadataViewDefinition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataView {
    view_type: TypeRef,
    values: Metadata,
}

impl MetadataView {
    /// The view type
    pub fn view_type(&self) -> &TypeRef {
        &self.view_type
    }

    /// Value of a view key
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.values.get(key)
    }

    /// All projected values
    pub fn values(&self) -> &Metadata {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> MetadataViewDefinition {
        MetadataViewDefinition::new(TypeRef::named("Views.IFlavor"))
            .required("Flavor")
            .optional("Ripe", true)
    }

    #[test]
    fn test_structural_equality_of_arrays() {
        let a: MetadataValue = vec!["x", "y"].into();
        let b = MetadataValue::Array(vec![MetadataValue::from("x"), MetadataValue::from("y")]);
        assert_eq!(a, b);
        let c: MetadataValue = vec!["y", "x"].into();
        assert_ne!(a, c);
    }

    #[test]
    fn test_metadata_ignores_insertion_order() {
        let mut m1 = Metadata::new();
        m1.insert("a".into(), 1.into());
        m1.insert("b".into(), "two".into());
        let mut m2 = Metadata::new();
        m2.insert("b".into(), "two".into());
        m2.insert("a".into(), 1.into());
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_view_accepts_required_keys_only() {
        let mut md = Metadata::new();
        assert!(!view().accepts(&md));
        md.insert("Flavor".into(), "sour".into());
        assert!(view().accepts(&md));
    }

    #[test]
    fn test_view_projection_fills_defaults() {
        let mut md = Metadata::new();
        md.insert("Flavor".into(), "sweet".into());
        md.insert("Unrelated".into(), 3.into());

        let projected = view().project(&md).unwrap();
        assert_eq!(projected.get("Flavor").and_then(|v| v.as_str()), Some("sweet"));
        assert_eq!(projected.get("Ripe").and_then(|v| v.as_bool()), Some(true));
        assert!(projected.get("Unrelated").is_none());

        assert!(view().project(&Metadata::new()).is_none());
    }
}
