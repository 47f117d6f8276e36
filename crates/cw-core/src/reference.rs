//! Lightweight handles to catalog assets.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Envelope key carrying the asset id.
pub const ID_KEY: &str = "_id";
/// Envelope key carrying the asset type identifier.
pub const TYPE_KEY: &str = "_type";
/// Envelope key carrying the display name.
pub const NAME_KEY: &str = "_name";

/// An unresolved handle to a catalog asset.
///
/// Holding a `Reference` does not imply the asset has been fetched. Equality
/// and hashing consider only `(id, type_id)`, so two handles to the same asset
/// compare equal regardless of which display attributes each happened to
/// carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    id: String,
    type_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    known_attributes: BTreeMap<String, Value>,
}

impl Reference {
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            known_attributes: BTreeMap::new(),
        }
    }

    /// Adds a known attribute, returning the updated handle.
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.known_attributes.insert(name.into(), value);
        self
    }

    /// Builds a handle from a reference stub such as
    /// `{"_id": "c1", "_type": "column", "_name": "order_id"}`.
    ///
    /// Every key other than `_id` and `_type` becomes a known attribute.
    /// Returns `None` when the value is not an object with string `_id` and
    /// `_type` fields.
    pub fn from_stub(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let id = fields.get(ID_KEY)?.as_str()?;
        let type_id = fields.get(TYPE_KEY)?.as_str()?;
        let known_attributes = fields
            .iter()
            .filter(|(key, _)| key.as_str() != ID_KEY && key.as_str() != TYPE_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Self {
            id: id.to_string(),
            type_id: type_id.to_string(),
            known_attributes,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn known_attributes(&self) -> &BTreeMap<String, Value> {
        &self.known_attributes
    }

    /// Returns a known attribute, if the handle carries it.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.known_attributes.get(name)
    }

    /// Display name, if the catalog supplied one with the handle.
    pub fn name(&self) -> Option<&str> {
        self.attribute(NAME_KEY).and_then(Value::as_str)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.type_id == other.type_id
    }
}

impl Eq for Reference {}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.type_id.hash(state);
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_id, self.id)
    }
}
