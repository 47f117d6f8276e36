//! Asset type descriptors.
//!
//! A descriptor is the runtime replacement for a generated per-type class:
//! it says which property names an asset type declares and how each one
//! decodes.

use crate::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Type id the catalog uses for "any asset", meaning the relationship target is unknown.
const ANY_ASSET_TYPE: &str = "main_object";

/// The property conventionally identifying an asset within its container.
const DEFAULT_IDENTIFYING_PROPERTY: &str = "name";

/// Value kind of a scalar property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    String,
    Text,
    Number,
    Integer,
    Double,
    Boolean,
    Date,
    DateTime,
    Enum,
}

impl ScalarKind {
    /// Maps a catalog type id to a scalar kind. Returns `None` for asset
    /// types, which make the property a relationship.
    pub fn from_type_id(type_id: &str) -> Option<Self> {
        let kind = match type_id.to_ascii_lowercase().as_str() {
            "string" | "url" | "email" => ScalarKind::String,
            "text" | "note" => ScalarKind::Text,
            "number" => ScalarKind::Number,
            "integer" | "int" | "long" => ScalarKind::Integer,
            "double" | "float" | "decimal" => ScalarKind::Double,
            "boolean" | "bool" => ScalarKind::Boolean,
            "date" => ScalarKind::Date,
            "datetime" | "timestamp" => ScalarKind::DateTime,
            "enum" => ScalarKind::Enum,
            _ => return None,
        };
        Some(kind)
    }
}

/// A declared scalar property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarProperty {
    pub name: String,
    pub kind: ScalarKind,
}

/// How a declared property decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind<'a> {
    Scalar(ScalarKind),
    /// Single relationship, with the target type if the schema names one.
    SingleRelationship(Option<&'a str>),
    /// Collection relationship, with the target type if the schema names one.
    CollectionRelationship(Option<&'a str>),
}

impl PropertyKind<'_> {
    pub fn is_relationship(&self) -> bool {
        !matches!(self, PropertyKind::Scalar(_))
    }
}

/// Schema of one asset type. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTypeDescriptor {
    type_id: String,
    display_name: String,
    scalar_properties: Vec<ScalarProperty>,
    single_relationships: BTreeMap<String, Option<String>>,
    collection_relationships: BTreeMap<String, Option<String>>,
    identifying_properties: BTreeSet<String>,
    #[serde(default)]
    unknown: bool,
}

impl AssetTypeDescriptor {
    /// Starts building a descriptor.
    pub fn builder(
        type_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> AssetTypeDescriptorBuilder {
        AssetTypeDescriptorBuilder {
            descriptor: AssetTypeDescriptor {
                type_id: type_id.into(),
                display_name: display_name.into(),
                scalar_properties: Vec::new(),
                single_relationships: BTreeMap::new(),
                collection_relationships: BTreeMap::new(),
                identifying_properties: BTreeSet::new(),
                unknown: false,
            },
        }
    }

    /// The degraded descriptor for a type that could not be resolved: zero
    /// declared properties, so everything decodes as unmodeled.
    pub fn unknown(type_id: impl Into<String>) -> Self {
        let type_id = type_id.into();
        Self {
            display_name: type_id.clone(),
            type_id,
            scalar_properties: Vec::new(),
            single_relationships: BTreeMap::new(),
            collection_relationships: BTreeMap::new(),
            identifying_properties: BTreeSet::new(),
            unknown: true,
        }
    }

    /// Builds a descriptor from a type schema document (`GET /types/{id}`).
    ///
    /// ```
    /// use cw_core::registry::{AssetTypeDescriptor, PropertyKind};
    /// use serde_json::json;
    ///
    /// let descriptor = AssetTypeDescriptor::from_schema(&json!({
    ///     "_id": "table",
    ///     "_name": "Database Table",
    ///     "properties": [
    ///         {"name": "name", "type": {"_id": "string"}, "maxNumber": 1},
    ///         {"name": "columns", "type": {"_id": "column"}, "maxNumber": -1}
    ///     ]
    /// })).unwrap();
    ///
    /// assert_eq!(
    ///     descriptor.kind_of("columns"),
    ///     Some(PropertyKind::CollectionRelationship(Some("column")))
    /// );
    /// ```
    pub fn from_schema(schema: &Value) -> CatalogResult<Self> {
        let document: TypeSchemaDocument = serde_json::from_value(schema.clone())
            .map_err(|e| CatalogError::MalformedEnvelope(format!("type schema: {}", e)))?;

        let display_name = document.name.unwrap_or_else(|| document.id.clone());
        let mut builder = Self::builder(document.id, display_name);

        for property in document.properties {
            let target = property.value_type.and_then(|t| t.id);
            // Without a type the value may be any asset.
            let scalar = target.as_deref().and_then(ScalarKind::from_type_id);

            builder = match scalar {
                Some(kind) => builder.scalar(property.name, kind),
                None => {
                    let target = target.filter(|t| t != ANY_ASSET_TYPE);
                    if property.max_number.unwrap_or(1) == 1 {
                        builder.single(property.name, target)
                    } else {
                        builder.collection(property.name, target)
                    }
                }
            };
        }

        let identifying = match document.identifying_properties {
            Some(names) => names,
            None if builder.declares(DEFAULT_IDENTIFYING_PROPERTY) => {
                vec![DEFAULT_IDENTIFYING_PROPERTY.to_string()]
            }
            None => Vec::new(),
        };
        for name in identifying {
            builder = builder.identifying(name);
        }

        Ok(builder.build())
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// True for the degraded descriptor of an unresolved type.
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    pub fn scalar_properties(&self) -> &[ScalarProperty] {
        &self.scalar_properties
    }

    pub fn single_relationships(&self) -> &BTreeMap<String, Option<String>> {
        &self.single_relationships
    }

    pub fn collection_relationships(&self) -> &BTreeMap<String, Option<String>> {
        &self.collection_relationships
    }

    pub fn identifying_properties(&self) -> &BTreeSet<String> {
        &self.identifying_properties
    }

    /// How `name` decodes, or `None` if the type does not declare it.
    pub fn kind_of(&self, name: &str) -> Option<PropertyKind<'_>> {
        if let Some(property) = self.scalar_properties.iter().find(|p| p.name == name) {
            return Some(PropertyKind::Scalar(property.kind));
        }
        if let Some(target) = self.single_relationships.get(name) {
            return Some(PropertyKind::SingleRelationship(target.as_deref()));
        }
        self.collection_relationships
            .get(name)
            .map(|target| PropertyKind::CollectionRelationship(target.as_deref()))
    }

    pub fn declares(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// Every declared property name: scalars in declaration order, then
    /// single and collection relationships.
    pub fn property_names(&self) -> Vec<String> {
        self.scalar_properties
            .iter()
            .map(|p| p.name.clone())
            .chain(self.single_relationships.keys().cloned())
            .chain(self.collection_relationships.keys().cloned())
            .collect()
    }
}

/// Builder for [`AssetTypeDescriptor`], used by generated schema tables.
#[derive(Debug, Clone)]
pub struct AssetTypeDescriptorBuilder {
    descriptor: AssetTypeDescriptor,
}

impl AssetTypeDescriptorBuilder {
    /// Declares a scalar property. Redeclaring a name replaces the earlier declaration.
    pub fn scalar(mut self, name: impl Into<String>, kind: ScalarKind) -> Self {
        let name = name.into();
        self.forget(&name);
        self.descriptor
            .scalar_properties
            .push(ScalarProperty { name, kind });
        self
    }

    pub fn single(mut self, name: impl Into<String>, target: Option<String>) -> Self {
        let name = name.into();
        self.forget(&name);
        self.descriptor.single_relationships.insert(name, target);
        self
    }

    pub fn collection(mut self, name: impl Into<String>, target: Option<String>) -> Self {
        let name = name.into();
        self.forget(&name);
        self.descriptor.collection_relationships.insert(name, target);
        self
    }

    pub fn identifying(mut self, name: impl Into<String>) -> Self {
        self.descriptor.identifying_properties.insert(name.into());
        self
    }

    fn declares(&self, name: &str) -> bool {
        self.descriptor.declares(name)
    }

    fn forget(&mut self, name: &str) {
        self.descriptor.scalar_properties.retain(|p| p.name != name);
        self.descriptor.single_relationships.remove(name);
        self.descriptor.collection_relationships.remove(name);
    }

    pub fn build(self) -> AssetTypeDescriptor {
        self.descriptor
    }
}

#[derive(Debug, Deserialize)]
struct TypeSchemaDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_name", default)]
    name: Option<String>,
    #[serde(default)]
    properties: Vec<PropertySchema>,
    #[serde(rename = "identifyingProperties", default)]
    identifying_properties: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PropertySchema {
    name: String,
    #[serde(rename = "type", default)]
    value_type: Option<TypeRef>,
    #[serde(rename = "maxNumber", default)]
    max_number: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TypeRef {
    #[serde(rename = "_id", default)]
    id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table_schema() -> Value {
        json!({
            "_id": "table",
            "_name": "Database Table",
            "properties": [
                {"name": "name", "type": {"_id": "string"}, "maxNumber": 1},
                {"name": "modified_on", "type": {"_id": "datetime"}, "maxNumber": 1},
                {"name": "owner", "type": {"_id": "user"}, "maxNumber": 1},
                {"name": "columns", "type": {"_id": "column"}, "maxNumber": -1},
                {"name": "assigned_to_terms", "type": {"_id": "main_object"}, "maxNumber": -1},
                {"name": "description", "type": {"_id": "text"}},
                {"name": "derived_from"}
            ]
        })
    }

    #[test]
    fn test_from_schema_classifies_properties() {
        let descriptor = AssetTypeDescriptor::from_schema(&table_schema()).unwrap();

        assert_eq!(descriptor.type_id(), "table");
        assert_eq!(descriptor.display_name(), "Database Table");
        assert_eq!(
            descriptor.kind_of("modified_on"),
            Some(PropertyKind::Scalar(ScalarKind::DateTime))
        );
        assert_eq!(
            descriptor.kind_of("owner"),
            Some(PropertyKind::SingleRelationship(Some("user")))
        );
        assert_eq!(
            descriptor.kind_of("assigned_to_terms"),
            Some(PropertyKind::CollectionRelationship(None))
        );
        assert_eq!(
            descriptor.kind_of("description"),
            Some(PropertyKind::Scalar(ScalarKind::Text))
        );
        assert_eq!(
            descriptor.kind_of("derived_from"),
            Some(PropertyKind::SingleRelationship(None))
        );
        assert_eq!(descriptor.kind_of("nope"), None);
        assert!(!descriptor.is_unknown());
    }

    #[test]
    fn test_untyped_property_is_relationship_to_any_asset() {
        let descriptor = AssetTypeDescriptor::from_schema(&json!({
            "_id": "job",
            "properties": [
                {"name": "input", "maxNumber": -1},
                {"name": "output", "type": null, "maxNumber": 1},
                {"name": "runner", "type": {}}
            ]
        }))
        .unwrap();

        assert_eq!(
            descriptor.kind_of("input"),
            Some(PropertyKind::CollectionRelationship(None))
        );
        assert_eq!(
            descriptor.kind_of("output"),
            Some(PropertyKind::SingleRelationship(None))
        );
        assert_eq!(
            descriptor.kind_of("runner"),
            Some(PropertyKind::SingleRelationship(None))
        );
        assert!(descriptor.scalar_properties().is_empty());
    }

    #[test]
    fn test_identifying_defaults_to_name() {
        let descriptor = AssetTypeDescriptor::from_schema(&table_schema()).unwrap();
        assert!(descriptor.identifying_properties().contains("name"));

        let explicit = AssetTypeDescriptor::from_schema(&json!({
            "_id": "column",
            "properties": [{"name": "name", "type": {"_id": "string"}}],
            "identifyingProperties": ["name", "table"]
        }))
        .unwrap();
        assert_eq!(explicit.identifying_properties().len(), 2);
        assert_eq!(explicit.display_name(), "column");
    }

    #[test]
    fn test_property_names_order() {
        let descriptor = AssetTypeDescriptor::builder("table", "Table")
            .scalar("name", ScalarKind::String)
            .scalar("created_on", ScalarKind::Date)
            .single("owner", Some("user".to_string()))
            .collection("columns", Some("column".to_string()))
            .build();
        assert_eq!(
            descriptor.property_names(),
            vec!["name", "created_on", "owner", "columns"]
        );
    }

    #[test]
    fn test_redeclaring_replaces_kind() {
        let descriptor = AssetTypeDescriptor::builder("table", "Table")
            .scalar("owner", ScalarKind::String)
            .single("owner", None)
            .build();
        assert_eq!(
            descriptor.kind_of("owner"),
            Some(PropertyKind::SingleRelationship(None))
        );
        assert_eq!(descriptor.property_names().len(), 1);
    }

    #[test]
    fn test_unknown_descriptor_declares_nothing() {
        let descriptor = AssetTypeDescriptor::unknown("mystery");
        assert!(descriptor.is_unknown());
        assert!(descriptor.property_names().is_empty());
        assert_eq!(descriptor.type_id(), "mystery");
    }

    #[test]
    fn test_malformed_schema() {
        let err = AssetTypeDescriptor::from_schema(&json!({"properties": []})).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedEnvelope(_)));
    }
}
