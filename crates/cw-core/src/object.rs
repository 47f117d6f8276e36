//! Resolved catalog objects.

use crate::collection::PagedCollection;
use crate::error::{CatalogError, CatalogResult, Warning};
use crate::reference::Reference;
use crate::registry::AssetTypeDescriptor;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Scalar(Value),
    Reference(Reference),
    Collection(PagedCollection),
}

impl PropertyValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            PropertyValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            PropertyValue::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&PagedCollection> {
        match self {
            PropertyValue::Collection(collection) => Some(collection),
            _ => None,
        }
    }
}

/// Which properties a fetch asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "properties", rename_all = "snake_case")]
pub enum LoadScope {
    /// Every declared property was requested.
    Full,
    /// Only the named properties (plus identifying ones) were requested.
    Partial(BTreeSet<String>),
}

impl LoadScope {
    pub fn partial<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LoadScope::Partial(names.into_iter().map(Into::into).collect())
    }

    /// Returns true if `name` was part of the request.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            LoadScope::Full => true,
            LoadScope::Partial(names) => names.contains(name),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, LoadScope::Full)
    }
}

/// Result of looking up a property by name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyLookup<'a> {
    /// Declared by the type and present on the asset.
    Present(&'a PropertyValue),
    /// Loaded, but the asset has no value for it.
    Absent,
    /// Present on the asset but not declared by its type (or the type is unknown).
    NotModeled(&'a Value),
    /// Outside the scope of a partial load; the asset may still have it.
    NotLoaded,
}

/// A fully or partially resolved asset.
///
/// Immutable. Refreshing an asset means resolving a new object.
#[derive(Debug, Clone, Serialize)]
pub struct DetailObject {
    reference: Reference,
    #[serde(skip)]
    descriptor: Arc<AssetTypeDescriptor>,
    properties: BTreeMap<String, PropertyValue>,
    unmodeled: BTreeMap<String, Value>,
    scope: LoadScope,
    opaque: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<Warning>,
}

impl DetailObject {
    pub(crate) fn new(
        reference: Reference,
        descriptor: Arc<AssetTypeDescriptor>,
        properties: BTreeMap<String, PropertyValue>,
        unmodeled: BTreeMap<String, Value>,
        scope: LoadScope,
        warnings: Vec<Warning>,
    ) -> Self {
        Self {
            opaque: descriptor.is_unknown(),
            reference,
            descriptor,
            properties,
            unmodeled,
            scope,
            warnings,
        }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    pub fn type_id(&self) -> &str {
        self.reference.type_id()
    }

    /// Descriptor the object was decoded with.
    pub fn descriptor(&self) -> &Arc<AssetTypeDescriptor> {
        &self.descriptor
    }

    /// Declared properties present on the asset.
    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Properties the asset's type does not declare, kept verbatim.
    pub fn unmodeled_properties(&self) -> &BTreeMap<String, Value> {
        &self.unmodeled
    }

    pub fn scope(&self) -> &LoadScope {
        &self.scope
    }

    /// True when the type could not be resolved and nothing was decoded.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Looks up a property, distinguishing "not on the asset" from "not requested".
    pub fn property(&self, name: &str) -> PropertyLookup<'_> {
        if let Some(value) = self.properties.get(name) {
            return PropertyLookup::Present(value);
        }
        if let Some(raw) = self.unmodeled.get(name) {
            return PropertyLookup::NotModeled(raw);
        }
        if self.scope.includes(name) {
            PropertyLookup::Absent
        } else {
            PropertyLookup::NotLoaded
        }
    }

    /// Returns a declared property's value, or [`CatalogError::NotLoaded`]
    /// when the property was outside a partial load.
    pub fn get(&self, name: &str) -> CatalogResult<Option<&PropertyValue>> {
        match self.property(name) {
            PropertyLookup::Present(value) => Ok(Some(value)),
            PropertyLookup::Absent | PropertyLookup::NotModeled(_) => Ok(None),
            PropertyLookup::NotLoaded => Err(CatalogError::NotLoaded {
                id: self.id().to_string(),
                property: name.to_string(),
            }),
        }
    }

    pub fn scalar(&self, name: &str) -> CatalogResult<Option<&Value>> {
        Ok(self.get(name)?.and_then(PropertyValue::as_scalar))
    }

    pub fn str_value(&self, name: &str) -> CatalogResult<Option<&str>> {
        Ok(self.scalar(name)?.and_then(Value::as_str))
    }

    pub fn reference_property(&self, name: &str) -> CatalogResult<Option<&Reference>> {
        Ok(self.get(name)?.and_then(PropertyValue::as_reference))
    }

    pub fn collection(&self, name: &str) -> CatalogResult<Option<&PagedCollection>> {
        Ok(self.get(name)?.and_then(PropertyValue::as_collection))
    }

    /// The asset's `name` property, falling back to the display name its
    /// reference carried.
    pub fn name(&self) -> Option<&str> {
        self.properties
            .get("name")
            .and_then(PropertyValue::as_scalar)
            .and_then(Value::as_str)
            .or_else(|| self.reference.name())
    }
}

impl PartialEq for DetailObject {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
            && self.properties == other.properties
            && self.unmodeled == other.unmodeled
            && self.scope == other.scope
            && self.opaque == other.opaque
            && self.warnings == other.warnings
    }
}
