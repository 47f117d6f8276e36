//! Polymorphic envelope decoding.
//!
//! Turns a raw object envelope into a [`DetailObject`] using only the type
//! identifier the envelope carries. Keys are classified against the type's
//! descriptor:
//!
//! | declaration             | decoded as                              |
//! |-------------------------|-----------------------------------------|
//! | scalar                  | [`PropertyValue::Scalar`]               |
//! | single relationship     | [`PropertyValue::Reference`]            |
//! | collection relationship | [`PropertyValue::Collection`]           |
//! | undeclared              | kept verbatim as an unmodeled property  |
//!
//! Extra or missing keys never fail decoding. Decoding the same envelope
//! twice yields equal objects.

use crate::collection::{Page, PagedCollection};
use crate::error::{CatalogError, CatalogResult, Warning};
use crate::metrics;
use crate::object::{DetailObject, LoadScope, PropertyValue};
use crate::reference::{Reference, ID_KEY, TYPE_KEY};
use crate::registry::{AssetTypeDescriptor, PropertyKind, TypeRegistry};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Decodes an envelope, resolving its `_type` through the registry.
pub async fn decode(
    envelope: &Value,
    registry: &TypeRegistry,
    scope: LoadScope,
) -> CatalogResult<DetailObject> {
    let fields = envelope_fields(envelope)?;
    let (_, type_id) = identity(fields)?;
    let resolution = registry.resolve(type_id).await;
    decode_fields(fields, resolution.descriptor, scope, resolution.warning)
}

/// Decodes an envelope against a known descriptor without touching the network.
///
/// `warning` is attached to the object as-is; callers pass the one produced
/// when the descriptor had to fall back to unknown.
pub fn decode_with(
    envelope: &Value,
    descriptor: Arc<AssetTypeDescriptor>,
    scope: LoadScope,
    warning: Option<Warning>,
) -> CatalogResult<DetailObject> {
    decode_fields(envelope_fields(envelope)?, descriptor, scope, warning)
}

/// Reads the `_type` an envelope declares.
pub(crate) fn envelope_type(envelope: &Value) -> CatalogResult<&str> {
    identity(envelope_fields(envelope)?).map(|(_, type_id)| type_id)
}

fn envelope_fields(envelope: &Value) -> CatalogResult<&Map<String, Value>> {
    envelope
        .as_object()
        .ok_or_else(|| CatalogError::MalformedEnvelope("envelope is not an object".to_string()))
}

fn identity(fields: &Map<String, Value>) -> CatalogResult<(&str, &str)> {
    let id = fields
        .get(ID_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::MalformedEnvelope(format!("missing '{}'", ID_KEY)))?;
    let type_id = fields
        .get(TYPE_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CatalogError::MalformedEnvelope(format!("missing '{}' on asset {}", TYPE_KEY, id))
        })?;
    Ok((id, type_id))
}

fn decode_fields(
    fields: &Map<String, Value>,
    descriptor: Arc<AssetTypeDescriptor>,
    scope: LoadScope,
    warning: Option<Warning>,
) -> CatalogResult<DetailObject> {
    let (id, type_id) = identity(fields)?;

    let mut reference = Reference::new(id, type_id);
    let mut properties = BTreeMap::new();
    let mut unmodeled = BTreeMap::new();
    let mut warnings: Vec<Warning> = warning.into_iter().collect();

    for (key, value) in fields {
        if key == ID_KEY || key == TYPE_KEY {
            continue;
        }
        if key.starts_with('_') {
            reference = reference.with_attribute(key.clone(), value.clone());
            continue;
        }

        let Some(kind) = descriptor.kind_of(key) else {
            unmodeled.insert(key.clone(), value.clone());
            continue;
        };
        // Outside a partial scope even if the server sent it anyway.
        if value.is_null() || !scope.includes(key) {
            continue;
        }

        match decode_value(&reference, key, kind, value) {
            Ok(decoded) => {
                properties.insert(key.clone(), decoded);
            }
            Err(expected) => {
                let anomaly = Warning::UnexpectedShape {
                    property: key.clone(),
                    expected: expected.to_string(),
                };
                warn!(asset = %reference, warning = %anomaly, "Keeping malformed property unmodeled");
                metrics::record_warning();
                warnings.push(anomaly);
                unmodeled.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(DetailObject::new(
        reference,
        descriptor,
        properties,
        unmodeled,
        scope,
        warnings,
    ))
}

/// Decodes one declared property, or names the shape it should have had.
fn decode_value(
    owner: &Reference,
    key: &str,
    kind: PropertyKind<'_>,
    value: &Value,
) -> Result<PropertyValue, &'static str> {
    match kind {
        PropertyKind::Scalar(_) => Ok(PropertyValue::Scalar(value.clone())),
        PropertyKind::SingleRelationship(_) => Reference::from_stub(value)
            .map(PropertyValue::Reference)
            .ok_or("a reference stub"),
        PropertyKind::CollectionRelationship(target) => Page::parse(value)
            .map(|page| {
                PropertyValue::Collection(PagedCollection::from_inline(
                    owner.clone(),
                    key,
                    target.map(str::to_string),
                    page,
                ))
            })
            .ok_or("a page or list of reference stubs"),
    }
}
