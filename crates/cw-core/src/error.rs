//! Error and warning types for catalog traversal.
//!
//! Hard failures ([`CatalogError`]) propagate to the caller. Decode-time
//! anomalies are recovered locally and surface as [`Warning`]s attached to
//! the object or cursor that encountered them.

use cw_connectors::ConnectorError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors returned by the catalog runtime.
///
/// `Clone` so a single failed fetch can be delivered to every caller that
/// was waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The asset does not exist in the catalog.
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// The property was outside the set requested by a partial load.
    #[error("Property '{property}' was not loaded for asset {id}")]
    NotLoaded { id: String, property: String },

    /// The property is not a relationship of the asset's type.
    #[error("Type '{type_id}' declares no relationship named '{property}'")]
    UnknownRelationship { type_id: String, property: String },

    /// Network or transport failure. Retryable by the caller.
    #[error("Transport error: {0}")]
    Transport(ConnectorError),

    /// The catalog's view of a collection changed while it was being paged.
    #[error("Pagination inconsistency in {collection} at offset {offset}: {detail}")]
    PaginationInconsistency {
        collection: String,
        offset: u64,
        detail: String,
    },

    /// A response lacked the identity fields every envelope must carry.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Transport(_) | CatalogError::Internal(_))
    }
}

impl From<ConnectorError> for CatalogError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::NotFound(what) => CatalogError::NotFound(what),
            other => CatalogError::Transport(other),
        }
    }
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Non-fatal anomalies recorded during decoding or paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The type could not be resolved; the object was decoded opaquely.
    UnknownType { type_id: String, reason: String },
    /// An id appeared more than once within a single iteration pass.
    DuplicateInCollection {
        collection: String,
        id: String,
        offset: u64,
    },
    /// A value did not have the shape its declaration calls for.
    UnexpectedShape { property: String, expected: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownType { type_id, reason } => {
                write!(f, "unknown type '{}': {}", type_id, reason)
            }
            Warning::DuplicateInCollection {
                collection,
                id,
                offset,
            } => write!(
                f,
                "duplicate id '{}' in {} at offset {}",
                id, collection, offset
            ),
            Warning::UnexpectedShape { property, expected } => {
                write!(f, "property '{}' is not {}", property, expected)
            }
        }
    }
}
