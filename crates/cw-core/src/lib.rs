//! Schema-agnostic runtime for traversing a remote metadata catalog.
//!
//! Assets are decoded at runtime from their type identifier instead of from
//! per-type generated structs:
//!
//! - [`TypeRegistry`] maps a type id to an [`AssetTypeDescriptor`].
//! - [`decoder`] turns an object envelope into a [`DetailObject`].
//! - [`DetailResolver`] turns a [`Reference`] into a [`DetailObject`],
//!   sharing concurrent fetches through the [`IdentityCache`].
//! - [`CollectionCursor`] pages through a [`PagedCollection`].
//! - [`CatalogClient`] ties them together.

pub mod cache;
pub mod client;
pub mod collection;
pub mod config;
pub mod decoder;
pub mod error;
pub mod metrics;
pub mod object;
pub mod reference;
pub mod registry;
pub mod resolver;

pub use cache::{CacheOptions, CacheStats, IdentityCache};
pub use client::{CatalogClient, CatalogClientBuilder};
pub use collection::{
    CollectionCursor, CollectionItem, CollectionOptions, Page, PagedCollection, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use config::ClientConfig;
pub use decoder::{decode, decode_with};
pub use error::{CatalogError, CatalogResult, Warning};
pub use object::{DetailObject, LoadScope, PropertyLookup, PropertyValue};
pub use reference::Reference;
pub use registry::{AssetTypeDescriptor, PropertyKind, ScalarKind, TypeRegistry, TypeResolution};
pub use resolver::DetailResolver;
