//! Core data model for Mosaic
//!
//! This crate defines the types every other layer speaks:
//! - TypeRef / TypeRegistry: structural type references, the type hierarchy,
//!   and generic parameter binding
//! - Metadata: export metadata values and typed metadata views
//! - Descriptors: parts, exports, imports, creation policies
//! - Catalog: an immutable, validated set of part descriptors
//! - Discovery: the producer interface descriptors come from
//! - Error: catalog and discovery errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod registry;
pub mod types;

pub use catalog::{Catalog, CatalogDiscrepancy};
pub use descriptor::{
    Cardinality, CreationPolicy, ExportDefinition, ImportDefinition, ImportKind, PartDescriptor,
    TypeFilter,
};
pub use discovery::{JsonDiscovery, PartDiscovery, StaticDiscovery};
pub use error::{Error, Result};
pub use metadata::{Metadata, MetadataValue, MetadataView, MetadataViewDefinition};
pub use registry::{GenericParam, TypeDefinition, TypeRegistry};
pub use types::{Bindings, TypeRef};
