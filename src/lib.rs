//! Mosaic - attributed-part composition
//!
//! Parts declare what they export and import; Mosaic resolves the whole
//! graph up front and then builds instances on demand, respecting each
//! part's sharing policy and the scopes opened by export factories.
//!
//! # Quick Start
//!
//! ```ignore
//! use mosaic::{Catalog, Composer, ImportDefinition, MosaicConfig, PartDescriptor, PartInstance,
//!              Resolver, TypeRef, TypeRegistry};
//!
//! let catalog = Catalog::create(vec![
//!     PartDescriptor::new(TypeRef::named("Clock")).exports_self().shared(),
//!     PartDescriptor::new(TypeRef::named("Greeter"))
//!         .exports_self()
//!         .import(ImportDefinition::exactly_one("clock", TypeRef::named("Clock"))),
//! ])?;
//!
//! let resolver = Resolver::new(TypeRegistry::new())
//!     .with_activator("Clock", |_| Ok(PartInstance::new(Clock::system())))
//!     .with_activator("Greeter", |ctx| Ok(PartInstance::new(Greeter::new(ctx.get("clock")?))));
//!
//! let factory = Composer::new(catalog, resolver, MosaicConfig::default()).compose()?;
//! let container = factory.create_export_provider();
//! let greeter = container.get_exported_value::<Greeter>(&TypeRef::named("Greeter"), None)?;
//! ```
//!
//! # Architecture
//!
//! - `mosaic-core`: types, descriptors, catalogs
//! - `mosaic-resolver`: graph resolution into a [`CompositionConfiguration`]
//! - `mosaic-runtime`: the flattened [`RuntimeComposition`] and its cache codec
//! - `mosaic-engine`: containers, scopes and activation
//!
//! This crate re-exports the public surface of all four and adds
//! [`MosaicConfig`] and [`Composer`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod composer;
pub mod config;
pub mod error;

pub use composer::Composer;
pub use config::{ErrorPolicy, MosaicConfig, CONFIG_FILE_NAME};
pub use error::{Error, Result};

pub use mosaic_core::{
    Bindings, Cardinality, Catalog, CatalogDiscrepancy, CreationPolicy, ExportDefinition,
    GenericParam, ImportDefinition, ImportKind, JsonDiscovery, Metadata, MetadataValue,
    MetadataView, MetadataViewDefinition, PartDescriptor, PartDiscovery, StaticDiscovery,
    TypeDefinition, TypeFilter, TypeRef, TypeRegistry,
};
pub use mosaic_engine::{
    ActivationContext, ActivationError, Export, ExportFactory, ExportHandle, ExportProvider,
    ExportProviderFactory, ImportValue, Instance, PartActivator, PartInstance, Resolver,
};
pub use mosaic_resolver::{
    ComposedPart, CompositionConfiguration, CompositionError, CompositionFailed, ResolveError,
    ResolverOptions,
};
pub use mosaic_runtime::{RuntimeComposition, RuntimeImport, RuntimePart};
