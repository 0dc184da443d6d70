//! Export provider for Mosaic
//!
//! This crate runs a resolved [`RuntimeComposition`](mosaic_runtime::RuntimeComposition):
//! - Resolver: type registry plus the activators that build parts
//! - ExportProviderFactory / ExportProvider: isolated containers
//! - Scopes: one per sharing-boundary instance, disposed in reverse
//!   creation order
//! - Export / ExportFactory / ExportHandle: deferred and scoped access
//! - Cache: save and load compositions
//!
//! Shared parts are created at most once per scope instance of their
//! boundary, even under concurrent first access; non-shared parts are
//! created for every request.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activation;
pub mod cache;
pub mod error;
pub mod export;
pub mod provider;
pub mod resolver;
mod scope;

pub use activation::{
    ActivationContext, ActivationError, ImportValue, Instance, PartActivator, PartInstance,
};
pub use cache::{load, save};
pub use error::{Error, Result};
pub use export::{Export, ExportFactory, ExportHandle};
pub use provider::{ExportProvider, ExportProviderFactory};
pub use resolver::Resolver;
