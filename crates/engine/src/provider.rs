//! Export providers
//!
//! An [`ExportProviderFactory`] pairs an immutable runtime composition with
//! the activators of its parts; it can be shared freely and creates any
//! number of [`ExportProvider`]s. Each provider is an isolated container
//! with its own root scope: two providers never share an instance, even
//! when built from the same factory.

use crate::activation::PartActivator;
use crate::error::{Error, Result};
use crate::export::Export;
use crate::resolver::Resolver;
use crate::scope::{Container, Scope};
use mosaic_core::{TypeRef, TypeRegistry};
use mosaic_runtime::RuntimeComposition;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Creates isolated export providers from one composition
#[derive(Clone)]
pub struct ExportProviderFactory {
    composition: Arc<RuntimeComposition>,
    types: Arc<TypeRegistry>,
    activators: Arc<[Option<Arc<dyn PartActivator>>]>,
}

impl ExportProviderFactory {
    /// Bind `composition` to the activators of `resolver`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingActivator`] for the first part without an
    /// activator.
    pub fn new(composition: RuntimeComposition, resolver: &Resolver) -> Result<Self> {
        let factory = Self::with_deferred_activators(composition, resolver);
        if let Some(index) = factory.activators.iter().position(Option::is_none) {
            return Err(Error::MissingActivator {
                key: factory.composition.parts()[index].activator_key.clone(),
            });
        }
        Ok(factory)
    }

    /// Like [`new`](Self::new), but a part without an activator only fails
    /// when something asks for it
    pub fn with_deferred_activators(composition: RuntimeComposition, resolver: &Resolver) -> Self {
        let activators: Vec<Option<Arc<dyn PartActivator>>> = composition
            .parts()
            .iter()
            .map(|part| resolver.activator(&part.activator_key).cloned())
            .collect();
        info!(
            target: "mosaic::engine",
            parts = composition.parts().len(),
            missing_activators = activators.iter().filter(|a| a.is_none()).count(),
            "Prepared export provider factory"
        );
        ExportProviderFactory {
            composition: Arc::new(composition),
            types: Arc::clone(resolver.types()),
            activators: activators.into(),
        }
    }

    /// The composition providers are created from
    pub fn composition(&self) -> &RuntimeComposition {
        &self.composition
    }

    /// A new, empty container
    pub fn create_export_provider(&self) -> ExportProvider {
        let container = Container::new(Arc::clone(&self.composition), Arc::clone(&self.activators));
        ExportProvider {
            root: Scope::root(Arc::new(container)),
            types: Arc::clone(&self.types),
        }
    }
}

impl fmt::Debug for ExportProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportProviderFactory")
            .field("parts", &self.composition.parts().len())
            .finish()
    }
}

/// A live container
///
/// Disposing the provider (explicitly or by dropping it) disposes every
/// scope it created.
pub struct ExportProvider {
    root: Arc<Scope>,
    types: Arc<TypeRegistry>,
}

impl ExportProvider {
    /// Every export assignable to `ty` under `contract_name`, as deferred
    /// handles in composition order
    pub fn get_exports(&self, ty: &TypeRef, contract_name: Option<&str>) -> Result<Vec<Export>> {
        if self.root.is_disposed() {
            return Err(Error::ScopeDisposed);
        }
        self.root
            .composition()
            .exports()
            .filter(|(_, export)| {
                export.contract_name.as_deref() == contract_name
                    && self.types.is_assignable(&export.contract_type, ty)
            })
            .map(|(target, _)| Export::new(&self.root, target, None))
            .collect()
    }

    /// The single export assignable to `ty` under `contract_name`
    ///
    /// # Errors
    ///
    /// [`Error::NoExport`] if nothing matches, [`Error::AmbiguousExport`] if
    /// several exports do.
    pub fn get_export(&self, ty: &TypeRef, contract_name: Option<&str>) -> Result<Export> {
        let mut exports = self.get_exports(ty, contract_name)?;
        match exports.len() {
            1 => Ok(exports.remove(0)),
            0 => Err(Error::NoExport {
                contract: describe(ty, contract_name),
            }),
            _ => Err(Error::AmbiguousExport {
                contract: describe(ty, contract_name),
                candidates: exports.iter().map(|e| e.part_type().to_string()).collect(),
            }),
        }
    }

    /// The value of the single export assignable to `ty`
    pub fn get_exported_value<T: Any + Send + Sync>(
        &self,
        ty: &TypeRef,
        contract_name: Option<&str>,
    ) -> Result<Arc<T>> {
        self.get_export(ty, contract_name)?.value::<T>()
    }

    /// The values of every export assignable to `ty`
    pub fn get_exported_values<T: Any + Send + Sync>(
        &self,
        ty: &TypeRef,
        contract_name: Option<&str>,
    ) -> Result<Vec<Arc<T>>> {
        self.get_exports(ty, contract_name)?
            .iter()
            .map(Export::value::<T>)
            .collect()
    }

    /// Dispose the non-shared instance obtained through `export`, running
    /// its disposal hook now instead of when the container is disposed.
    /// Shared instances and unevaluated handles are left alone. A released
    /// handle (and its clones) no longer yields a value.
    pub fn release_export(&self, export: &Export) {
        if let Some((scope, instance)) = export.take_release_target() {
            if let Some(scope) = scope.upgrade() {
                scope.release(*instance);
            }
        }
    }

    /// [`release_export`](Self::release_export) for each handle
    pub fn release_exports(&self, exports: &[Export]) {
        for export in exports {
            self.release_export(export);
        }
    }

    /// Dispose every scope and instance of this container
    pub fn dispose(&self) {
        if !self.root.is_disposed() {
            debug!(target: "mosaic::engine", scope = self.root.id(), "Disposing export provider");
        }
        self.root.dispose();
    }

    /// Whether the container was disposed
    pub fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }
}

impl Drop for ExportProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ExportProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportProvider")
            .field("scope", &self.root.id())
            .field("disposed", &self.root.is_disposed())
            .finish()
    }
}

fn describe(ty: &TypeRef, contract_name: Option<&str>) -> String {
    match contract_name {
        Some(name) => format!("\"{}\" {}", name, ty),
        None => ty.to_string(),
    }
}
