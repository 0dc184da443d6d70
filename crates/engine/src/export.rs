//! Deferred exports and export factories

use crate::activation::{downcast, Instance};
use crate::error::{Error, Result};
use crate::scope::Scope;
use mosaic_core::{ExportDefinition, Metadata, MetadataView, MetadataViewDefinition, TypeRef};
use mosaic_runtime::ExportRef;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A resolved export value. `release` locates a non-shared instance so it
/// can be disposed ahead of its scope.
pub(crate) struct Resolved {
    pub(crate) value: Instance,
    pub(crate) release: Option<(Weak<Scope>, u64)>,
}

struct ExportInner {
    scope: Weak<Scope>,
    target: ExportRef,
    part_type: TypeRef,
    definition: ExportDefinition,
    view: Option<MetadataView>,
    resolved: OnceCell<Resolved>,
    released: AtomicBool,
}

/// Deferred handle to one export.
///
/// Nothing is activated until the first call to [`value`](Self::value);
/// the result is memoized for this handle and its clones. A failed
/// evaluation is not memoized. Once the instance behind the handle is
/// released, the handle is dead: [`value`](Self::value) fails with
/// [`Error::ExportReleased`].
#[derive(Clone)]
pub struct Export {
    inner: Arc<ExportInner>,
}

impl Export {
    pub(crate) fn new(
        scope: &Arc<Scope>,
        target: ExportRef,
        view: Option<&MetadataViewDefinition>,
    ) -> Result<Self> {
        let (part_type, definition) = describe(scope, target)?;
        let view = view.and_then(|v| v.project(&definition.metadata));
        Ok(Export {
            inner: Arc::new(ExportInner {
                scope: Arc::downgrade(scope),
                target,
                part_type,
                definition,
                view,
                resolved: OnceCell::new(),
                released: AtomicBool::new(false),
            }),
        })
    }

    /// Type of the exporting part
    pub fn part_type(&self) -> &TypeRef {
        &self.inner.part_type
    }

    /// Declared contract type
    pub fn contract_type(&self) -> &TypeRef {
        &self.inner.definition.contract_type
    }

    /// Contract name; `None` is the default contract
    pub fn contract_name(&self) -> Option<&str> {
        self.inner.definition.contract_name.as_deref()
    }

    /// Export metadata, available without activating anything
    pub fn metadata(&self) -> &Metadata {
        &self.inner.definition.metadata
    }

    /// Metadata projected through the view the import requested
    pub fn metadata_view(&self) -> Option<&MetadataView> {
        self.inner.view.as_ref()
    }

    /// Project the metadata through any view definition
    pub fn project(&self, view: &MetadataViewDefinition) -> Option<MetadataView> {
        view.project(&self.inner.definition.metadata)
    }

    /// Whether the value has been evaluated
    pub fn is_value_created(&self) -> bool {
        self.inner.resolved.get().is_some()
    }

    /// The type-erased value, activating it on first access
    pub fn value_any(&self) -> Result<Instance> {
        if self.is_released() {
            return Err(Error::ExportReleased {
                part: self.inner.part_type.to_string(),
            });
        }
        let resolved = self.inner.resolved.get_or_try_init(|| {
            let scope = self.inner.scope.upgrade().ok_or(Error::ScopeDisposed)?;
            scope.resolve(self.inner.target)
        })?;
        Ok(Arc::clone(&resolved.value))
    }

    /// The value as `T`, activating it on first access
    pub fn value<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let value = self.value_any()?;
        downcast(&value, &self.inner.part_type)
    }

    /// Whether the instance behind this handle was released
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Mark the handle dead and hand out its release target, once
    pub(crate) fn take_release_target(&self) -> Option<&(Weak<Scope>, u64)> {
        let target = self.inner.resolved.get()?.release.as_ref()?;
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(target)
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Export")
            .field("part", &self.inner.part_type.to_string())
            .field("contract", &self.inner.definition.contract_type.to_string())
            .field("created", &self.is_value_created())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Creates scoped instances of one export.
///
/// Each [`create_export`](Self::create_export) opens a fresh child scope
/// introducing the factory's sharing boundaries; everything activated for
/// that export inside those boundaries lives in the new scope and is
/// disposed with its [`ExportHandle`].
#[derive(Clone)]
pub struct ExportFactory {
    parent: Weak<Scope>,
    target: ExportRef,
    boundaries: Arc<[String]>,
    part_type: TypeRef,
    definition: Arc<ExportDefinition>,
    view: Option<MetadataView>,
}

impl ExportFactory {
    pub(crate) fn new(
        parent: &Arc<Scope>,
        target: ExportRef,
        boundaries: &[String],
        view: Option<&MetadataViewDefinition>,
    ) -> Result<Self> {
        let (part_type, definition) = describe(parent, target)?;
        let view = view.and_then(|v| v.project(&definition.metadata));
        Ok(ExportFactory {
            parent: Arc::downgrade(parent),
            target,
            boundaries: boundaries.into(),
            part_type,
            definition: Arc::new(definition),
            view,
        })
    }

    /// Type of the exporting part
    pub fn part_type(&self) -> &TypeRef {
        &self.part_type
    }

    /// Boundaries every created scope introduces
    pub fn sharing_boundaries(&self) -> &[String] {
        &self.boundaries
    }

    /// Export metadata
    pub fn metadata(&self) -> &Metadata {
        &self.definition.metadata
    }

    /// Metadata projected through the view the import requested
    pub fn metadata_view(&self) -> Option<&MetadataView> {
        self.view.as_ref()
    }

    /// Open a new scope and activate the export inside it
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ScopeDisposed`] if the scope that received this
    /// factory is gone, or with the activation error; the new scope is
    /// disposed in both cases.
    pub fn create_export(&self) -> Result<ExportHandle> {
        let parent = self.parent.upgrade().ok_or(Error::ScopeDisposed)?;
        let scope = parent.child(self.boundaries.to_vec())?;
        match scope.resolve(self.target) {
            Ok(resolved) => Ok(ExportHandle {
                scope,
                value: resolved.value,
                part_type: self.part_type.clone(),
            }),
            Err(err) => {
                scope.dispose();
                Err(err)
            }
        }
    }
}

impl fmt::Debug for ExportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportFactory")
            .field("part", &self.part_type.to_string())
            .field("boundaries", &self.boundaries)
            .finish()
    }
}

/// A value created by an [`ExportFactory`], owning its scope.
///
/// Disposing the handle (explicitly or by dropping it) disposes the scope:
/// nested scopes first, then every instance created in it, newest first.
/// Instances living in enclosing scopes are untouched.
pub struct ExportHandle {
    scope: Arc<Scope>,
    value: Instance,
    part_type: TypeRef,
}

impl ExportHandle {
    /// The type-erased value
    pub fn value_any(&self) -> &Instance {
        &self.value
    }

    /// The value as `T`
    pub fn value<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        downcast(&self.value, &self.part_type)
    }

    /// Identifier of the scope the handle owns
    pub fn scope_id(&self) -> u64 {
        self.scope.id()
    }

    /// Dispose the scope now
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for ExportHandle {
    fn drop(&mut self) {
        self.scope.dispose();
    }
}

impl fmt::Debug for ExportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportHandle")
            .field("part", &self.part_type.to_string())
            .field("scope", &self.scope.id())
            .finish()
    }
}

fn describe(scope: &Scope, target: ExportRef) -> Result<(TypeRef, ExportDefinition)> {
    let part_type = scope
        .composition()
        .part(target.part)
        .map(|p| p.part_type.clone())
        .ok_or_else(|| Error::NoExport {
            contract: format!("part #{}", target.part),
        })?;
    let definition = scope.container().export(target)?.clone();
    Ok((part_type, definition))
}
