//! Scope tree
//!
//! Every export provider owns a root scope; every factory invocation opens
//! a child scope introducing the factory's sharing boundaries. A scope
//! owns:
//! - one slot per shared part whose boundary it introduces (the root owns
//!   the root-shared parts), filled at most once
//! - the disposal list of every instance created in it that carries a
//!   disposal hook, in creation order
//! - weak links to its child scopes
//!
//! # Locking
//!
//! Slots are `OnceCell`s in a `DashMap`: concurrent first requests for one
//! (part, scope) pair serialize on that cell alone, and a failed creation
//! leaves the cell empty for the next caller. Creation holds the scope's
//! gate for reading (recursively, since activations nest); disposal takes
//! it for writing, so it waits for in-flight creations and no new creation
//! starts afterwards.

use crate::activation::{Activated, ActivationContext, ImportValue, PartActivator};
use crate::error::{Error, Result};
use crate::export::{Export, ExportFactory, Resolved};
use dashmap::DashMap;
use mosaic_core::{CreationPolicy, ExportDefinition, ImportKind};
use mosaic_runtime::{ExportRef, RuntimeComposition, RuntimeImport, RuntimePart};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// (scope id, part) pairs being activated on this thread
    static ACTIVATING: RefCell<Vec<(u64, usize)>> = RefCell::new(Vec::new());
}

/// Marks a (scope, part) activation as in progress on this thread
struct ActivationGuard {
    scope: u64,
    part: usize,
}

impl ActivationGuard {
    fn enter(scope: u64, part: usize, runtime: &RuntimePart) -> Result<Self> {
        ACTIVATING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&(scope, part)) {
                return Err(Error::RecursiveActivation {
                    part: runtime.part_type.to_string(),
                });
            }
            stack.push((scope, part));
            Ok(ActivationGuard { scope, part })
        })
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        ACTIVATING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|e| *e == (self.scope, self.part)) {
                stack.remove(pos);
            }
        });
    }
}

/// State shared by every scope of one export provider
pub(crate) struct Container {
    composition: Arc<RuntimeComposition>,
    activators: Arc<[Option<Arc<dyn PartActivator>>]>,
}

impl Container {
    pub(crate) fn new(
        composition: Arc<RuntimeComposition>,
        activators: Arc<[Option<Arc<dyn PartActivator>>]>,
    ) -> Self {
        Container {
            composition,
            activators,
        }
    }

    fn part(&self, index: usize) -> Result<&RuntimePart> {
        self.composition.part(index).ok_or_else(|| Error::NoExport {
            contract: format!("part #{}", index),
        })
    }

    fn activator(&self, index: usize, part: &RuntimePart) -> Result<&Arc<dyn PartActivator>> {
        self.activators
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::MissingActivator {
                key: part.activator_key.clone(),
            })
    }

    pub(crate) fn export(&self, target: ExportRef) -> Result<&ExportDefinition> {
        self.composition.export(target).ok_or_else(|| Error::NoExport {
            contract: format!("export #{} of part #{}", target.export, target.part),
        })
    }
}

/// An instance with a disposal hook; instances without one are not tracked
struct Created {
    instance: u64,
    disposer: Box<dyn FnOnce() + Send>,
}

/// A live sharing-boundary instance
pub(crate) struct Scope {
    id: u64,
    container: Arc<Container>,
    parent: Option<Arc<Scope>>,
    boundaries: Vec<String>,
    slots: DashMap<usize, Arc<OnceCell<Arc<Activated>>>>,
    created: Mutex<Vec<Created>>,
    children: Mutex<Vec<Weak<Scope>>>,
    gate: RwLock<()>,
    disposed: AtomicBool,
}

impl Scope {
    fn new(container: Arc<Container>, parent: Option<Arc<Scope>>, boundaries: Vec<String>) -> Self {
        Scope {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            container,
            parent,
            boundaries,
            slots: DashMap::new(),
            created: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            gate: RwLock::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn root(container: Arc<Container>) -> Arc<Self> {
        let scope = Arc::new(Scope::new(container, None, Vec::new()));
        debug!(target: "mosaic::engine", scope = scope.id, "Created root scope");
        scope
    }

    /// Open a child scope introducing `boundaries`
    pub(crate) fn child(self: &Arc<Self>, boundaries: Vec<String>) -> Result<Arc<Scope>> {
        let _gate = self.gate.read_recursive();
        if self.is_disposed() {
            return Err(Error::ScopeDisposed);
        }
        let child = Arc::new(Scope::new(
            Arc::clone(&self.container),
            Some(Arc::clone(self)),
            boundaries,
        ));
        let mut children = self.children.lock();
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        debug!(
            target: "mosaic::engine",
            scope = child.id,
            parent = self.id,
            boundaries = ?child.boundaries,
            "Created child scope"
        );
        Ok(child)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn composition(&self) -> &RuntimeComposition {
        &self.container.composition
    }

    pub(crate) fn container(&self) -> &Container {
        &self.container
    }

    /// Nearest scope (self included) introducing `boundary`; the root for `None`
    fn owner_of(self: &Arc<Self>, boundary: Option<&str>) -> Option<Arc<Scope>> {
        let mut current = Arc::clone(self);
        loop {
            let found = match boundary {
                Some(b) => current.boundaries.iter().any(|own| own == b),
                None => current.parent.is_none(),
            };
            if found {
                return Some(current);
            }
            current = Arc::clone(current.parent.as_ref()?);
        }
    }

    fn has_boundary(self: &Arc<Self>, boundary: &str) -> bool {
        self.owner_of(Some(boundary)).is_some()
    }

    /// Instance of `part` as seen from this scope, with the scope owning it
    pub(crate) fn instance(self: &Arc<Self>, part: usize) -> Result<(Arc<Activated>, Arc<Scope>)> {
        let container = Arc::clone(&self.container);
        let runtime = container.part(part)?;
        let owner = match &runtime.creation_policy {
            CreationPolicy::Shared { boundary } => self
                .owner_of(boundary.as_deref())
                .ok_or_else(|| Error::BoundaryUnavailable {
                    part: runtime.part_type.to_string(),
                    boundary: boundary.clone().unwrap_or_default(),
                })?,
            CreationPolicy::NonShared => Arc::clone(self),
        };
        if let Some(missing) = runtime
            .required_boundaries
            .iter()
            .find(|b| !owner.has_boundary(b))
        {
            return Err(Error::BoundaryUnavailable {
                part: runtime.part_type.to_string(),
                boundary: missing.clone(),
            });
        }
        let activated = owner.instance_here(part, runtime)?;
        Ok((activated, owner))
    }

    fn instance_here(
        self: &Arc<Self>,
        part: usize,
        runtime: &RuntimePart,
    ) -> Result<Arc<Activated>> {
        let _gate = self.gate.read_recursive();
        if self.is_disposed() {
            return Err(Error::ScopeDisposed);
        }
        if runtime.is_shared() {
            let cell = Arc::clone(self.slots.entry(part).or_default().value());
            if let Some(existing) = cell.get() {
                return Ok(Arc::clone(existing));
            }
            let _guard = ActivationGuard::enter(self.id, part, runtime)?;
            cell.get_or_try_init(|| self.create(part, runtime))
                .map(Arc::clone)
        } else {
            let _guard = ActivationGuard::enter(self.id, part, runtime)?;
            self.create(part, runtime)
        }
    }

    fn create(self: &Arc<Self>, part: usize, runtime: &RuntimePart) -> Result<Arc<Activated>> {
        let activator = self.container.activator(part, runtime)?;
        let imports = runtime
            .imports
            .iter()
            .map(|import| self.import_value(import))
            .collect::<Result<Vec<_>>>()?;

        let ctx = ActivationContext::new(runtime, imports);
        let instance = activator
            .activate(&ctx)
            .map_err(|source| Error::Activation {
                part: runtime.part_type.to_string(),
                source,
            })?;

        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        let (activated, disposer) = instance.into_parts(id);
        if let Some(disposer) = disposer {
            self.created.lock().push(Created {
                instance: id,
                disposer,
            });
        }
        debug!(
            target: "mosaic::engine",
            scope = self.id,
            part = %runtime.part_type,
            instance = id,
            "Activated part"
        );
        Ok(Arc::new(activated))
    }

    fn import_value(self: &Arc<Self>, import: &RuntimeImport) -> Result<ImportValue> {
        let view = import
            .metadata_view
            .as_ref()
            .and_then(|v| self.composition().metadata_view(v));
        let value = match &import.kind {
            ImportKind::Eager => ImportValue::Values(
                import
                    .satisfying
                    .iter()
                    .map(|&target| self.resolve(target).map(|r| r.value))
                    .collect::<Result<_>>()?,
            ),
            ImportKind::Lazy => ImportValue::Lazy(
                import
                    .satisfying
                    .iter()
                    .map(|&target| Export::new(self, target, view))
                    .collect::<Result<_>>()?,
            ),
            ImportKind::Factory { sharing_boundaries } => ImportValue::Factories(
                import
                    .satisfying
                    .iter()
                    .map(|&target| ExportFactory::new(self, target, sharing_boundaries, view))
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(value)
    }

    /// Value of one export as seen from this scope
    pub(crate) fn resolve(self: &Arc<Self>, target: ExportRef) -> Result<Resolved> {
        let container = Arc::clone(&self.container);
        let runtime = container.part(target.part)?;
        let definition = container.export(target)?;
        let (activated, owner) = self.instance(target.part)?;
        let value = match &definition.member {
            None => Arc::clone(&activated.value),
            Some(member) => activated.members.get(member).cloned().ok_or_else(|| {
                Error::MissingMember {
                    part: runtime.part_type.to_string(),
                    member: member.clone(),
                }
            })?,
        };
        Ok(Resolved {
            value,
            release: (!runtime.is_shared()).then(|| (Arc::downgrade(&owner), activated.id)),
        })
    }

    /// Dispose one non-shared instance ahead of its scope
    pub(crate) fn release(&self, instance: u64) {
        let entry = {
            let mut created = self.created.lock();
            created
                .iter()
                .position(|c| c.instance == instance)
                .map(|i| created.remove(i))
        };
        if let Some(entry) = entry {
            (entry.disposer)();
            debug!(target: "mosaic::engine", scope = self.id, instance, "Released instance");
        }
    }

    /// Dispose nested scopes, then every instance created here, newest first
    pub(crate) fn dispose(&self) {
        {
            let _gate = self.gate.write();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
        }

        let children: Vec<Arc<Scope>> = self
            .children
            .lock()
            .drain(..)
            .filter_map(|c| c.upgrade())
            .collect();
        for child in children.iter().rev() {
            child.dispose();
        }

        let created = std::mem::take(&mut *self.created.lock());
        let count = created.len();
        for entry in created.into_iter().rev() {
            (entry.disposer)();
        }
        self.slots.clear();
        debug!(
            target: "mosaic::engine",
            scope = self.id,
            instances = count,
            "Disposed scope"
        );
    }
}
