//! Part activation
//!
//! Descriptors say what a part needs; a [`PartActivator`] says how to build
//! it. The export provider materializes every eager import first, wraps
//! lazy and factory imports in handles, and passes all of them to the
//! activator through an [`ActivationContext`]. The activator returns a
//! [`PartInstance`]: the value, any member values its exports name, and an
//! optional hook to run when the owning scope is disposed.

use crate::error::{Error, Result};
use crate::export::{Export, ExportFactory};
use mosaic_core::TypeRef;
use mosaic_runtime::RuntimePart;
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A type-erased part or member value
pub type Instance = Arc<dyn Any + Send + Sync>;

type Disposer = Box<dyn FnOnce() + Send>;

/// Failure reported by an activator.
///
/// Transparent over the wrapped error: `Display` prints it and `source`
/// continues with its own source, so walking a chain never reports the
/// same message twice. Use [`downcast_ref`](Self::downcast_ref) to reach
/// the wrapped error itself.
#[derive(Debug)]
pub struct ActivationError {
    inner: Box<dyn StdError + Send + Sync>,
}

impl ActivationError {
    /// Wrap any error
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        ActivationError { inner: err.into() }
    }

    /// An error carrying only a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }

    /// The wrapped error, if it is an `E`
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for ActivationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<Error> for ActivationError {
    fn from(err: Error) -> Self {
        Self::new(err)
    }
}

/// What an activator produced
pub struct PartInstance {
    value: Instance,
    members: BTreeMap<String, Instance>,
    disposer: Option<Disposer>,
}

impl PartInstance {
    /// Wrap a freshly built value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap a value that is already reference counted
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        PartInstance {
            value,
            members: BTreeMap::new(),
            disposer: None,
        }
    }

    /// Attach the value of a member export
    pub fn with_member<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
        self.with_member_arc(name, Arc::new(value))
    }

    /// Attach the value of a member export, already reference counted
    pub fn with_member_arc<T: Any + Send + Sync>(
        mut self,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    /// Run `hook` when the scope owning this instance is disposed, or when
    /// the instance is released
    pub fn on_dispose<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.disposer = Some(Box::new(hook));
        self
    }

    pub(crate) fn into_parts(self, id: u64) -> (Activated, Option<Disposer>) {
        (
            Activated {
                id,
                value: self.value,
                members: self.members,
            },
            self.disposer,
        )
    }
}

impl fmt::Debug for PartInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartInstance")
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("has_disposer", &self.disposer.is_some())
            .finish()
    }
}

/// A live part instance as scopes store it
pub(crate) struct Activated {
    pub(crate) id: u64,
    pub(crate) value: Instance,
    pub(crate) members: BTreeMap<String, Instance>,
}

/// Builds instances of one part definition (every closure of a generic
/// part shares the activator; [`ActivationContext::part_type`] tells them
/// apart)
pub trait PartActivator: Send + Sync {
    /// Build an instance
    fn activate(
        &self,
        ctx: &ActivationContext<'_>,
    ) -> std::result::Result<PartInstance, ActivationError>;
}

impl<F> PartActivator for F
where
    F: Fn(&ActivationContext<'_>) -> std::result::Result<PartInstance, ActivationError>
        + Send
        + Sync,
{
    fn activate(
        &self,
        ctx: &ActivationContext<'_>,
    ) -> std::result::Result<PartInstance, ActivationError> {
        self(ctx)
    }
}

/// The value delivered to one import slot
#[derive(Clone)]
pub enum ImportValue {
    /// Eager import: the satisfying values, already materialized
    Values(Vec<Instance>),
    /// Lazy import: deferred handles
    Lazy(Vec<Export>),
    /// Factory import: one factory per satisfying export
    Factories(Vec<ExportFactory>),
}

impl fmt::Debug for ImportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportValue::Values(v) => write!(f, "Values({})", v.len()),
            ImportValue::Lazy(v) => write!(f, "Lazy({})", v.len()),
            ImportValue::Factories(v) => write!(f, "Factories({})", v.len()),
        }
    }
}

/// Everything an activator may read while building a part
pub struct ActivationContext<'a> {
    part: &'a RuntimePart,
    imports: Vec<ImportValue>,
}

impl<'a> ActivationContext<'a> {
    pub(crate) fn new(part: &'a RuntimePart, imports: Vec<ImportValue>) -> Self {
        ActivationContext { part, imports }
    }

    /// The closed type of the part being built
    pub fn part_type(&self) -> &TypeRef {
        &self.part.part_type
    }

    /// Raw value of an import slot
    pub fn import(&self, name: &str) -> Result<&ImportValue> {
        self.part
            .imports
            .iter()
            .position(|i| i.name == name)
            .and_then(|i| self.imports.get(i))
            .ok_or_else(|| Error::UnknownImport {
                part: self.part.part_type.to_string(),
                import: name.to_string(),
            })
    }

    /// The single value of an eager import
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let values = self.values(name)?;
        let value = self.single(name, values)?;
        downcast(value, &self.part.part_type)
    }

    /// The value of an eager import that may be unsatisfied
    pub fn get_optional<T: Any + Send + Sync>(&self, name: &str) -> Result<Option<Arc<T>>> {
        match self.values(name)? {
            [] => Ok(None),
            values => self
                .single(name, values)
                .and_then(|v| downcast(v, &self.part.part_type))
                .map(Some),
        }
    }

    /// Every value of an eager import
    pub fn get_many<T: Any + Send + Sync>(&self, name: &str) -> Result<Vec<Arc<T>>> {
        self.values(name)?
            .iter()
            .map(|v| downcast(v, &self.part.part_type))
            .collect()
    }

    /// The single handle of a lazy import
    pub fn lazy(&self, name: &str) -> Result<Export> {
        let exports = self.lazy_slice(name)?;
        self.single(name, exports).cloned()
    }

    /// Every handle of a lazy import
    pub fn lazy_many(&self, name: &str) -> Result<Vec<Export>> {
        Ok(self.lazy_slice(name)?.to_vec())
    }

    /// The single factory of a factory import
    pub fn factory(&self, name: &str) -> Result<ExportFactory> {
        let factories = self.factory_slice(name)?;
        self.single(name, factories).cloned()
    }

    /// Every factory of a factory import
    pub fn factories(&self, name: &str) -> Result<Vec<ExportFactory>> {
        Ok(self.factory_slice(name)?.to_vec())
    }

    fn values(&self, name: &str) -> Result<&[Instance]> {
        match self.import(name)? {
            ImportValue::Values(values) => Ok(values),
            _ => Err(self.wrong_kind(name, "an eager import")),
        }
    }

    fn lazy_slice(&self, name: &str) -> Result<&[Export]> {
        match self.import(name)? {
            ImportValue::Lazy(exports) => Ok(exports),
            _ => Err(self.wrong_kind(name, "a lazy import")),
        }
    }

    fn factory_slice(&self, name: &str) -> Result<&[ExportFactory]> {
        match self.import(name)? {
            ImportValue::Factories(factories) => Ok(factories),
            _ => Err(self.wrong_kind(name, "a factory import")),
        }
    }

    fn wrong_kind(&self, name: &str, expected: &'static str) -> Error {
        Error::WrongImportKind {
            part: self.part.part_type.to_string(),
            import: name.to_string(),
            expected,
        }
    }

    fn single<'v, X>(&self, name: &str, items: &'v [X]) -> Result<&'v X> {
        match items {
            [one] => Ok(one),
            [] => Err(Error::NoExport {
                contract: format!("{}: import '{}'", self.part.part_type, name),
            }),
            _ => Err(Error::AmbiguousExport {
                contract: format!("{}: import '{}'", self.part.part_type, name),
                candidates: vec![format!("{} values", items.len())],
            }),
        }
    }
}

/// Recover the concrete type of a type-erased value
pub(crate) fn downcast<T: Any + Send + Sync>(value: &Instance, part: &TypeRef) -> Result<Arc<T>> {
    Arc::clone(value)
        .downcast::<T>()
        .map_err(|_| Error::TypeMismatch {
            part: part.to_string(),
            expected: std::any::type_name::<T>(),
        })
}
