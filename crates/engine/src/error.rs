//! Export provider errors
//!
//! Configuration problems never reach this layer: the resolver rejects them
//! before a runtime composition exists. What remains are failures of live
//! activation (an activator returning an error), requests the composition
//! cannot answer, and use of a scope after it was disposed.

use crate::activation::ActivationError;
use mosaic_runtime::{CacheError, InvalidComposition};
use thiserror::Error;

/// Result type for export provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Export provider error
#[derive(Debug, Error)]
pub enum Error {
    /// No export satisfies the request
    #[error("no export matches {contract}")]
    NoExport {
        /// What was requested
        contract: String,
    },

    /// A single-valued request matched several exports
    #[error("{contract} is ambiguous between {}", .candidates.join(", "))]
    AmbiguousExport {
        /// What was requested
        contract: String,
        /// Parts exporting a match
        candidates: Vec<String>,
    },

    /// The activator of a part failed
    #[error("activation of {part} failed: {source}")]
    Activation {
        /// Part being activated
        part: String,
        /// Activator error
        #[source]
        source: ActivationError,
    },

    /// The scope backing the request has been disposed
    #[error("scope has been disposed")]
    ScopeDisposed,

    /// The part needs a boundary no enclosing scope introduces
    #[error("{part} requires sharing boundary '{boundary}', which is not open in this scope")]
    BoundaryUnavailable {
        /// Requested part
        part: String,
        /// Missing boundary
        boundary: String,
    },

    /// A part's activation re-entered itself on the same thread
    #[error("recursive activation of {part}")]
    RecursiveActivation {
        /// Re-entered part
        part: String,
    },

    /// The value is not of the requested Rust type
    #[error("export of {part} is not a {expected}")]
    TypeMismatch {
        /// Exporting part
        part: String,
        /// Requested Rust type
        expected: &'static str,
    },

    /// An import was read with the wrong accessor (e.g. `get` on a lazy import)
    #[error("{part}: import '{import}' is not {expected}")]
    WrongImportKind {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// What the accessor expected
        expected: &'static str,
    },

    /// The part declares no import of that name
    #[error("{part} has no import named '{import}'")]
    UnknownImport {
        /// Importing part
        part: String,
        /// Requested slot
        import: String,
    },

    /// An export names a member the activator did not attach
    #[error("{part} did not provide member '{member}'")]
    MissingMember {
        /// Exporting part
        part: String,
        /// Missing member
        member: String,
    },

    /// The handle's instance was released ahead of its scope
    #[error("export of {part} was released")]
    ExportReleased {
        /// Exporting part
        part: String,
    },

    /// No activator is registered for a part
    #[error("no activator registered for '{key}'")]
    MissingActivator {
        /// Activator key of the part
        key: String,
    },

    /// The composition is structurally invalid
    #[error("invalid runtime composition: {0}")]
    Invalid(#[from] InvalidComposition),

    /// Cache bytes could not be turned into a composition
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl Error {
    /// The innermost engine error behind a chain of failed activations.
    ///
    /// Activations nest: a part whose eager import fails reports an
    /// [`Error::Activation`] wrapping the import's own failure. This walks
    /// down to the first error that is not a wrapper.
    pub fn innermost(&self) -> &Error {
        let mut current = self;
        while let Error::Activation { source, .. } = current {
            match source.downcast_ref::<Error>() {
                Some(inner) => current = inner,
                None => break,
            }
        }
        current
    }
}
