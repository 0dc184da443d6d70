//! Runtime composition contract violations
//!
//! These are programming errors in whoever assembled the composition, not
//! configuration errors in the catalog: the resolver never produces a
//! composition that trips them.

use thiserror::Error;

/// Result type alias for runtime composition construction
pub type Result<T> = std::result::Result<T, InvalidComposition>;

/// A runtime composition failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidComposition {
    /// The part list is empty
    #[error("runtime composition has no parts")]
    NoParts,

    /// An import asks for a metadata view but no view providers were supplied
    #[error("import '{import}' of {part} requests metadata view {view} but no metadata view providers were supplied")]
    MissingMetadataViewProviders {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// Requested view
        view: String,
    },

    /// An import asks for a metadata view that has no provider
    #[error("import '{import}' of {part} requests unknown metadata view {view}")]
    UnknownMetadataView {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// Requested view
        view: String,
    },

    /// An import points at a part or export that does not exist
    #[error("import '{import}' of {part} references missing export {target_part}:{target_export}")]
    DanglingReference {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// Referenced part index
        target_part: usize,
        /// Referenced export index
        target_export: usize,
    },

    /// An import's satisfying exports violate its cardinality
    #[error("import '{import}' of {part} is bound to {count} exports, violating {cardinality}")]
    CardinalityViolation {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// Number of bound exports
        count: usize,
        /// Declared cardinality
        cardinality: String,
    },
}
