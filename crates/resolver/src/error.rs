//! Configuration errors
//!
//! Resolution never stops at the first problem. Each problem becomes a
//! [`CompositionError`]; the full list travels in [`CompositionFailed`] when
//! a caller asks for a runtime composition from an invalid configuration.

use mosaic_runtime::InvalidComposition;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One configuration problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum CompositionError {
    /// A required import has no candidate export
    #[error("{part}: import '{import}' ({contract}) has no matching export{}", rejected_suffix(.rejected_candidates))]
    MissingImport {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// Contract description
        contract: String,
        /// Matching exports whose parts were rejected
        rejected_candidates: Vec<String>,
    },

    /// A single-valued import has several candidates
    #[error("{part}: import '{import}' ({contract}) is ambiguous between {}", .candidates.join(", "))]
    AmbiguousImport {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// Contract description
        contract: String,
        /// Competing exports
        candidates: Vec<String>,
    },

    /// Parts depend on each other through eager imports only
    #[error("unsupported cycle of eager imports: {}", .parts.join(" -> "))]
    UnsupportedCycle {
        /// Parts on the cycle
        parts: Vec<String>,
    },

    /// Sharing boundary requirements cannot be met
    #[error("{part}: inconsistent sharing boundary: {reason}")]
    InconsistentSharingBoundary {
        /// Offending part
        part: String,
        /// What is inconsistent
        reason: String,
    },

    /// Differing descriptors were registered under one identity
    #[error("{part}: conflicting descriptors differ in {}", .differences.join(", "))]
    ConflictingDescriptor {
        /// Contested part
        part: String,
        /// Differing aspects
        differences: Vec<String>,
    },

    /// An import requests a metadata view nobody defined
    #[error("{part}: import '{import}' requests unknown metadata view {view}")]
    UnknownMetadataView {
        /// Importing part
        part: String,
        /// Import slot
        import: String,
        /// Requested view
        view: String,
    },

    /// Generic closure did not terminate within the limit
    #[error("{part}: generic closure limit exceeded")]
    ClosureLimitExceeded {
        /// Part whose import triggered the runaway closure
        part: String,
    },
}

fn rejected_suffix(rejected: &[String]) -> String {
    if rejected.is_empty() {
        String::new()
    } else {
        format!(" (rejected candidates: {})", rejected.join(", "))
    }
}

impl CompositionError {
    /// Parts the error is about
    pub fn parts(&self) -> Vec<&str> {
        match self {
            CompositionError::MissingImport { part, .. }
            | CompositionError::AmbiguousImport { part, .. }
            | CompositionError::InconsistentSharingBoundary { part, .. }
            | CompositionError::ConflictingDescriptor { part, .. }
            | CompositionError::UnknownMetadataView { part, .. }
            | CompositionError::ClosureLimitExceeded { part } => vec![part],
            CompositionError::UnsupportedCycle { parts } => {
                parts.iter().map(String::as_str).collect()
            }
        }
    }
}

/// Every configuration error of a resolution, as one failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionFailed {
    /// The aggregated errors, in discovery order
    pub errors: Vec<CompositionError>,
}

impl fmt::Display for CompositionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "composition failed with {} error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositionFailed {}

/// Failure to produce a runtime composition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The configuration has errors
    #[error(transparent)]
    Configuration(#[from] CompositionFailed),

    /// The surviving graph does not form a valid runtime composition
    #[error("invalid runtime composition: {0}")]
    Invalid(#[from] InvalidComposition),
}
