//! Error types for the Mosaic data model
//!
//! Catalog construction and descriptor discovery report failures through
//! [`Error`]. Graph-level problems (missing or ambiguous imports, cycles)
//! are not errors here; the resolver aggregates those separately.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or discovering a catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A descriptor is structurally invalid
    #[error("Invalid part {part}: {reason}")]
    InvalidPart {
        /// Display name of the offending part
        part: String,
        /// What is wrong with it
        reason: String,
    },

    /// Two metadata view definitions share a view type but disagree
    #[error("Conflicting metadata view definitions for {0}")]
    ConflictingMetadataView(String),

    /// The descriptor producer failed
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Descriptor documents could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidPart`]
    pub fn invalid_part(part: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPart {
            part: part.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_part() {
        let err = Error::invalid_part("Fruit.Apple", "duplicate import 'seed'");
        let msg = err.to_string();
        assert!(msg.contains("Invalid part"));
        assert!(msg.contains("Fruit.Apple"));
        assert!(msg.contains("duplicate import 'seed'"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parse: std::result::Result<Vec<u8>, _> = serde_json::from_str("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
