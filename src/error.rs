//! Errors of the composition facade

use mosaic_resolver::ResolveError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for [`Composer`](crate::Composer) and [`MosaicConfig`](crate::MosaicConfig)
pub type Result<T> = std::result::Result<T, Error>;

/// Facade error
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file is unreadable or holds invalid values
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading or writing a file failed
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Building the catalog failed
    #[error(transparent)]
    Catalog(#[from] mosaic_core::Error),

    /// Resolution produced no usable composition
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Binding or running the composition failed
    #[error(transparent)]
    Engine(#[from] mosaic_engine::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
