//! Runtime composition for Mosaic
//!
//! A [`RuntimeComposition`] is the resolved graph in the form the container
//! executes: concrete parts whose imports point directly (by index) at the
//! exports satisfying them, plus sharing-boundary data. Nothing in it needs
//! the catalog or the type registry any more.
//!
//! The [`codec`] module turns a composition into cache bytes and back.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod composition;
pub mod error;

pub use codec::{decode, encode, CacheError, CACHE_FORMAT_VERSION, CACHE_MAGIC};
pub use composition::{ExportRef, RuntimeComposition, RuntimeImport, RuntimePart};
pub use error::{InvalidComposition, Result};
