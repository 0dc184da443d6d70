//! Cached compositions
//!
//! `load(save(x))` yields a composition structurally equal to `x`, and the
//! factory built from it behaves exactly like one built from `x` directly.

use crate::error::Result;
use crate::provider::ExportProviderFactory;
use crate::resolver::Resolver;
use mosaic_runtime::RuntimeComposition;

/// Serialize a composition
pub fn save(composition: &RuntimeComposition) -> Result<Vec<u8>> {
    Ok(mosaic_runtime::encode(composition)?)
}

/// Deserialize a composition and bind it to `resolver`
///
/// # Errors
///
/// [`Error::Cache`](crate::Error::Cache) if the bytes are not a valid
/// cache, [`Error::MissingActivator`](crate::Error::MissingActivator) if
/// the resolver cannot build one of its parts.
pub fn load(bytes: &[u8], resolver: &Resolver) -> Result<ExportProviderFactory> {
    let composition = mosaic_runtime::decode(bytes)?;
    ExportProviderFactory::new(composition, resolver)
}
