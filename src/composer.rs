//! Catalog to container in one step
//!
//! A [`Composer`] resolves a catalog, applies the configured error policy
//! and binds the result to a resolver's activators. With a `cache_file`
//! configured, the runtime composition is saved after resolution and reused
//! on later runs while the inputs are unchanged; a missing, stale or corrupt
//! cache falls back to resolving.
//!
//! Cache file: CRC32 fingerprint of the inputs (`u32`, LE), then the
//! runtime composition envelope written by [`mosaic_engine::save`].

use crate::config::{ErrorPolicy, MosaicConfig};
use crate::error::{Error, Result};
use mosaic_core::{Catalog, MetadataViewDefinition, PartDescriptor, PartDiscovery, TypeDefinition};
use mosaic_engine::{ExportProviderFactory, Resolver};
use mosaic_resolver::{CompositionConfiguration, ResolverOptions};
use mosaic_runtime::{RuntimeComposition, CACHE_FORMAT_VERSION};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

const FINGERPRINT_LEN: usize = 4;

/// Everything a resolution depends on
#[derive(Serialize)]
struct CacheKey<'a> {
    format: u32,
    error_policy: &'a str,
    options: String,
    types: Vec<&'a TypeDefinition>,
    parts: Vec<&'a PartDescriptor>,
    views: Vec<&'a MetadataViewDefinition>,
    discrepancies: String,
}

/// Builds export provider factories from a catalog
#[derive(Debug, Clone)]
pub struct Composer {
    catalog: Catalog,
    resolver: Resolver,
    config: MosaicConfig,
    options: ResolverOptions,
}

impl Composer {
    /// Composer over `catalog`, resolving against `resolver`'s type registry
    pub fn new(catalog: Catalog, resolver: Resolver, config: MosaicConfig) -> Self {
        Composer {
            catalog,
            resolver,
            config,
            options: ResolverOptions::default(),
        }
    }

    /// Composer over the parts a discovery produces
    pub fn from_discovery(
        discovery: &dyn PartDiscovery,
        resolver: Resolver,
        config: MosaicConfig,
    ) -> Result<Self> {
        let catalog = Catalog::from_discovery(discovery)?;
        Ok(Self::new(catalog, resolver, config))
    }

    /// Resolve with custom options (root demands, closure limit)
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// The catalog being composed
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The active configuration
    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    /// Resolve the catalog, ignoring any cache
    pub fn resolve(&self) -> CompositionConfiguration {
        CompositionConfiguration::create_with(&self.catalog, self.resolver.types(), &self.options)
    }

    /// Produce a factory, from the cache when it is current
    ///
    /// # Errors
    ///
    /// Fails on an invalid error policy, on configuration errors under the
    /// `fail` policy, when the cache cannot be written, and when
    /// `verify_activators` is set and a part has no activator.
    pub fn compose(&self) -> Result<ExportProviderFactory> {
        let policy = self.config.error_policy()?;
        let fingerprint = self.fingerprint()?;

        if let Some(path) = &self.config.cache_file {
            if let Some(composition) = load_cache(path, fingerprint) {
                info!(
                    target: "mosaic::composer",
                    path = %path.display(),
                    parts = composition.parts().len(),
                    "Loaded cached composition"
                );
                return self.bind(composition);
            }
        }

        let configuration = self.resolve();
        let composition = match policy {
            ErrorPolicy::Fail => configuration.to_runtime()?,
            ErrorPolicy::Warn => configuration.to_runtime_ignoring_errors()?,
        };

        if let Some(path) = &self.config.cache_file {
            save_cache(path, fingerprint, &composition)?;
            info!(
                target: "mosaic::composer",
                path = %path.display(),
                parts = composition.parts().len(),
                "Saved composition cache"
            );
        }
        self.bind(composition)
    }

    /// CRC32 over everything resolution depends on: catalog parts, metadata
    /// views, discrepancies, type definitions, options and the error policy
    pub fn fingerprint(&self) -> Result<u32> {
        let key = CacheKey {
            format: CACHE_FORMAT_VERSION,
            error_policy: &self.config.error_policy,
            options: format!("{:?}", self.options),
            types: self.resolver.types().definitions(),
            parts: self.catalog.parts().iter().map(|p| p.as_ref()).collect(),
            views: self.catalog.metadata_views().values().collect(),
            discrepancies: format!("{:?}", self.catalog.discrepancies()),
        };
        let bytes = serde_json::to_vec(&key)
            .map_err(|e| Error::Config(format!("Failed to fingerprint catalog: {}", e)))?;
        Ok(crc32fast::hash(&bytes))
    }

    fn bind(&self, composition: RuntimeComposition) -> Result<ExportProviderFactory> {
        if self.config.verify_activators {
            Ok(ExportProviderFactory::new(composition, &self.resolver)?)
        } else {
            Ok(ExportProviderFactory::with_deferred_activators(
                composition,
                &self.resolver,
            ))
        }
    }
}

fn load_cache(path: &Path, fingerprint: u32) -> Option<RuntimeComposition> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(target: "mosaic::composer", path = %path.display(), "No composition cache");
            return None;
        }
        Err(e) => {
            warn!(
                target: "mosaic::composer",
                path = %path.display(),
                error = %e,
                "Unreadable composition cache"
            );
            return None;
        }
    };
    if bytes.len() < FINGERPRINT_LEN {
        warn!(target: "mosaic::composer", path = %path.display(), "Truncated composition cache");
        return None;
    }
    let (head, payload) = bytes.split_at(FINGERPRINT_LEN);
    let mut stored = [0u8; FINGERPRINT_LEN];
    stored.copy_from_slice(head);
    if u32::from_le_bytes(stored) != fingerprint {
        debug!(target: "mosaic::composer", path = %path.display(), "Stale composition cache");
        return None;
    }
    match mosaic_runtime::decode(payload) {
        Ok(composition) => Some(composition),
        Err(e) => {
            warn!(
                target: "mosaic::composer",
                path = %path.display(),
                error = %e,
                "Corrupt composition cache"
            );
            None
        }
    }
}

fn save_cache(path: &Path, fingerprint: u32, composition: &RuntimeComposition) -> Result<()> {
    let payload = mosaic_engine::save(composition)?;
    let mut bytes = Vec::with_capacity(FINGERPRINT_LEN + payload.len());
    bytes.extend_from_slice(&fingerprint.to_le_bytes());
    bytes.extend_from_slice(&payload);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| Error::io(path, e))
}
