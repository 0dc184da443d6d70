//! Descriptor producers
//!
//! Where descriptors come from is not the core's business. Anything that
//! can hand over a list of [`PartDescriptor`]s implements [`PartDiscovery`]:
//! manual registration ([`StaticDiscovery`]), descriptor documents
//! ([`JsonDiscovery`]), or a code generator.

use crate::descriptor::PartDescriptor;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A source of part descriptors
pub trait PartDiscovery {
    /// Produce descriptors
    fn discover(&self) -> Result<Vec<PartDescriptor>>;
}

/// Descriptors registered by hand
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    parts: Vec<PartDescriptor>,
}

impl StaticDiscovery {
    /// Empty registration list
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor
    pub fn register(mut self, descriptor: PartDescriptor) -> Self {
        self.parts.push(descriptor);
        self
    }
}

impl PartDiscovery for StaticDiscovery {
    fn discover(&self) -> Result<Vec<PartDescriptor>> {
        Ok(self.parts.clone())
    }
}

/// On-disk / in-memory descriptor document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorDocument {
    /// Parts in the document
    #[serde(default)]
    pub parts: Vec<PartDescriptor>,
}

/// Descriptors read from a JSON document
///
/// ```json
/// { "parts": [ { "part_type": "Fruit.Apple",
///                "exports": [ { "contract_type": "Fruit.Apple" } ],
///                "creation_policy": "NonShared" } ] }
/// ```
#[derive(Debug, Clone)]
pub struct JsonDiscovery {
    source: String,
}

impl JsonDiscovery {
    /// Discovery over a JSON string
    pub fn from_json(source: impl Into<String>) -> Self {
        JsonDiscovery {
            source: source.into(),
        }
    }

    /// Discovery over a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::Discovery(format!(
                "Failed to read descriptor file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_json(source))
    }

    /// Render descriptors as a document this discovery can read back
    pub fn to_json(parts: &[PartDescriptor]) -> Result<String> {
        let doc = DescriptorDocument {
            parts: parts.to_vec(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

impl PartDiscovery for JsonDiscovery {
    fn discover(&self) -> Result<Vec<PartDescriptor>> {
        let doc: DescriptorDocument = serde_json::from_str(&self.source)?;
        tracing::debug!(
            target: "mosaic::discovery",
            parts = doc.parts.len(),
            "Read descriptor document"
        );
        Ok(doc.parts)
    }
}
