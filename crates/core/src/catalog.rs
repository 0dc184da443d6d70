//! Immutable catalog of part descriptors
//!
//! Parts are identified by their part type (full name, namespace included).
//! Adding a descriptor that is identical to one already present collapses
//! into the existing entry. Adding a *different* descriptor under an
//! existing identity keeps the first one and records a
//! [`CatalogDiscrepancy`]; the resolver reports those as configuration
//! errors alongside everything else it finds.
//!
//! Catalog operations never mutate: `add_part` and friends return a new
//! catalog sharing the existing descriptors.

use crate::descriptor::PartDescriptor;
use crate::discovery::PartDiscovery;
use crate::error::{Error, Result};
use crate::metadata::MetadataViewDefinition;
use crate::types::TypeRef;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Two descriptors claimed the same identity but differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDiscrepancy {
    /// The contested part type
    pub part_type: TypeRef,
    /// Which aspects differ (exports, metadata, imports, ...)
    pub differences: Vec<String>,
}

/// Immutable, validated collection of part descriptors
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    parts: Vec<Arc<PartDescriptor>>,
    by_type: HashMap<TypeRef, usize>,
    discrepancies: Vec<CatalogDiscrepancy>,
    metadata_views: BTreeMap<TypeRef, MetadataViewDefinition>,
}

impl Catalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from descriptors
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPart`] for the first structurally invalid
    /// descriptor.
    pub fn create(descriptors: impl IntoIterator<Item = PartDescriptor>) -> Result<Self> {
        Catalog::new().add_parts(descriptors)
    }

    /// Build a catalog from a descriptor producer
    pub fn from_discovery(discovery: &dyn PartDiscovery) -> Result<Self> {
        Catalog::create(discovery.discover()?)
    }

    /// New catalog with `descriptor` added
    pub fn add_part(&self, descriptor: PartDescriptor) -> Result<Self> {
        let mut next = self.clone();
        next.insert(descriptor)?;
        Ok(next)
    }

    /// New catalog with every descriptor added
    pub fn add_parts(&self, descriptors: impl IntoIterator<Item = PartDescriptor>) -> Result<Self> {
        let mut next = self.clone();
        for descriptor in descriptors {
            next.insert(descriptor)?;
        }
        Ok(next)
    }

    /// New catalog with a metadata view definition registered
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConflictingMetadataView`] if a different definition
    /// for the same view type is already present.
    pub fn with_metadata_view(&self, view: MetadataViewDefinition) -> Result<Self> {
        let mut next = self.clone();
        match next.metadata_views.get(&view.view_type) {
            Some(existing) if *existing != view => {
                return Err(Error::ConflictingMetadataView(view.view_type.to_string()))
            }
            Some(_) => {}
            None => {
                next.metadata_views.insert(view.view_type.clone(), view);
            }
        }
        Ok(next)
    }

    fn insert(&mut self, descriptor: PartDescriptor) -> Result<()> {
        descriptor
            .check()
            .map_err(|reason| Error::invalid_part(descriptor.part_type.to_string(), reason))?;

        if let Some(&index) = self.by_type.get(&descriptor.part_type) {
            let existing = &self.parts[index];
            if **existing == descriptor {
                tracing::debug!(
                    target: "mosaic::catalog",
                    part = %descriptor.part_type,
                    "Collapsed duplicate part descriptor"
                );
            } else {
                let differences = describe_differences(existing, &descriptor);
                tracing::warn!(
                    target: "mosaic::catalog",
                    part = %descriptor.part_type,
                    differences = ?differences,
                    "Conflicting descriptors share one identity"
                );
                self.discrepancies.push(CatalogDiscrepancy {
                    part_type: descriptor.part_type.clone(),
                    differences,
                });
            }
            return Ok(());
        }

        self.by_type
            .insert(descriptor.part_type.clone(), self.parts.len());
        self.parts.push(Arc::new(descriptor));
        Ok(())
    }

    /// All parts in insertion order
    pub fn parts(&self) -> &[Arc<PartDescriptor>] {
        &self.parts
    }

    /// Look up a part by exact identity
    pub fn get(&self, part_type: &TypeRef) -> Option<&PartDescriptor> {
        self.by_type.get(part_type).map(|&i| &*self.parts[i])
    }

    /// Number of distinct parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the catalog holds no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Identity collisions between differing descriptors
    pub fn discrepancies(&self) -> &[CatalogDiscrepancy] {
        &self.discrepancies
    }

    /// Registered metadata views
    pub fn metadata_views(&self) -> &BTreeMap<TypeRef, MetadataViewDefinition> {
        &self.metadata_views
    }

    /// Look up a metadata view
    pub fn metadata_view(&self, view_type: &TypeRef) -> Option<&MetadataViewDefinition> {
        self.metadata_views.get(view_type)
    }
}

type ExportContract<'a> = (&'a Option<String>, &'a TypeRef, &'a Option<String>);

fn export_contracts(part: &PartDescriptor) -> Vec<ExportContract<'_>> {
    part.exports
        .iter()
        .map(|e| (&e.contract_name, &e.contract_type, &e.member))
        .collect()
}

fn describe_differences(a: &PartDescriptor, b: &PartDescriptor) -> Vec<String> {
    let mut out = Vec::new();
    if a.type_params != b.type_params {
        out.push("type parameters".to_string());
    }
    if export_contracts(a) != export_contracts(b) {
        out.push("exports".to_string());
    } else if a.exports.iter().zip(&b.exports).any(|(x, y)| x.metadata != y.metadata) {
        out.push("export metadata".to_string());
    }
    if a.imports != b.imports {
        out.push("imports".to_string());
    }
    if a.creation_policy != b.creation_policy {
        out.push("creation policy".to_string());
    }
    if a.required_boundaries != b.required_boundaries {
        out.push("required boundaries".to_string());
    }
    out
}
