//! Flattened, index-linked composition

use crate::error::{InvalidComposition, Result};
use mosaic_core::{
    Cardinality, CreationPolicy, ExportDefinition, ImportKind, MetadataViewDefinition, TypeRef,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Direct reference to one export of one part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExportRef {
    /// Index into [`RuntimeComposition::parts`]
    pub part: usize,
    /// Index into the part's exports
    pub export: usize,
}

impl ExportRef {
    /// Reference export `export` of part `part`
    pub fn new(part: usize, export: usize) -> Self {
        ExportRef { part, export }
    }
}

/// A resolved import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeImport {
    /// Import slot name
    pub name: String,
    /// Declared cardinality
    pub cardinality: Cardinality,
    /// Delivery
    pub kind: ImportKind,
    /// Requested metadata view
    pub metadata_view: Option<TypeRef>,
    /// Exports satisfying the import, in resolution order
    pub satisfying: Vec<ExportRef>,
}

/// A concrete part ready for activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePart {
    /// Closed part type
    pub part_type: TypeRef,
    /// Activator lookup key
    pub activator_key: String,
    /// Sharing
    pub creation_policy: CreationPolicy,
    /// Every boundary that must be open for the part to be created
    pub required_boundaries: BTreeSet<String>,
    /// Exports
    pub exports: Vec<ExportDefinition>,
    /// Resolved imports
    pub imports: Vec<RuntimeImport>,
}

impl RuntimePart {
    /// Whether instances are shared
    pub fn is_shared(&self) -> bool {
        self.creation_policy.is_shared()
    }
}

/// Resolved graph in executable form. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeComposition {
    parts: Vec<RuntimePart>,
    metadata_views: BTreeMap<TypeRef, MetadataViewDefinition>,
}

impl RuntimeComposition {
    /// Build and validate a composition
    ///
    /// # Errors
    ///
    /// - [`InvalidComposition::NoParts`] if `parts` is empty
    /// - [`InvalidComposition::MissingMetadataViewProviders`] if an import
    ///   requests a metadata view while `metadata_views` is empty
    /// - [`InvalidComposition::UnknownMetadataView`] if a requested view has
    ///   no provider
    /// - [`InvalidComposition::DanglingReference`] if an import points
    ///   outside the part list
    /// - [`InvalidComposition::CardinalityViolation`] if an import is bound
    ///   to a number of exports its cardinality forbids
    pub fn new(
        parts: Vec<RuntimePart>,
        metadata_views: BTreeMap<TypeRef, MetadataViewDefinition>,
    ) -> Result<Self> {
        let composition = RuntimeComposition {
            parts,
            metadata_views,
        };
        composition.validate()?;
        Ok(composition)
    }

    /// Re-check every construction invariant
    pub fn validate(&self) -> Result<()> {
        if self.parts.is_empty() {
            return Err(InvalidComposition::NoParts);
        }

        for part in &self.parts {
            for import in &part.imports {
                if let Some(view) = &import.metadata_view {
                    if self.metadata_views.is_empty() {
                        return Err(InvalidComposition::MissingMetadataViewProviders {
                            part: part.part_type.to_string(),
                            import: import.name.clone(),
                            view: view.to_string(),
                        });
                    }
                    if !self.metadata_views.contains_key(view) {
                        return Err(InvalidComposition::UnknownMetadataView {
                            part: part.part_type.to_string(),
                            import: import.name.clone(),
                            view: view.to_string(),
                        });
                    }
                }

                let count = import.satisfying.len();
                let allowed = match import.cardinality {
                    Cardinality::ExactlyOne => count == 1,
                    Cardinality::ZeroOrOne => count <= 1,
                    Cardinality::ZeroOrMore => true,
                };
                if !allowed {
                    return Err(InvalidComposition::CardinalityViolation {
                        part: part.part_type.to_string(),
                        import: import.name.clone(),
                        count,
                        cardinality: format!("{:?}", import.cardinality),
                    });
                }

                for target in &import.satisfying {
                    let exists = self
                        .parts
                        .get(target.part)
                        .is_some_and(|p| target.export < p.exports.len());
                    if !exists {
                        return Err(InvalidComposition::DanglingReference {
                            part: part.part_type.to_string(),
                            import: import.name.clone(),
                            target_part: target.part,
                            target_export: target.export,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// All parts
    pub fn parts(&self) -> &[RuntimePart] {
        &self.parts
    }

    /// Part by index
    pub fn part(&self, index: usize) -> Option<&RuntimePart> {
        self.parts.get(index)
    }

    /// Export definition behind a reference
    pub fn export(&self, target: ExportRef) -> Option<&ExportDefinition> {
        self.parts.get(target.part)?.exports.get(target.export)
    }

    /// Every export with its reference, in part order
    pub fn exports(&self) -> impl Iterator<Item = (ExportRef, &ExportDefinition)> + '_ {
        self.parts.iter().enumerate().flat_map(|(p, part)| {
            part.exports
                .iter()
                .enumerate()
                .map(move |(e, export)| (ExportRef::new(p, e), export))
        })
    }

    /// Index of the part with the given closed type
    pub fn find_part(&self, part_type: &TypeRef) -> Option<usize> {
        self.parts.iter().position(|p| &p.part_type == part_type)
    }

    /// Metadata view providers
    pub fn metadata_views(&self) -> &BTreeMap<TypeRef, MetadataViewDefinition> {
        &self.metadata_views
    }

    /// Look up one metadata view provider
    pub fn metadata_view(&self, view_type: &TypeRef) -> Option<&MetadataViewDefinition> {
        self.metadata_views.get(view_type)
    }
}
