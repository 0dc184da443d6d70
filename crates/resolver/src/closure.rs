//! Closing open generic parts
//!
//! An open part is closed when one of its exports can be bound to a type an
//! importer (or a root demand) asks for. Binding must fix every parameter
//! and satisfy every parameter constraint; anything less is not a match.

use mosaic_core::{Bindings, PartDescriptor, TypeRef, TypeRegistry};
use std::sync::Arc;

pub(crate) struct GenericCloser<'a> {
    types: &'a TypeRegistry,
    open: Vec<Arc<PartDescriptor>>,
}

impl<'a> GenericCloser<'a> {
    pub(crate) fn new(types: &'a TypeRegistry, open: Vec<Arc<PartDescriptor>>) -> Self {
        GenericCloser { types, open }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Closed descriptors able to export `requested` under `contract_name`
    pub(crate) fn closures_for(
        &self,
        contract_name: &Option<String>,
        requested: &TypeRef,
    ) -> Vec<PartDescriptor> {
        if requested.is_open() {
            return Vec::new();
        }
        let mut out: Vec<PartDescriptor> = Vec::new();
        for part in &self.open {
            for export in part
                .exports
                .iter()
                .filter(|e| &e.contract_name == contract_name)
            {
                let mut bindings = Bindings::new();
                if !self
                    .types
                    .bind(&export.contract_type, requested, &mut bindings)
                {
                    continue;
                }
                if !self.types.satisfies(&part.type_params, &bindings) {
                    tracing::debug!(
                        target: "mosaic::resolver",
                        part = %part.part_type,
                        requested = %requested,
                        "Generic closure rejected by parameter constraints"
                    );
                    continue;
                }
                let closed = part.close(&bindings);
                if !out.iter().any(|c| c.part_type == closed.part_type) {
                    out.push(closed);
                }
            }
        }
        out
    }
}
