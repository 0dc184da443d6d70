//! Export index
//!
//! Exports are filed by contract name, then by the definition name of their
//! contract type and of every base that type derives from. An import typed
//! `Fruit.IFruit` only ever looks at exports filed under `Fruit.IFruit`;
//! dynamic imports see every export of their contract name.

use mosaic_core::{
    ExportDefinition, ImportDefinition, Metadata, PartDescriptor, TypeFilter, TypeRef,
    TypeRegistry,
};
use mosaic_runtime::ExportRef;
use rustc_hash::{FxHashMap, FxHashSet};
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Default)]
struct ContractExports {
    /// Every export of the contract, in part order
    all: Vec<ExportRef>,
    /// Definition name (own or base) -> exports, in part order
    by_type: FxHashMap<String, Vec<ExportRef>>,
    /// Exports whose type or a base is a bare parameter; they may match
    /// any request
    untyped: Vec<ExportRef>,
}

/// Exports of the closed parts, keyed by contract name and type
pub(crate) struct ExportIndex {
    by_contract: FxHashMap<Option<String>, ContractExports>,
}

impl ExportIndex {
    pub(crate) fn build(parts: &[Arc<PartDescriptor>], types: &TypeRegistry) -> Self {
        let mut by_contract: FxHashMap<Option<String>, ContractExports> = FxHashMap::default();
        for (p, part) in parts.iter().enumerate() {
            for (e, export) in part.exports.iter().enumerate() {
                let r = ExportRef::new(p, e);
                let entry = by_contract.entry(export.contract_name.clone()).or_default();
                entry.all.push(r);
                let (names, untyped) = type_keys(types, &export.contract_type);
                for name in names {
                    entry.by_type.entry(name).or_default().push(r);
                }
                if untyped {
                    entry.untyped.push(r);
                }
            }
        }
        ExportIndex { by_contract }
    }

    /// Exports that may satisfy `import`, in part order. Candidates still
    /// need [`export_satisfies`].
    pub(crate) fn candidates(&self, import: &ImportDefinition) -> Cow<'_, [ExportRef]> {
        let Some(contract) = self.by_contract.get(&import.contract_name) else {
            return Cow::Borrowed(&[]);
        };
        let name = match &import.type_filter {
            TypeFilter::Any => return Cow::Borrowed(&contract.all),
            TypeFilter::Assignable(wanted) => match wanted.name() {
                Some(name) => name,
                None => return Cow::Borrowed(&contract.all),
            },
        };
        let typed = contract.by_type.get(name).map(Vec::as_slice).unwrap_or(&[]);
        if contract.untyped.is_empty() {
            return Cow::Borrowed(typed);
        }
        let mut merged: Vec<ExportRef> = typed.iter().chain(&contract.untyped).copied().collect();
        merged.sort_unstable();
        merged.dedup();
        Cow::Owned(merged)
    }
}

/// Definition names `ty` can be assigned to, and whether a parameter
/// shows up on the way
fn type_keys(types: &TypeRegistry, ty: &TypeRef) -> (Vec<String>, bool) {
    let mut names = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut untyped = false;
    let mut pending = vec![ty.clone()];
    while let Some(next) = pending.pop() {
        let Some(name) = next.name() else {
            untyped = true;
            continue;
        };
        if !seen.insert(name.to_string()) {
            continue;
        }
        names.push(name.to_string());
        pending.extend(types.bases_of(&next));
    }
    (names, untyped)
}

/// Type and metadata-constraint compatibility; metadata views are checked
/// separately because they need the catalog.
pub(crate) fn export_satisfies(
    types: &TypeRegistry,
    import: &ImportDefinition,
    export: &ExportDefinition,
) -> bool {
    let type_ok = match &import.type_filter {
        TypeFilter::Assignable(wanted) => types.is_assignable(&export.contract_type, wanted),
        TypeFilter::Any => true,
    };
    type_ok && has_entries(&export.metadata, &import.required_metadata)
}

fn has_entries(metadata: &Metadata, required: &Metadata) -> bool {
    required
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}

/// Human-readable description of what an import asks for
pub(crate) fn describe_contract(import: &ImportDefinition) -> String {
    let ty = match &import.type_filter {
        TypeFilter::Assignable(t) => t.to_string(),
        TypeFilter::Any => "any".to_string(),
    };
    match &import.contract_name {
        Some(name) => format!("\"{}\" {}", name, ty),
        None => ty,
    }
}
