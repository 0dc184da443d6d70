//! Composition configuration
//!
//! [`CompositionConfiguration::create`] resolves a catalog into the set of
//! parts that can be composed, the exports bound to each of their imports,
//! and every configuration error found. Parts that cannot be composed are
//! rejected rather than dropped silently: they show up in
//! [`CompositionConfiguration::rejected_parts`] and in the error list, and
//! their exports stop satisfying anyone else's imports.

use crate::boundaries::{check_boundaries, required_boundaries};
use crate::closure::GenericCloser;
use crate::cycles::eager_cycles;
use crate::error::{CompositionError, CompositionFailed, ResolveError};
use crate::index::{describe_contract, export_satisfies, ExportIndex};
use mosaic_core::{
    Cardinality, Catalog, MetadataViewDefinition, PartDescriptor, TypeRef, TypeRegistry,
};
use mosaic_runtime::{ExportRef, RuntimeComposition, RuntimeImport, RuntimePart};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default cap on the number of generic closures one resolution may create
pub const DEFAULT_CLOSURE_LIMIT: usize = 1024;

/// Knobs for a resolution
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    demands: Vec<(Option<String>, TypeRef)>,
    closure_limit: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            demands: Vec::new(),
            closure_limit: DEFAULT_CLOSURE_LIMIT,
        }
    }
}

impl ResolverOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Close open generic exports for a top-level request of `ty` under
    /// the default contract, even if no import asks for it
    pub fn demand(mut self, ty: TypeRef) -> Self {
        self.demands.push((None, ty));
        self
    }

    /// Like [`demand`](Self::demand), under a named contract
    pub fn demand_named(mut self, contract_name: impl Into<String>, ty: TypeRef) -> Self {
        self.demands.push((Some(contract_name.into()), ty));
        self
    }

    /// Cap the number of generic closures
    pub fn closure_limit(mut self, limit: usize) -> Self {
        self.closure_limit = limit;
        self
    }

    /// Registered root demands
    pub fn demands(&self) -> &[(Option<String>, TypeRef)] {
        &self.demands
    }
}

/// A part that survived resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPart {
    /// The (closed) descriptor
    pub descriptor: Arc<PartDescriptor>,
    /// Per import, in declaration order: the exports bound to it. Part
    /// indices refer to [`CompositionConfiguration::parts`].
    pub satisfying: Vec<Vec<ExportRef>>,
    /// Boundaries that must be open for the part to be created
    pub required_boundaries: BTreeSet<String>,
}

impl ComposedPart {
    /// The part's identity
    pub fn part_type(&self) -> &TypeRef {
        &self.descriptor.part_type
    }

    fn to_runtime(&self) -> RuntimePart {
        let descriptor = &self.descriptor;
        RuntimePart {
            part_type: descriptor.part_type.clone(),
            activator_key: descriptor.activator_key().to_string(),
            creation_policy: descriptor.creation_policy.clone(),
            required_boundaries: self.required_boundaries.clone(),
            exports: descriptor.exports.clone(),
            imports: descriptor
                .imports
                .iter()
                .zip(&self.satisfying)
                .map(|(import, satisfying)| RuntimeImport {
                    name: import.name.clone(),
                    cardinality: import.cardinality,
                    kind: import.kind.clone(),
                    metadata_view: import.metadata_view.clone(),
                    satisfying: satisfying.clone(),
                })
                .collect(),
        }
    }
}

/// The outcome of resolving a catalog
#[derive(Debug, Clone)]
pub struct CompositionConfiguration {
    parts: Vec<ComposedPart>,
    rejected: Vec<Arc<PartDescriptor>>,
    errors: Vec<CompositionError>,
    metadata_views: BTreeMap<TypeRef, MetadataViewDefinition>,
    closures: usize,
}

impl CompositionConfiguration {
    /// Resolve `catalog` with default options
    pub fn create(catalog: &Catalog, types: &TypeRegistry) -> Self {
        Self::create_with(catalog, types, &ResolverOptions::default())
    }

    /// Resolve `catalog`
    ///
    /// Never fails: every problem is recorded in [`errors`](Self::errors)
    /// and the offending parts are rejected.
    pub fn create_with(catalog: &Catalog, types: &TypeRegistry, options: &ResolverOptions) -> Self {
        let mut resolution = Resolution {
            types,
            views: catalog.metadata_views(),
            parts: Vec::new(),
            live: Vec::new(),
            errors: Vec::new(),
        };

        let conflicting: FxHashSet<&TypeRef> =
            catalog.discrepancies().iter().map(|d| &d.part_type).collect();
        for discrepancy in catalog.discrepancies() {
            resolution.errors.push(CompositionError::ConflictingDescriptor {
                part: discrepancy.part_type.to_string(),
                differences: discrepancy.differences.clone(),
            });
        }

        let mut open = Vec::new();
        for part in catalog.parts() {
            let is_conflicting = conflicting.contains(&part.part_type);
            if part.is_open() {
                if !is_conflicting {
                    open.push(Arc::clone(part));
                }
            } else {
                resolution.parts.push(Arc::clone(part));
                resolution.live.push(!is_conflicting);
            }
        }

        let closures = resolution.close_generics(open, options);
        let index = ExportIndex::build(&resolution.parts, resolution.types);
        resolution.reject_unknown_views();

        let (satisfying, required) = loop {
            let satisfying = resolution.settle_imports(&index);
            if resolution.reject_cycles(&satisfying) {
                continue;
            }
            let required = required_boundaries(&resolution.parts, &resolution.live, &satisfying);
            let problems = check_boundaries(&resolution.parts, &resolution.live, &required);
            if problems.is_empty() {
                break (satisfying, required);
            }
            for (p, reason) in problems {
                resolution.errors.push(CompositionError::InconsistentSharingBoundary {
                    part: resolution.parts[p].part_type.to_string(),
                    reason,
                });
                resolution.reject(p);
            }
        };

        let configuration = resolution.finish(satisfying, required, catalog, closures);
        info!(
            target: "mosaic::resolver",
            parts = configuration.parts.len(),
            rejected = configuration.rejected.len(),
            closures = configuration.closures,
            errors = configuration.errors.len(),
            "Resolved composition"
        );
        configuration
    }

    /// Parts that survived resolution
    pub fn parts(&self) -> &[ComposedPart] {
        &self.parts
    }

    /// Look up a surviving part by closed type
    pub fn find_part(&self, part_type: &TypeRef) -> Option<&ComposedPart> {
        self.parts.iter().find(|p| p.part_type() == part_type)
    }

    /// Parts rejected during resolution
    pub fn rejected_parts(&self) -> &[Arc<PartDescriptor>] {
        &self.rejected
    }

    /// Every configuration error, in discovery order
    pub fn errors(&self) -> &[CompositionError] {
        &self.errors
    }

    /// Whether resolution found no errors
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of generic closures created
    pub fn closure_count(&self) -> usize {
        self.closures
    }

    /// Metadata view providers carried over from the catalog
    pub fn metadata_views(&self) -> &BTreeMap<TypeRef, MetadataViewDefinition> {
        &self.metadata_views
    }

    /// Fail with every error at once, if there are any
    pub fn throw_on_errors(&self) -> Result<&Self, CompositionFailed> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(CompositionFailed {
                errors: self.errors.clone(),
            })
        }
    }

    /// Runtime composition of an error-free configuration
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Configuration`] if any configuration error exists
    /// - [`ResolveError::Invalid`] if the parts do not form a valid runtime
    ///   composition (for instance, none survived)
    pub fn to_runtime(&self) -> Result<RuntimeComposition, ResolveError> {
        self.throw_on_errors()?;
        self.build_runtime()
    }

    /// Runtime composition of the surviving parts, treating configuration
    /// errors as warnings
    pub fn to_runtime_ignoring_errors(&self) -> Result<RuntimeComposition, ResolveError> {
        if !self.errors.is_empty() {
            warn!(
                target: "mosaic::resolver",
                errors = self.errors.len(),
                rejected = self.rejected.len(),
                "Building runtime composition without rejected parts"
            );
        }
        self.build_runtime()
    }

    fn build_runtime(&self) -> Result<RuntimeComposition, ResolveError> {
        let parts = self.parts.iter().map(ComposedPart::to_runtime).collect();
        Ok(RuntimeComposition::new(parts, self.metadata_views.clone())?)
    }
}

#[derive(Default)]
struct PartMatch {
    satisfying: Vec<Vec<ExportRef>>,
    missing: Vec<CompositionError>,
    ambiguous: Vec<CompositionError>,
}

/// Working state of one resolution. `parts` holds every closed part,
/// rejected or not; `live[p]` says whether part `p` is still in play.
struct Resolution<'a> {
    types: &'a TypeRegistry,
    views: &'a BTreeMap<TypeRef, MetadataViewDefinition>,
    parts: Vec<Arc<PartDescriptor>>,
    live: Vec<bool>,
    errors: Vec<CompositionError>,
}

impl Resolution<'_> {
    fn reject(&mut self, p: usize) {
        if self.live[p] {
            self.live[p] = false;
            debug!(
                target: "mosaic::resolver",
                part = %self.parts[p].part_type,
                "Rejected part"
            );
        }
    }

    fn part_name(&self, p: usize) -> String {
        self.parts[p].part_type.to_string()
    }

    /// Close open parts against every requested type, transitively
    fn close_generics(
        &mut self,
        open: Vec<Arc<PartDescriptor>>,
        options: &ResolverOptions,
    ) -> usize {
        let closer = GenericCloser::new(self.types, open);
        if closer.is_empty() {
            return 0;
        }

        let mut known: FxHashSet<TypeRef> =
            self.parts.iter().map(|p| p.part_type.clone()).collect();
        let mut seen: FxHashSet<(Option<String>, TypeRef)> = FxHashSet::default();
        let mut queue: VecDeque<(Option<String>, TypeRef, String)> = options
            .demands
            .iter()
            .map(|(contract, ty)| (contract.clone(), ty.clone(), ty.to_string()))
            .collect();
        for part in &self.parts {
            queue.extend(requests_of(part));
        }

        let mut closures = 0;
        while let Some((contract, requested, origin)) = queue.pop_front() {
            if !seen.insert((contract.clone(), requested.clone())) {
                continue;
            }
            for closed in closer.closures_for(&contract, &requested) {
                if !known.insert(closed.part_type.clone()) {
                    continue;
                }
                if closures == options.closure_limit {
                    warn!(
                        target: "mosaic::resolver",
                        origin = %origin,
                        limit = options.closure_limit,
                        "Generic closure limit exceeded"
                    );
                    self.errors
                        .push(CompositionError::ClosureLimitExceeded { part: origin });
                    return closures;
                }
                closures += 1;
                debug!(
                    target: "mosaic::resolver",
                    part = %closed.part_type,
                    "Closed generic part"
                );
                let closed = Arc::new(closed);
                queue.extend(requests_of(&closed));
                self.parts.push(closed);
                self.live.push(true);
            }
        }
        closures
    }

    fn reject_unknown_views(&mut self) {
        for p in 0..self.parts.len() {
            if !self.live[p] {
                continue;
            }
            let unknown: Vec<CompositionError> = self.parts[p]
                .imports
                .iter()
                .filter_map(|import| {
                    let view = import.metadata_view.as_ref()?;
                    (!self.views.contains_key(view)).then(|| CompositionError::UnknownMetadataView {
                        part: self.part_name(p),
                        import: import.name.clone(),
                        view: view.to_string(),
                    })
                })
                .collect();
            if !unknown.is_empty() {
                self.errors.extend(unknown);
                self.reject(p);
            }
        }
    }

    fn match_part(&self, index: &ExportIndex, p: usize) -> PartMatch {
        let mut out = PartMatch::default();
        for import in &self.parts[p].imports {
            let view = import.metadata_view.as_ref().and_then(|v| self.views.get(v));
            let (live, dead): (Vec<ExportRef>, Vec<ExportRef>) = index
                .candidates(import)
                .iter()
                .copied()
                .filter(|r| {
                    let export = &self.parts[r.part].exports[r.export];
                    export_satisfies(self.types, import, export)
                        && view.map_or(true, |v| v.accepts(&export.metadata))
                })
                .partition(|r| self.live[r.part]);

            match (import.cardinality, live.len()) {
                (Cardinality::ExactlyOne, 0) => {
                    out.missing.push(CompositionError::MissingImport {
                        part: self.part_name(p),
                        import: import.name.clone(),
                        contract: describe_contract(import),
                        rejected_candidates: self.names(&dead),
                    });
                }
                (Cardinality::ExactlyOne | Cardinality::ZeroOrOne, n) if n > 1 => {
                    out.ambiguous.push(CompositionError::AmbiguousImport {
                        part: self.part_name(p),
                        import: import.name.clone(),
                        contract: describe_contract(import),
                        candidates: self.names(&live),
                    });
                }
                _ => {}
            }
            out.satisfying.push(live);
        }
        out
    }

    fn names(&self, refs: &[ExportRef]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for r in refs {
            let name = self.part_name(r.part);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Match every live part until no more parts get rejected.
    ///
    /// Missing imports cascade first; ambiguity is judged only once the
    /// live set is stable with respect to missing imports, so a candidate
    /// that is itself unsatisfiable never makes an import ambiguous.
    fn settle_imports(&mut self, index: &ExportIndex) -> Vec<Vec<Vec<ExportRef>>> {
        loop {
            let matches: Vec<Option<PartMatch>> = (0..self.parts.len())
                .map(|p| self.live[p].then(|| self.match_part(index, p)))
                .collect();
            let has_missing = matches.iter().flatten().any(|m| !m.missing.is_empty());

            let mut rejected_any = false;
            for (p, found) in matches.iter().enumerate() {
                let Some(found) = found else { continue };
                let fails = if has_missing {
                    !found.missing.is_empty()
                } else {
                    !found.ambiguous.is_empty()
                };
                if fails {
                    self.errors.extend(found.missing.iter().cloned());
                    self.errors.extend(found.ambiguous.iter().cloned());
                    self.reject(p);
                    rejected_any = true;
                }
            }

            if !rejected_any {
                return matches
                    .into_iter()
                    .map(|m| m.map(|m| m.satisfying).unwrap_or_default())
                    .collect();
            }
        }
    }

    /// Reject parts on eager-only cycles; true if any were found
    fn reject_cycles(&mut self, satisfying: &[Vec<Vec<ExportRef>>]) -> bool {
        let edges: Vec<Vec<usize>> = self
            .parts
            .iter()
            .enumerate()
            .map(|(p, part)| {
                if !self.live[p] {
                    return Vec::new();
                }
                part.imports
                    .iter()
                    .zip(&satisfying[p])
                    .filter(|(import, _)| !import.kind.is_deferred())
                    .flat_map(|(_, targets)| targets.iter().map(|t| t.part))
                    .collect()
            })
            .collect();

        let cycles = eager_cycles(&edges);
        for cycle in &cycles {
            self.errors.push(CompositionError::UnsupportedCycle {
                parts: cycle.iter().map(|&p| self.part_name(p)).collect(),
            });
            for &p in cycle {
                self.reject(p);
            }
        }
        !cycles.is_empty()
    }

    fn finish(
        self,
        satisfying: Vec<Vec<Vec<ExportRef>>>,
        required: Vec<BTreeSet<String>>,
        catalog: &Catalog,
        closures: usize,
    ) -> CompositionConfiguration {
        let mut remap = vec![None; self.parts.len()];
        let mut next = 0;
        for (p, slot) in remap.iter_mut().enumerate() {
            if self.live[p] {
                *slot = Some(next);
                next += 1;
            }
        }

        let mut parts = Vec::with_capacity(next);
        let mut rejected = Vec::new();
        for (p, ((descriptor, targets), boundaries)) in self
            .parts
            .into_iter()
            .zip(satisfying)
            .zip(required)
            .enumerate()
        {
            if !self.live[p] {
                rejected.push(descriptor);
                continue;
            }
            let targets = targets
                .into_iter()
                .map(|refs| {
                    refs.into_iter()
                        .filter_map(|r| remap[r.part].map(|np| ExportRef::new(np, r.export)))
                        .collect()
                })
                .collect();
            parts.push(ComposedPart {
                descriptor,
                satisfying: targets,
                required_boundaries: boundaries,
            });
        }

        CompositionConfiguration {
            parts,
            rejected,
            errors: self.errors,
            metadata_views: catalog.metadata_views().clone(),
            closures,
        }
    }
}

fn requests_of(
    part: &PartDescriptor,
) -> impl Iterator<Item = (Option<String>, TypeRef, String)> + '_ {
    part.imports.iter().filter_map(move |import| {
        import.requested_type().map(|ty| {
            (
                import.contract_name.clone(),
                ty.clone(),
                part.part_type.to_string(),
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::ImportDefinition;

    #[test]
    fn test_options_builder() {
        let options = ResolverOptions::new()
            .demand(TypeRef::named("A"))
            .demand_named("special", TypeRef::named("B"))
            .closure_limit(3);
        assert_eq!(options.demands().len(), 2);
        assert_eq!(options.demands()[1].0.as_deref(), Some("special"));
        assert_eq!(options.closure_limit, 3);
        assert_eq!(ResolverOptions::default().closure_limit, DEFAULT_CLOSURE_LIMIT);
    }

    #[test]
    fn test_composed_part_to_runtime() {
        let descriptor = PartDescriptor::new(TypeRef::named("Shop"))
            .exports_self()
            .import(ImportDefinition::zero_or_more("items", TypeRef::named("Item")).lazy());
        let part = ComposedPart {
            descriptor: Arc::new(descriptor),
            satisfying: vec![vec![ExportRef::new(1, 0)]],
            required_boundaries: BTreeSet::new(),
        };
        let runtime = part.to_runtime();
        assert_eq!(runtime.activator_key, "Shop");
        assert_eq!(runtime.imports.len(), 1);
        assert_eq!(runtime.imports[0].satisfying, vec![ExportRef::new(1, 0)]);
        assert_eq!(runtime.imports[0].cardinality, Cardinality::ZeroOrMore);
    }

    #[test]
    fn test_empty_catalog_has_no_runtime() {
        let config = CompositionConfiguration::create(&Catalog::new(), &TypeRegistry::new());
        assert!(config.is_valid());
        assert!(matches!(config.to_runtime(), Err(ResolveError::Invalid(_))));
    }
}
