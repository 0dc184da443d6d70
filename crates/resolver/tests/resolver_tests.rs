//! Resolution behavior over whole catalogs: matching, cardinality, generic
//! closure, rejection cascade, cycles and sharing boundaries.

use mosaic_core::{
    Cardinality, Catalog, ExportDefinition, GenericParam, ImportDefinition,
    MetadataViewDefinition, PartDescriptor, TypeDefinition, TypeRef, TypeRegistry,
};
use mosaic_resolver::{
    CompositionConfiguration, CompositionError, ResolveError, ResolverOptions,
};

fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

fn tree(arg: TypeRef) -> TypeRef {
    TypeRef::generic("Fruit.Tree", [arg])
}

fn fruit_types() -> TypeRegistry {
    TypeRegistry::new()
        .with(TypeDefinition::new("Fruit.Apple").with_base(t("Fruit.IFruit")))
        .with(TypeDefinition::new("Fruit.Pear").with_base(t("Fruit.IFruit")))
        .with(TypeDefinition::new("Rock"))
}

fn resolve(parts: Vec<PartDescriptor>) -> CompositionConfiguration {
    let catalog = Catalog::create(parts).unwrap();
    CompositionConfiguration::create(&catalog, &fruit_types())
}

fn part(name: &str) -> PartDescriptor {
    PartDescriptor::new(t(name)).exports_self()
}

fn basket(import: ImportDefinition) -> PartDescriptor {
    part("Fruit.Basket").import(import)
}

fn satisfying_types(config: &CompositionConfiguration, part: &str, import: usize) -> Vec<String> {
    let part_type: TypeRef = part.parse().unwrap();
    let composed = config.find_part(&part_type).unwrap();
    composed.satisfying[import]
        .iter()
        .map(|r| config.parts()[r.part].part_type().to_string())
        .collect()
}

// ============================================================================
// Cardinality
// ============================================================================

#[test]
fn test_exactly_one_missing_and_ambiguous_are_distinct() {
    let import = || ImportDefinition::exactly_one("fruit", t("Fruit.IFruit"));

    let missing = resolve(vec![basket(import())]);
    assert!(matches!(
        missing.errors(),
        [CompositionError::MissingImport { part, import, .. }]
            if part == "Fruit.Basket" && import == "fruit"
    ));

    let ambiguous = resolve(vec![basket(import()), part("Fruit.Apple"), part("Fruit.Pear")]);
    match ambiguous.errors() {
        [CompositionError::AmbiguousImport { candidates, .. }] => {
            assert_eq!(candidates, &["Fruit.Apple", "Fruit.Pear"]);
        }
        other => panic!("expected one ambiguity, got {:?}", other),
    }
    assert_eq!(ambiguous.rejected_parts().len(), 1);
    assert!(ambiguous.find_part(&t("Fruit.Basket")).is_none());

    let single = resolve(vec![basket(import()), part("Fruit.Apple")]);
    assert!(single.is_valid());
    assert_eq!(satisfying_types(&single, "Fruit.Basket", 0), ["Fruit.Apple"]);
}

#[test]
fn test_zero_or_one() {
    let import = || ImportDefinition::zero_or_one("fruit", t("Fruit.IFruit"));

    let none = resolve(vec![basket(import())]);
    assert!(none.is_valid());
    assert!(satisfying_types(&none, "Fruit.Basket", 0).is_empty());

    let two = resolve(vec![basket(import()), part("Fruit.Apple"), part("Fruit.Pear")]);
    assert!(matches!(two.errors(), [CompositionError::AmbiguousImport { .. }]));
}

#[test]
fn test_zero_or_more_collects_all_in_order() {
    let config = resolve(vec![
        part("Fruit.Pear"),
        basket(ImportDefinition::zero_or_more("fruit", t("Fruit.IFruit"))),
        part("Fruit.Apple"),
        part("Rock"),
    ]);
    assert!(config.is_valid());
    assert_eq!(
        satisfying_types(&config, "Fruit.Basket", 0),
        ["Fruit.Pear", "Fruit.Apple"]
    );
}

#[test]
fn test_unsatisfiable_candidate_does_not_cause_ambiguity() {
    let config = resolve(vec![
        basket(ImportDefinition::exactly_one("fruit", t("Fruit.IFruit"))),
        part("Fruit.Apple"),
        part("Fruit.Pear").import(ImportDefinition::exactly_one("seed", t("Fruit.Seed"))),
    ]);
    assert_eq!(config.errors().len(), 1);
    assert!(matches!(
        &config.errors()[0],
        CompositionError::MissingImport { part, .. } if part == "Fruit.Pear"
    ));
    assert_eq!(satisfying_types(&config, "Fruit.Basket", 0), ["Fruit.Apple"]);
}

// ============================================================================
// Contracts, metadata and namespaces
// ============================================================================

#[test]
fn test_same_short_name_in_different_namespaces() {
    let config = resolve(vec![
        part("Fruit.Apple"),
        part("Computers.Apple"),
        basket(ImportDefinition::exactly_one("apple", t("Fruit.Apple"))),
    ]);
    assert!(config.is_valid());
    assert_eq!(config.parts().len(), 3);
    assert_eq!(satisfying_types(&config, "Fruit.Basket", 0), ["Fruit.Apple"]);
}

#[test]
fn test_contract_names_partition_exports() {
    let config = resolve(vec![
        PartDescriptor::new(t("Settings"))
            .export(ExportDefinition::of(t("Settings")).named("config")),
        part("Plain").import(ImportDefinition::zero_or_more("all", t("Settings"))),
        part("Dynamic").import(ImportDefinition::dynamic(
            "settings",
            "config",
            Cardinality::ExactlyOne,
        )),
        part("Typed").import(
            ImportDefinition::exactly_one("settings", t("Settings")).named("config"),
        ),
    ]);
    assert!(config.is_valid(), "{:?}", config.errors());
    assert!(satisfying_types(&config, "Plain", 0).is_empty());
    assert_eq!(satisfying_types(&config, "Dynamic", 0), ["Settings"]);
    assert_eq!(satisfying_types(&config, "Typed", 0), ["Settings"]);
}

#[test]
fn test_dynamic_import_ignores_type() {
    let config = resolve(vec![
        PartDescriptor::new(t("Rock")).export(ExportDefinition::of(t("Rock")).named("thing")),
        part("Collector").import(ImportDefinition::dynamic(
            "things",
            "thing",
            Cardinality::ZeroOrMore,
        )),
        part("Picky").import(ImportDefinition::zero_or_one("thing", t("Fruit.IFruit")).named("thing")),
    ]);
    assert!(config.is_valid());
    assert_eq!(satisfying_types(&config, "Collector", 0), ["Rock"]);
    assert!(satisfying_types(&config, "Picky", 0).is_empty());
}

#[test]
fn test_required_metadata_filters_candidates() {
    let config = resolve(vec![
        PartDescriptor::new(t("Fruit.Apple"))
            .export(ExportDefinition::of(t("Fruit.Apple")).with_metadata("Color", "red")),
        PartDescriptor::new(t("Fruit.Pear"))
            .export(ExportDefinition::of(t("Fruit.Pear")).with_metadata("Color", "green")),
        basket(ImportDefinition::exactly_one("red", t("Fruit.IFruit")).requiring("Color", "red")),
    ]);
    assert!(config.is_valid());
    assert_eq!(satisfying_types(&config, "Fruit.Basket", 0), ["Fruit.Apple"]);
}

#[test]
fn test_metadata_view_filters_and_unknown_view_is_an_error() {
    let view = t("Views.INamed");
    let catalog = Catalog::create(vec![
        PartDescriptor::new(t("Fruit.Apple"))
            .export(ExportDefinition::of(t("Fruit.Apple")).with_metadata("Name", "apple")),
        part("Fruit.Pear"),
        basket(
            ImportDefinition::zero_or_more("named", t("Fruit.IFruit"))
                .with_metadata_view(view.clone()),
        ),
        part("Fruit.Crate").import(
            ImportDefinition::zero_or_more("fruit", t("Fruit.IFruit"))
                .with_metadata_view(t("Views.IUnknown")),
        ),
    ])
    .unwrap()
    .with_metadata_view(MetadataViewDefinition::new(view).required("Name"))
    .unwrap();

    let config = CompositionConfiguration::create(&catalog, &fruit_types());
    assert_eq!(satisfying_types(&config, "Fruit.Basket", 0), ["Fruit.Apple"]);
    assert!(matches!(
        config.errors(),
        [CompositionError::UnknownMetadataView { part, view, .. }]
            if part == "Fruit.Crate" && view == "Views.IUnknown"
    ));
}

#[test]
fn test_conflicting_descriptors_reject_the_part() {
    let config = resolve(vec![
        PartDescriptor::new(t("Fruit.Apple"))
            .export(ExportDefinition::of(t("Fruit.Apple")).with_metadata("Color", "red")),
        PartDescriptor::new(t("Fruit.Apple"))
            .export(ExportDefinition::of(t("Fruit.Apple")).with_metadata("Color", "green")),
        basket(ImportDefinition::exactly_one("apple", t("Fruit.Apple"))),
    ]);
    let errors = config.errors();
    assert!(matches!(
        &errors[0],
        CompositionError::ConflictingDescriptor { part, differences }
            if part == "Fruit.Apple" && differences == &["export metadata"]
    ));
    assert!(matches!(
        &errors[1],
        CompositionError::MissingImport { rejected_candidates, .. }
            if rejected_candidates == &["Fruit.Apple"]
    ));
    assert!(config.parts().is_empty());
}

// ============================================================================
// Generics
// ============================================================================

#[test]
fn test_closed_generic_does_not_satisfy_other_argument() {
    let config = resolve(vec![
        PartDescriptor::new(tree(t("Fruit.Apple"))).exports_self(),
        part("Orchard").import(ImportDefinition::exactly_one("tree", tree(t("Fruit.Pear")))),
    ]);
    assert!(matches!(
        config.errors(),
        [CompositionError::MissingImport { contract, .. }] if contract == "Fruit.Tree<Fruit.Pear>"
    ));
}

#[test]
fn test_open_generic_closes_over_requested_argument() {
    let open_tree = PartDescriptor::new(tree(TypeRef::param("T")))
        .with_param(GenericParam::new("T").constrained_to(t("Fruit.IFruit")))
        .exports_self()
        .import(ImportDefinition::zero_or_more("fruit", TypeRef::param("T")));
    let config = resolve(vec![
        open_tree,
        part("Fruit.Apple"),
        part("Orchard")
            .import(ImportDefinition::exactly_one("apples", tree(t("Fruit.Apple"))))
            .import(ImportDefinition::zero_or_one("rocks", tree(t("Rock")))),
    ]);
    assert!(config.is_valid(), "{:?}", config.errors());
    assert_eq!(config.closure_count(), 1);

    let closed = config.find_part(&tree(t("Fruit.Apple"))).unwrap();
    assert_eq!(closed.descriptor.activator_key(), "Fruit.Tree");
    assert_eq!(satisfying_types(&config, "Orchard", 0), ["Fruit.Tree<Fruit.Apple>"]);
    assert!(satisfying_types(&config, "Orchard", 1).is_empty());
    assert_eq!(
        satisfying_types(&config, "Fruit.Tree<Fruit.Apple>", 0),
        ["Fruit.Apple"]
    );
}

#[test]
fn test_root_demand_closes_unimported_generic() {
    let catalog = Catalog::create(vec![PartDescriptor::new(tree(TypeRef::param("T")))
        .with_param(GenericParam::new("T"))
        .exports_self()])
    .unwrap();
    let types = fruit_types();

    let plain = CompositionConfiguration::create(&catalog, &types);
    assert_eq!(plain.closure_count(), 0);
    assert!(plain.parts().is_empty());

    let options = ResolverOptions::new().demand(tree(t("Fruit.Pear")));
    let demanded = CompositionConfiguration::create_with(&catalog, &types, &options);
    assert!(demanded.find_part(&tree(t("Fruit.Pear"))).is_some());
}

#[test]
fn test_runaway_closure_hits_limit() {
    let node = |arg: TypeRef| TypeRef::generic("Node", [arg]);
    let catalog = Catalog::create(vec![PartDescriptor::new(node(TypeRef::param("T")))
        .with_param(GenericParam::new("T"))
        .exports_self()
        .import(ImportDefinition::exactly_one(
            "next",
            node(TypeRef::generic("Wrap", [TypeRef::param("T")])),
        ))])
    .unwrap();
    let options = ResolverOptions::new().demand(node(t("Leaf"))).closure_limit(4);
    let config = CompositionConfiguration::create_with(&catalog, &TypeRegistry::new(), &options);

    assert_eq!(config.closure_count(), 4);
    assert!(config
        .errors()
        .iter()
        .any(|e| matches!(e, CompositionError::ClosureLimitExceeded { .. })));
    assert!(config.parts().is_empty());
    assert_eq!(config.rejected_parts().len(), 4);
}

// ============================================================================
// Rejection cascade
// ============================================================================

#[test]
fn test_rejection_cascades_to_dependents() {
    let config = resolve(vec![
        part("A").import(ImportDefinition::exactly_one("b", t("B"))),
        part("B").import(ImportDefinition::exactly_one("c", t("C"))),
        part("D").import(ImportDefinition::zero_or_more("bs", t("B"))),
    ]);
    let errors = config.errors();
    assert_eq!(errors.len(), 2);
    assert!(matches!(
        &errors[0],
        CompositionError::MissingImport { part, rejected_candidates, .. }
            if part == "B" && rejected_candidates.is_empty()
    ));
    assert!(matches!(
        &errors[1],
        CompositionError::MissingImport { part, rejected_candidates, .. }
            if part == "A" && rejected_candidates == &["B"]
    ));
    assert!(satisfying_types(&config, "D", 0).is_empty());

    assert!(matches!(config.to_runtime(), Err(ResolveError::Configuration(f)) if f.errors.len() == 2));
    let runtime = config.to_runtime_ignoring_errors().unwrap();
    assert_eq!(runtime.parts().len(), 1);
    assert_eq!(runtime.parts()[0].part_type, t("D"));
}

#[test]
fn test_long_eager_chain_resolves() {
    const LEN: usize = 4000;
    let link = |i: usize| t(&format!("Chain.Link{}", i));
    let parts: Vec<PartDescriptor> = (0..LEN)
        .map(|i| {
            let descriptor = PartDescriptor::new(link(i)).exports_self();
            if i + 1 < LEN {
                descriptor.import(ImportDefinition::exactly_one("next", link(i + 1)))
            } else {
                descriptor
            }
        })
        .collect();

    let config = resolve(parts);
    assert!(config.is_valid(), "{:?}", config.errors());
    assert_eq!(config.parts().len(), LEN);
    assert_eq!(satisfying_types(&config, "Chain.Link0", 0), ["Chain.Link1"]);
    assert_eq!(
        satisfying_types(&config, &format!("Chain.Link{}", LEN - 2), 0),
        [format!("Chain.Link{}", LEN - 1)]
    );
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_eager_cycle_is_rejected() {
    let config = resolve(vec![
        part("A").import(ImportDefinition::exactly_one("b", t("B"))),
        part("B").import(ImportDefinition::exactly_one("a", t("A"))),
        part("C").import(ImportDefinition::zero_or_one("a", t("A"))),
    ]);
    assert!(matches!(
        &config.errors()[0],
        CompositionError::UnsupportedCycle { parts } if parts == &["A", "B"]
    ));
    assert_eq!(config.errors().len(), 1);
    assert_eq!(config.parts().len(), 1);
}

#[test]
fn test_cycle_through_lazy_import_is_allowed() {
    let config = resolve(vec![
        part("A").shared().import(ImportDefinition::exactly_one("b", t("B")).lazy()),
        part("B").shared().import(ImportDefinition::exactly_one("a", t("A"))),
    ]);
    assert!(config.is_valid(), "{:?}", config.errors());
    assert_eq!(satisfying_types(&config, "A", 0), ["B"]);
    assert_eq!(satisfying_types(&config, "B", 0), ["A"]);
}

#[test]
fn test_eager_self_import_is_a_cycle() {
    let config = resolve(vec![
        part("Chain").import(ImportDefinition::zero_or_more("links", t("Chain")))
    ]);
    assert!(matches!(
        config.errors(),
        [CompositionError::UnsupportedCycle { parts }] if parts == &["Chain"]
    ));
}

// ============================================================================
// Sharing boundaries
// ============================================================================

#[test]
fn test_factory_introduces_boundary() {
    let config = resolve(vec![
        part("Server")
            .shared()
            .import(ImportDefinition::exactly_one("handlers", t("Handler")).factory(["Request"])),
        part("Handler")
            .shared_within("Request")
            .import(ImportDefinition::exactly_one("session", t("Session"))),
        part("Session").shared_within("Request"),
    ]);
    assert!(config.is_valid(), "{:?}", config.errors());
    assert!(config.find_part(&t("Server")).unwrap().required_boundaries.is_empty());
    assert_eq!(
        config
            .find_part(&t("Session"))
            .unwrap()
            .required_boundaries
            .iter()
            .collect::<Vec<_>>(),
        ["Request"]
    );

    let runtime = config.to_runtime().unwrap();
    let handler = runtime.find_part(&t("Handler")).unwrap();
    assert!(runtime.parts()[handler].required_boundaries.contains("Request"));
}

#[test]
fn test_boundary_without_factory_is_inconsistent() {
    let config = resolve(vec![
        part("Cache")
            .shared()
            .import(ImportDefinition::exactly_one("session", t("Session"))),
        part("Session").shared_within("Request"),
    ]);
    assert!(!config.is_valid());
    assert!(config.errors().iter().all(|e| matches!(
        e,
        CompositionError::InconsistentSharingBoundary { .. }
    )));
    assert!(config.errors().iter().any(|e| matches!(
        e,
        CompositionError::InconsistentSharingBoundary { part, reason }
            if part == "Cache" && reason.contains("shared at the root")
    )));
    assert!(config.parts().is_empty());
}

#[test]
fn test_declared_boundary_requirement_propagates() {
    let config = resolve(vec![
        part("Host")
            .shared()
            .import(ImportDefinition::zero_or_more("jobs", t("Job")).factory(["Job"])),
        part("Job").requires_boundary("Job"),
        part("Audit").shared().import(ImportDefinition::zero_or_more("jobs", t("Job"))),
    ]);
    assert!(config.find_part(&t("Host")).is_some());
    assert!(config.find_part(&t("Job")).is_some());
    assert!(config.find_part(&t("Audit")).is_none());
    assert!(matches!(
        config.errors(),
        [CompositionError::InconsistentSharingBoundary { part, .. }] if part == "Audit"
    ));
}

// ============================================================================
// Runtime conversion
// ============================================================================

#[test]
fn test_resolution_is_deterministic() {
    let build = || {
        resolve(vec![
            part("Fruit.Apple").shared(),
            part("Fruit.Pear"),
            basket(ImportDefinition::zero_or_more("fruit", t("Fruit.IFruit")).lazy()),
        ])
        .to_runtime()
        .unwrap()
    };
    assert_eq!(build(), build());
}
