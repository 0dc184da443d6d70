//! Type hierarchy registry
//!
//! The registry is the explicit context the resolver and the container use
//! to answer "can a value of type A stand in for type B". It records, for
//! each type definition, its generic parameters (with constraints) and its
//! base types and interfaces, which may mention the definition's own
//! parameters:
//!
//! ```text
//! Fruit.Tree<$T>   bases: [Fruit.ITree<$T>, Garden.Plant]
//! ```
//!
//! Types the registry has never heard of are assignable only to themselves.

use crate::types::{Bindings, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Base chains deeper than this are treated as cyclic declarations
const MAX_BASE_DEPTH: usize = 32;

/// A generic parameter with its constraints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenericParam {
    /// Parameter name, e.g. `T`
    pub name: String,
    /// Types the bound argument must be assignable to. May mention any
    /// parameter of the same definition.
    #[serde(default)]
    pub constraints: Vec<TypeRef>,
}

impl GenericParam {
    /// Unconstrained parameter
    pub fn new(name: impl Into<String>) -> Self {
        GenericParam {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    /// Add a constraint
    pub fn constrained_to(mut self, constraint: TypeRef) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Declaration of a type: its parameters and what it derives from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Full name
    pub name: String,
    /// Generic parameters in declaration order
    #[serde(default)]
    pub params: Vec<GenericParam>,
    /// Immediate base types and implemented interfaces
    #[serde(default)]
    pub bases: Vec<TypeRef>,
}

impl TypeDefinition {
    /// Definition with no parameters and no bases
    pub fn new(name: impl Into<String>) -> Self {
        TypeDefinition {
            name: name.into(),
            params: Vec::new(),
            bases: Vec::new(),
        }
    }

    /// Add a generic parameter
    pub fn with_param(mut self, param: GenericParam) -> Self {
        self.params.push(param);
        self
    }

    /// Add a base type or interface
    pub fn with_base(mut self, base: TypeRef) -> Self {
        self.bases.push(base);
        self
    }
}

/// Registry of type definitions
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    definitions: HashMap<String, TypeDefinition>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one with the same name
    pub fn register(&mut self, definition: TypeDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, definition: TypeDefinition) -> Self {
        self.register(definition);
        self
    }

    /// Look up a definition
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(name)
    }

    /// Every definition, ordered by name
    pub fn definitions(&self) -> Vec<&TypeDefinition> {
        let mut definitions: Vec<&TypeDefinition> = self.definitions.values().collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no definitions are registered
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Immediate bases of `ty`, with the definition's parameters replaced by
    /// the arguments `ty` applies.
    pub fn bases_of(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let TypeRef::Named { name, args } = ty else {
            return Vec::new();
        };
        let Some(def) = self.definitions.get(name) else {
            return Vec::new();
        };
        let bindings: Bindings = def
            .params
            .iter()
            .zip(args)
            .map(|(p, a)| (p.name.clone(), a.clone()))
            .collect();
        def.bases.iter().map(|b| b.substitute(&bindings)).collect()
    }

    /// Whether a value of type `from` can be used where `to` is expected
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        let mut bindings = Bindings::new();
        self.bind_at(from, to, &mut bindings, 0)
    }

    /// Bind the parameters of `pattern` so that it becomes assignable to
    /// `target`, walking the pattern's base types when the pattern itself
    /// does not match. On success `bindings` is extended; on failure it is
    /// left untouched.
    pub fn bind(&self, pattern: &TypeRef, target: &TypeRef, bindings: &mut Bindings) -> bool {
        self.bind_at(pattern, target, bindings, 0)
    }

    fn bind_at(
        &self,
        pattern: &TypeRef,
        target: &TypeRef,
        bindings: &mut Bindings,
        depth: usize,
    ) -> bool {
        let mut trial = bindings.clone();
        if pattern.unify(target, &mut trial) {
            *bindings = trial;
            return true;
        }
        if depth >= MAX_BASE_DEPTH {
            return false;
        }
        for base in self.bases_of(pattern) {
            let mut trial = bindings.clone();
            if self.bind_at(&base, target, &mut trial, depth + 1) {
                *bindings = trial;
                return true;
            }
        }
        false
    }

    /// Check that every parameter is bound and that each bound argument
    /// satisfies all of the parameter's constraints.
    pub fn satisfies(&self, params: &[GenericParam], bindings: &Bindings) -> bool {
        params.iter().all(|param| {
            let Some(arg) = bindings.get(&param.name) else {
                return false;
            };
            param
                .constraints
                .iter()
                .all(|c| self.is_assignable(arg, &c.substitute(bindings)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(n: &str) -> TypeRef {
        TypeRef::named(n)
    }

    fn orchard() -> TypeRegistry {
        TypeRegistry::new()
            .with(TypeDefinition::new("Fruit.IFruit"))
            .with(TypeDefinition::new("Fruit.Apple").with_base(named("Fruit.IFruit")))
            .with(TypeDefinition::new("Fruit.Pear").with_base(named("Fruit.IFruit")))
            .with(
                TypeDefinition::new("Fruit.Tree")
                    .with_param(GenericParam::new("T"))
                    .with_base(TypeRef::generic("Fruit.ITree", [TypeRef::param("T")]))
                    .with_base(named("Garden.Plant")),
            )
            .with(TypeDefinition::new("Fruit.ITree").with_param(GenericParam::new("T")))
    }

    #[test]
    fn test_assignable_to_self_and_bases() {
        let reg = orchard();
        assert!(reg.is_assignable(&named("Fruit.Apple"), &named("Fruit.Apple")));
        assert!(reg.is_assignable(&named("Fruit.Apple"), &named("Fruit.IFruit")));
        assert!(!reg.is_assignable(&named("Fruit.IFruit"), &named("Fruit.Apple")));
        assert!(!reg.is_assignable(&named("Fruit.Apple"), &named("Fruit.Pear")));
    }

    #[test]
    fn test_unknown_types_only_match_themselves() {
        let reg = TypeRegistry::new();
        assert!(reg.is_assignable(&named("X"), &named("X")));
        assert!(!reg.is_assignable(&named("X"), &named("Y")));
    }

    #[test]
    fn test_definitions_are_name_ordered() {
        let reg = TypeRegistry::new()
            .with(TypeDefinition::new("Zebra"))
            .with(TypeDefinition::new("Aardvark"));
        let names: Vec<&str> = reg.definitions().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Aardvark", "Zebra"]);
    }

    #[test]
    fn test_generic_bases_are_substituted() {
        let reg = orchard();
        let apple_tree = TypeRef::generic("Fruit.Tree", [named("Fruit.Apple")]);
        assert_eq!(
            reg.bases_of(&apple_tree),
            vec![
                TypeRef::generic("Fruit.ITree", [named("Fruit.Apple")]),
                named("Garden.Plant"),
            ]
        );
        assert!(reg.is_assignable(
            &apple_tree,
            &TypeRef::generic("Fruit.ITree", [named("Fruit.Apple")])
        ));
        assert!(!reg.is_assignable(
            &apple_tree,
            &TypeRef::generic("Fruit.ITree", [named("Fruit.Pear")])
        ));
    }

    #[test]
    fn test_bind_through_base() {
        let reg = orchard();
        let pattern = TypeRef::generic("Fruit.Tree", [TypeRef::param("X")]);
        let mut bindings = Bindings::new();
        assert!(reg.bind(
            &pattern,
            &TypeRef::generic("Fruit.ITree", [named("Fruit.Pear")]),
            &mut bindings
        ));
        assert_eq!(bindings.get("X"), Some(&named("Fruit.Pear")));
    }

    #[test]
    fn test_failed_bind_leaves_bindings_untouched() {
        let reg = orchard();
        let pattern = TypeRef::generic("Fruit.Tree", [TypeRef::param("X")]);
        let mut bindings = Bindings::new();
        bindings.insert("X".to_string(), named("Fruit.Apple"));
        assert!(!reg.bind(
            &pattern,
            &TypeRef::generic("Fruit.Tree", [named("Fruit.Pear")]),
            &mut bindings
        ));
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("X"), Some(&named("Fruit.Apple")));
    }

    #[test]
    fn test_constraints() {
        let reg = orchard();
        let params = vec![GenericParam::new("T").constrained_to(named("Fruit.IFruit"))];

        let mut ok = Bindings::new();
        ok.insert("T".to_string(), named("Fruit.Apple"));
        assert!(reg.satisfies(&params, &ok));

        let mut bad = Bindings::new();
        bad.insert("T".to_string(), named("Garden.Plant"));
        assert!(!reg.satisfies(&params, &bad));

        assert!(!reg.satisfies(&params, &Bindings::new()));
    }

    #[test]
    fn test_cyclic_bases_terminate() {
        let reg = TypeRegistry::new()
            .with(TypeDefinition::new("A").with_base(named("B")))
            .with(TypeDefinition::new("B").with_base(named("A")));
        assert!(reg.is_assignable(&named("A"), &named("B")));
        assert!(!reg.is_assignable(&named("A"), &named("C")));
    }
}
