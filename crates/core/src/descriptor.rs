//! Part descriptors
//!
//! A [`PartDescriptor`] is the unit the catalog holds: a part type, what it
//! exports, what it imports, and how its instances are shared. Descriptors
//! are plain data; producing them (scanning, config files, manual
//! registration) is the job of a [`PartDiscovery`](crate::PartDiscovery).
//!
//! Open generic parts declare their parameters in `type_params` and mention
//! them in their part type, exports and imports. The resolver closes them
//! with [`PartDescriptor::close`] once an importer fixes the arguments.

use crate::metadata::{Metadata, MetadataValue};
use crate::registry::GenericParam;
use crate::types::{Bindings, TypeRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How many exports an import accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Exactly one export must match
    ExactlyOne,
    /// Zero or one export may match
    ZeroOrOne,
    /// Any number of exports, including none
    ZeroOrMore,
}

/// How instances of a part are shared
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreationPolicy {
    /// One instance per scope instance of `boundary`; `None` is the root
    Shared {
        /// Sharing boundary name
        boundary: Option<String>,
    },
    /// A fresh instance for every request
    NonShared,
}

impl CreationPolicy {
    /// Shared at the root of the container
    pub fn shared() -> Self {
        CreationPolicy::Shared { boundary: None }
    }

    /// Shared within the named boundary
    pub fn shared_within(boundary: impl Into<String>) -> Self {
        CreationPolicy::Shared {
            boundary: Some(boundary.into()),
        }
    }

    /// Whether instances are shared
    pub fn is_shared(&self) -> bool {
        matches!(self, CreationPolicy::Shared { .. })
    }

    /// The sharing boundary, if shared within one
    pub fn boundary(&self) -> Option<&str> {
        match self {
            CreationPolicy::Shared { boundary } => boundary.as_deref(),
            CreationPolicy::NonShared => None,
        }
    }
}

/// How an import's value is delivered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// Value materialized before the importer is activated
    Eager,
    /// Deferred handle, evaluated on first access
    Lazy,
    /// Factory handle; every invocation opens a child scope that
    /// introduces `sharing_boundaries`
    Factory {
        /// Boundaries the child scope introduces
        sharing_boundaries: Vec<String>,
    },
}

impl ImportKind {
    /// Whether this import defers evaluation (lazy or factory)
    pub fn is_deferred(&self) -> bool {
        !matches!(self, ImportKind::Eager)
    }
}

/// The type requirement of an import
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFilter {
    /// Exports whose contract type is assignable to this type
    Assignable(TypeRef),
    /// Any export with the right contract name, whatever its type
    Any,
}

/// A value a part provides
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportDefinition {
    /// Contract name; `None` is the default contract
    #[serde(default)]
    pub contract_name: Option<String>,
    /// Declared contract type
    pub contract_type: TypeRef,
    /// Export metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Member of the part instance carrying the value; `None` exports the
    /// instance itself
    #[serde(default)]
    pub member: Option<String>,
}

impl ExportDefinition {
    /// Export of `contract_type` under the default contract
    pub fn of(contract_type: TypeRef) -> Self {
        ExportDefinition {
            contract_name: None,
            contract_type,
            metadata: Metadata::new(),
            member: None,
        }
    }

    /// Set the contract name
    pub fn named(mut self, contract_name: impl Into<String>) -> Self {
        self.contract_name = Some(contract_name.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Export a member of the instance instead of the instance
    pub fn from_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    fn substitute(&self, bindings: &Bindings) -> Self {
        ExportDefinition {
            contract_type: self.contract_type.substitute(bindings),
            ..self.clone()
        }
    }
}

/// A dependency a part requires
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportDefinition {
    /// Import slot name, unique within the part
    pub name: String,
    /// Contract name; `None` is the default contract
    #[serde(default)]
    pub contract_name: Option<String>,
    /// Type requirement
    pub type_filter: TypeFilter,
    /// Accepted number of exports
    pub cardinality: Cardinality,
    /// Delivery
    pub kind: ImportKind,
    /// Metadata entries a candidate export must carry with equal values
    #[serde(default)]
    pub required_metadata: Metadata,
    /// Typed metadata view requested by this import
    #[serde(default)]
    pub metadata_view: Option<TypeRef>,
}

impl ImportDefinition {
    fn new(name: impl Into<String>, type_filter: TypeFilter, cardinality: Cardinality) -> Self {
        ImportDefinition {
            name: name.into(),
            contract_name: None,
            type_filter,
            cardinality,
            kind: ImportKind::Eager,
            required_metadata: Metadata::new(),
            metadata_view: None,
        }
    }

    /// Import exactly one export assignable to `ty`
    pub fn exactly_one(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, TypeFilter::Assignable(ty), Cardinality::ExactlyOne)
    }

    /// Import at most one export assignable to `ty`
    pub fn zero_or_one(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, TypeFilter::Assignable(ty), Cardinality::ZeroOrOne)
    }

    /// Import every export assignable to `ty`
    pub fn zero_or_more(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, TypeFilter::Assignable(ty), Cardinality::ZeroOrMore)
    }

    /// Untyped import matching by contract name only
    pub fn dynamic(
        name: impl Into<String>,
        contract_name: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        let mut import = Self::new(name, TypeFilter::Any, cardinality);
        import.contract_name = Some(contract_name.into());
        import
    }

    /// Set the contract name
    pub fn named(mut self, contract_name: impl Into<String>) -> Self {
        self.contract_name = Some(contract_name.into());
        self
    }

    /// Deliver as a deferred handle
    pub fn lazy(mut self) -> Self {
        self.kind = ImportKind::Lazy;
        self
    }

    /// Deliver as a factory whose invocations introduce `boundaries`
    pub fn factory<I, S>(mut self, boundaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = ImportKind::Factory {
            sharing_boundaries: boundaries.into_iter().map(Into::into).collect(),
        };
        self
    }

    /// Require a metadata entry on candidate exports
    pub fn requiring(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.required_metadata.insert(key.into(), value.into());
        self
    }

    /// Request a typed metadata view
    pub fn with_metadata_view(mut self, view_type: TypeRef) -> Self {
        self.metadata_view = Some(view_type);
        self
    }

    /// The type this import asks for, if typed
    pub fn requested_type(&self) -> Option<&TypeRef> {
        match &self.type_filter {
            TypeFilter::Assignable(ty) => Some(ty),
            TypeFilter::Any => None,
        }
    }

    /// Whether an import with this cardinality must be satisfied
    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::ExactlyOne
    }

    /// Boundaries the factory creates, empty for other kinds
    pub fn created_boundaries(&self) -> &[String] {
        match &self.kind {
            ImportKind::Factory { sharing_boundaries } => sharing_boundaries,
            _ => &[],
        }
    }

    fn substitute(&self, bindings: &Bindings) -> Self {
        ImportDefinition {
            type_filter: match &self.type_filter {
                TypeFilter::Assignable(ty) => TypeFilter::Assignable(ty.substitute(bindings)),
                TypeFilter::Any => TypeFilter::Any,
            },
            ..self.clone()
        }
    }
}

/// Descriptor of a part
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartDescriptor {
    /// Identity of the part; also the key of its activator
    pub part_type: TypeRef,
    /// Generic parameters; non-empty for open generic parts
    #[serde(default)]
    pub type_params: Vec<GenericParam>,
    /// Exports
    #[serde(default)]
    pub exports: Vec<ExportDefinition>,
    /// Imports
    #[serde(default)]
    pub imports: Vec<ImportDefinition>,
    /// Sharing
    pub creation_policy: CreationPolicy,
    /// Boundaries the part declares it must be nested within, in addition
    /// to those its dependencies imply
    #[serde(default)]
    pub required_boundaries: Vec<String>,
}

impl PartDescriptor {
    /// A non-shared part with no exports or imports
    pub fn new(part_type: TypeRef) -> Self {
        PartDescriptor {
            part_type,
            type_params: Vec::new(),
            exports: Vec::new(),
            imports: Vec::new(),
            creation_policy: CreationPolicy::NonShared,
            required_boundaries: Vec::new(),
        }
    }

    /// Add a generic parameter
    pub fn with_param(mut self, param: GenericParam) -> Self {
        self.type_params.push(param);
        self
    }

    /// Add an export
    pub fn export(mut self, export: ExportDefinition) -> Self {
        self.exports.push(export);
        self
    }

    /// Export the part under its own type
    pub fn exports_self(self) -> Self {
        let ty = self.part_type.clone();
        self.export(ExportDefinition::of(ty))
    }

    /// Add an import
    pub fn import(mut self, import: ImportDefinition) -> Self {
        self.imports.push(import);
        self
    }

    /// Share at the root
    pub fn shared(mut self) -> Self {
        self.creation_policy = CreationPolicy::shared();
        self
    }

    /// Share within a boundary
    pub fn shared_within(mut self, boundary: impl Into<String>) -> Self {
        self.creation_policy = CreationPolicy::shared_within(boundary);
        self
    }

    /// New instance per request
    pub fn non_shared(mut self) -> Self {
        self.creation_policy = CreationPolicy::NonShared;
        self
    }

    /// Declare a boundary the part must be nested within
    pub fn requires_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.required_boundaries.push(boundary.into());
        self
    }

    /// Whether the part still has unbound generic parameters
    pub fn is_open(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// Key under which the activator for this part is registered: the
    /// definition name, shared by every closure of a generic part
    pub fn activator_key(&self) -> &str {
        self.part_type.name().unwrap_or_default()
    }

    /// Substitute `bindings` everywhere and drop the generic parameters
    pub fn close(&self, bindings: &Bindings) -> PartDescriptor {
        PartDescriptor {
            part_type: self.part_type.substitute(bindings),
            type_params: Vec::new(),
            exports: self.exports.iter().map(|e| e.substitute(bindings)).collect(),
            imports: self.imports.iter().map(|i| i.substitute(bindings)).collect(),
            creation_policy: self.creation_policy.clone(),
            required_boundaries: self.required_boundaries.clone(),
        }
    }

    /// Check structural consistency.
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self) -> Result<(), String> {
        if self.part_type.name().is_none() {
            return Err("part type must be a named type".to_string());
        }

        let mut names = BTreeSet::new();
        for import in &self.imports {
            if !names.insert(import.name.as_str()) {
                return Err(format!("duplicate import '{}'", import.name));
            }
            if let ImportKind::Factory { sharing_boundaries } = &import.kind {
                if sharing_boundaries.iter().any(|b| b.is_empty()) {
                    return Err(format!("import '{}' names an empty boundary", import.name));
                }
            }
        }
        if self.creation_policy.boundary() == Some("") {
            return Err("empty sharing boundary name".to_string());
        }

        let declared: BTreeSet<&str> = self.type_params.iter().map(|p| p.name.as_str()).collect();
        if declared.len() != self.type_params.len() {
            return Err("duplicate generic parameter".to_string());
        }
        let mut mentioned: Vec<&TypeRef> = vec![&self.part_type];
        mentioned.extend(self.exports.iter().map(|e| &e.contract_type));
        mentioned.extend(self.imports.iter().filter_map(|i| i.requested_type()));
        mentioned.extend(self.type_params.iter().flat_map(|p| p.constraints.iter()));
        for ty in mentioned {
            if let Some(p) = ty.params().into_iter().find(|p| !declared.contains(p)) {
                return Err(format!("undeclared generic parameter '{}' in {}", p, ty));
            }
        }

        // Every parameter must be recoverable from whichever export an
        // importer matched, otherwise the closure cannot be determined.
        for export in &self.exports {
            let bound = export.contract_type.params();
            if let Some(p) = declared.iter().find(|p| !bound.contains(*p)) {
                return Err(format!(
                    "export {} does not determine generic parameter '{}'",
                    export.contract_type, p
                ));
            }
        }
        Ok(())
    }
}
