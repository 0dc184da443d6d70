//! Explicit resolution context
//!
//! A [`Resolver`] carries what the runtime needs beyond the composition
//! itself: the type registry used for top-level lookups and the activators
//! that build parts. It is passed to every factory explicitly; there is no
//! process-wide default.

use crate::activation::{ActivationContext, ActivationError, PartActivator, PartInstance};
use mosaic_core::TypeRegistry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type registry plus activators, keyed by part definition name
#[derive(Clone, Default)]
pub struct Resolver {
    types: Arc<TypeRegistry>,
    activators: HashMap<String, Arc<dyn PartActivator>>,
}

impl Resolver {
    /// Resolver over `types` with no activators
    pub fn new(types: TypeRegistry) -> Self {
        Self::with_types(Arc::new(types))
    }

    /// Resolver sharing an existing registry
    pub fn with_types(types: Arc<TypeRegistry>) -> Self {
        Resolver {
            types,
            activators: HashMap::new(),
        }
    }

    /// Register a closure as the activator for `key` (the part definition
    /// name, e.g. `Fruit.Tree` for every closure of `Fruit.Tree<$T>`)
    pub fn register<F>(&mut self, key: impl Into<String>, activator: F)
    where
        F: Fn(&ActivationContext<'_>) -> Result<PartInstance, ActivationError>
            + Send
            + Sync
            + 'static,
    {
        self.activators.insert(key.into(), Arc::new(activator));
    }

    /// Register a shared activator object
    pub fn register_activator(
        &mut self,
        key: impl Into<String>,
        activator: Arc<dyn PartActivator>,
    ) {
        self.activators.insert(key.into(), activator);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_activator<F>(mut self, key: impl Into<String>, activator: F) -> Self
    where
        F: Fn(&ActivationContext<'_>) -> Result<PartInstance, ActivationError>
            + Send
            + Sync
            + 'static,
    {
        self.register(key, activator);
        self
    }

    /// The type registry
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Activator registered under `key`
    pub fn activator(&self, key: &str) -> Option<&Arc<dyn PartActivator>> {
        self.activators.get(key)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.activators.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Resolver")
            .field("types", &self.types.len())
            .field("activators", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let resolver = Resolver::default()
            .with_activator("Fruit.Apple", |_: &ActivationContext<'_>| Ok(PartInstance::new(1u8)));
        assert!(resolver.activator("Fruit.Apple").is_some());
        assert!(resolver.activator("Fruit.Pear").is_none());
        assert!(format!("{:?}", resolver).contains("Fruit.Apple"));
    }
}
