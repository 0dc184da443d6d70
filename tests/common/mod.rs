//! Shared fixtures for the root integration tests.

#![allow(dead_code)]

use mosaic::{
    Catalog, ImportDefinition, PartDescriptor, PartInstance, Resolver, TypeDefinition, TypeRef,
    TypeRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static INIT_TRACING: Once = Once::new();

/// Route library logs to the test harness
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

pub fn t(name: &str) -> TypeRef {
    TypeRef::named(name)
}

#[derive(Debug)]
pub struct Clock {
    pub id: usize,
}

#[derive(Debug)]
pub struct Greeter {
    pub clock: Arc<Clock>,
}

pub fn types() -> TypeRegistry {
    TypeRegistry::new().with(TypeDefinition::new("App.Clock").with_base(t("App.ITimeSource")))
}

pub fn clock() -> PartDescriptor {
    PartDescriptor::new(t("App.Clock")).exports_self().shared()
}

pub fn greeter() -> PartDescriptor {
    PartDescriptor::new(t("App.Greeter"))
        .exports_self()
        .import(ImportDefinition::exactly_one("clock", t("App.ITimeSource")))
}

/// Imports a contract nothing exports
pub fn broken() -> PartDescriptor {
    PartDescriptor::new(t("App.Broken"))
        .exports_self()
        .import(ImportDefinition::exactly_one("missing", t("App.Missing")))
}

pub fn catalog(parts: Vec<PartDescriptor>) -> Catalog {
    Catalog::create(parts).unwrap()
}

/// Resolver for the fixture parts; `clocks` counts clock activations
pub fn resolver(clocks: Arc<AtomicUsize>) -> Resolver {
    Resolver::new(types())
        .with_activator("App.Clock", move |_| {
            Ok(PartInstance::new(Clock {
                id: clocks.fetch_add(1, Ordering::SeqCst),
            }))
        })
        .with_activator("App.Greeter", |ctx| {
            Ok(PartInstance::new(Greeter {
                clock: ctx.get("clock")?,
            }))
        })
        .with_activator("App.Broken", |_| Ok(PartInstance::new(())))
}
