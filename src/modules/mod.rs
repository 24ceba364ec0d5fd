pub mod gateway;
pub mod reviews;
pub mod statistics;

use std::sync::Arc;

use anyhow::bail;
use libra_db::DocumentStore;
use libra_kernel::{settings::Settings, ModuleRegistry};

/// Every module this application knows how to serve.
pub const AVAILABLE: [&str; 3] = ["reviews", "statistics", "gateway"];

/// Register the named modules with the registry, in the order given
pub fn register_all(
    registry: &mut ModuleRegistry,
    settings: &Settings,
    store: &Arc<dyn DocumentStore>,
    enabled: &[String],
) -> anyhow::Result<()> {
    for name in enabled {
        if registry.get_module(name).is_some() {
            continue;
        }
        let module = match name.as_str() {
            "reviews" => reviews::create_module(store.clone(), &settings.reviews)?,
            "statistics" => statistics::create_module(store.clone(), &settings.statistics),
            "gateway" => gateway::create_module(&settings.gateway)?,
            other => bail!(
                "unknown module '{other}'; expected one of {}",
                AVAILABLE.join(", ")
            ),
        };
        registry.register(module);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libra_db::MemoryStore;

    #[test]
    fn registers_requested_modules_once() {
        let settings = Settings::default();
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mut registry = ModuleRegistry::new();

        let enabled: Vec<String> = ["statistics", "reviews", "statistics"]
            .iter()
            .map(|name| name.to_string())
            .collect();
        register_all(&mut registry, &settings, &store, &enabled).unwrap();

        let names: Vec<_> = registry.modules().map(|module| module.name()).collect();
        assert_eq!(names, vec!["statistics", "reviews"]);
        assert_eq!(registry.collect_indexes().len(), 3);
    }

    #[test]
    fn unknown_module_is_an_error() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let err = register_all(
            &mut ModuleRegistry::new(),
            &Settings::default(),
            &store,
            &["books".to_string()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown module 'books'"));
    }
}
