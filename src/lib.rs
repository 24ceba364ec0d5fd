//! LIBRA application library
//!
//! The reviews, statistics, and gateway modules plus the bootstrap that wires
//! them onto a document store and the HTTP server.

use std::sync::Arc;

use anyhow::Context;
use libra_db::{DocumentStore, MemoryStore};
use libra_kernel::{
    settings::{DatabaseSettings, Settings, StoreBackend},
    InitCtx, ModuleRegistry,
};

pub mod modules;
pub mod upstream;
pub mod utils;

/// Open the configured document store
pub async fn connect_store(settings: &DatabaseSettings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "mongo")]
        StoreBackend::Mongo => {
            let store = libra_db::MongoStore::connect(&settings.uri, &settings.name)
                .await
                .with_context(|| format!("failed to connect to MongoDB at {}", settings.uri))?;
            tracing::info!(database = %settings.name, "connected to MongoDB");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo"))]
        StoreBackend::Mongo => anyhow::bail!(
            "database.backend is 'mongo' but this build lacks the `mongo` feature"
        ),
    }
}

/// Build a registry holding `enabled` modules, or the configured ones
pub fn build_registry(
    settings: &Settings,
    store: &Arc<dyn DocumentStore>,
    enabled: Option<&[String]>,
) -> anyhow::Result<ModuleRegistry> {
    let enabled = enabled.unwrap_or(settings.modules.enabled.as_slice());
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings, store, enabled)?;
    Ok(registry)
}

/// Serve the selected modules until interrupted
pub async fn run(settings: Settings, enabled: Option<&[String]>) -> anyhow::Result<()> {
    let store = connect_store(&settings.database).await?;
    let registry = build_registry(&settings, &store, enabled)?;

    tracing::info!(
        env = ?settings.environment,
        store = store.backend(),
        modules = registry.module_count(),
        "libra bootstrap starting"
    );

    registry
        .apply_indexes(&store)
        .await
        .context("failed to create indexes")?;

    let ctx = InitCtx {
        settings: &settings,
        store: &store,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = libra_http::start_server(&registry, &settings).await;
    registry.stop_modules().await?;
    served
}
