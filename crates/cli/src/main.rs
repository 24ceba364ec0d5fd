use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use libra_app::modules::{gateway::GatewayModule, AVAILABLE};
use libra_db::{DocumentStore, MemoryStore};
use libra_kernel::{settings::Settings, ModuleRegistry};

#[derive(Debug, Parser)]
#[command(name = "libra-cli", version, about = "Operate LIBRA services")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve modules over HTTP (defaults to `modules.enabled` from settings)
    Serve {
        /// Module to serve; repeat for several
        #[arg(long = "module", short = 'm')]
        modules: Vec<String>,
    },
    /// Print the merged OpenAPI document of every module
    Openapi,
    /// List the unique indexes modules declare
    Indexes,
    /// Print the gateway's GraphQL schema
    GraphqlSchema,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load LIBRA settings")?;

    match cli.command {
        Command::Serve { modules } => {
            libra_telemetry::init(&settings.telemetry)?;
            let enabled = (!modules.is_empty()).then_some(modules);
            tokio::runtime::Runtime::new()
                .context("failed to start async runtime")?
                .block_on(libra_app::run(settings, enabled.as_deref()))
        }
        Command::Openapi => {
            let registry = offline_registry(&settings)?;
            let spec = libra_http::router::merged_openapi(&registry);
            println!("{}", serde_json::to_string_pretty(&spec)?);
            Ok(())
        }
        Command::Indexes => {
            let registry = offline_registry(&settings)?;
            for (module, index) in registry.collect_indexes() {
                println!(
                    "{module}\t{}\t{}\ttype={}\t({})",
                    index.collection,
                    index.name,
                    index.kind,
                    index.fields.join(", ")
                );
            }
            Ok(())
        }
        Command::GraphqlSchema => {
            let gateway = GatewayModule::new(&settings.gateway)?;
            println!("{}", gateway.schema().sdl());
            Ok(())
        }
    }
}

/// Every module, backed by a throwaway in-memory store.
fn offline_registry(settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let all: Vec<String> = AVAILABLE.iter().map(|name| name.to_string()).collect();
    libra_app::build_registry(settings, &store, Some(&all))
}
