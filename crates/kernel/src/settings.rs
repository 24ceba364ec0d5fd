use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "LIBRA_ENV";
const CONFIG_DIR_ENV: &str = "LIBRA_CONFIG_DIR";
const ENV_PREFIX: &str = "LIBRA";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub reviews: ReviewsSettings,
    #[serde(default)]
    pub statistics: StatisticsSettings,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub modules: ModulesSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// and `LIBRA_`-prefixed variables (`__` separates nested keys).
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to repo root `config` directory.
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("modules.enabled")
                    .try_parsing(true),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Which document store backend to connect to.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Mongo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_name() -> String {
        "libra".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            uri: Self::default_uri(),
            name: Self::default_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewsSettings {
    #[serde(default = "ReviewsSettings::default_collection")]
    pub collection: String,
    /// Book-detail provider used to check that a book exists. Unset skips the check.
    #[serde(default)]
    pub books_api_url: Option<String>,
    #[serde(default = "ReviewsSettings::default_books_api_timeout_ms")]
    pub books_api_timeout_ms: u64,
}

impl ReviewsSettings {
    fn default_collection() -> String {
        "reviews".to_string()
    }

    fn default_books_api_timeout_ms() -> u64 {
        5000
    }
}

impl Default for ReviewsSettings {
    fn default() -> Self {
        Self {
            collection: Self::default_collection(),
            books_api_url: None,
            books_api_timeout_ms: Self::default_books_api_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatisticsSettings {
    #[serde(default = "StatisticsSettings::default_collection")]
    pub collection: String,
}

impl StatisticsSettings {
    fn default_collection() -> String {
        "statistics".to_string()
    }
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            collection: Self::default_collection(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "GatewaySettings::default_reviews_url")]
    pub reviews_url: String,
    #[serde(default = "GatewaySettings::default_statistics_url")]
    pub statistics_url: String,
    #[serde(default = "GatewaySettings::default_books_url")]
    pub books_url: String,
    #[serde(default = "GatewaySettings::default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

impl GatewaySettings {
    fn default_reviews_url() -> String {
        "http://127.0.0.1:3002".to_string()
    }

    fn default_statistics_url() -> String {
        "http://127.0.0.1:3004".to_string()
    }

    fn default_books_url() -> String {
        "http://127.0.0.1:3001".to_string()
    }

    fn default_upstream_timeout_ms() -> u64 {
        5000
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            reviews_url: Self::default_reviews_url(),
            statistics_url: Self::default_statistics_url(),
            books_url: Self::default_books_url(),
            upstream_timeout_ms: Self::default_upstream_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=debug".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModulesSettings {
    /// Modules served by this process.
    #[serde(default = "ModulesSettings::default_enabled")]
    pub enabled: Vec<String>,
}

impl ModulesSettings {
    fn default_enabled() -> Vec<String> {
        vec![
            "reviews".to_string(),
            "statistics".to_string(),
            "gateway".to_string(),
        ]
    }
}

impl Default for ModulesSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_store_is_in_memory() {
        let settings = Settings::default();
        assert_eq!(settings.database.backend, StoreBackend::Memory);
        assert_eq!(settings.database.uri, "mongodb://127.0.0.1:27017");
    }

    #[test]
    fn gateway_defaults_to_five_second_upstream_timeout() {
        let settings = Settings::default();
        assert_eq!(settings.gateway.upstream_timeout_ms, 5000);
        assert_eq!(settings.modules.enabled.len(), 3);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "gateway": { "books_url": "http://books:3001" },
            "database": { "backend": "mongo" }
        }))
        .unwrap();
        assert_eq!(settings.gateway.books_url, "http://books:3001");
        assert_eq!(settings.gateway.reviews_url, "http://127.0.0.1:3002");
        assert_eq!(settings.database.backend, StoreBackend::Mongo);
        assert_eq!(settings.database.name, "libra");
    }
}
