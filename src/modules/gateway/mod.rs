pub mod clients;
pub mod envelope;
pub mod fanout;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use libra_http::docs::Operation;
use libra_kernel::{settings::GatewaySettings, InitCtx, Module};
use serde_json::json;

use clients::GatewayClients;
use schema::{build_schema, GatewaySchema};

/// GraphQL aggregation over the reviews, statistics, and book services
pub struct GatewayModule {
    settings: GatewaySettings,
    schema: GatewaySchema,
}

impl GatewayModule {
    pub fn new(settings: &GatewaySettings) -> anyhow::Result<Self> {
        let clients = Arc::new(GatewayClients::new(settings)?);
        Ok(Self {
            settings: settings.clone(),
            schema: build_schema(clients),
        })
    }

    pub fn schema(&self) -> &GatewaySchema {
        &self.schema
    }
}

#[async_trait]
impl Module for GatewayModule {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            reviews_url = %self.settings.reviews_url,
            statistics_url = %self.settings.statistics_url,
            books_url = %self.settings.books_url,
            timeout_ms = self.settings.upstream_timeout_ms,
            "gateway module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/graphql", post(graphql).get(sdl))
            .with_state(self.schema.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let request = json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "operationName": { "type": "string" },
                "variables": { "type": "object" }
            },
            "required": ["query"]
        });
        let response = json!({
            "type": "object",
            "properties": {
                "data": { "type": "object" },
                "errors": { "type": "array", "items": { "type": "object" } }
            }
        });

        let mut get = Operation::new("GraphQL schema (SDL)", "Gateway").build();
        get["responses"] = json!({
            "200": {
                "description": "Schema definition",
                "content": { "text/plain": { "schema": { "type": "string" } } }
            }
        });

        Some(json!({
            "paths": {
                "/graphql": {
                    "post": Operation::new("Execute a GraphQL query", "Gateway")
                        .body(request)
                        .success(200, "GraphQL response", response)
                        .build(),
                    "get": get
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "gateway module stopped");
        Ok(())
    }
}

async fn graphql(
    State(schema): State<GatewaySchema>,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    Json(schema.execute(request).await)
}

async fn sdl(State(schema): State<GatewaySchema>) -> String {
    schema.sdl()
}

/// Create the gateway module
pub fn create_module(settings: &GatewaySettings) -> anyhow::Result<Arc<dyn Module>> {
    Ok(Arc::new(GatewayModule::new(settings)?))
}
