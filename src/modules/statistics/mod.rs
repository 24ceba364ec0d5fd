pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use libra_db::{DocumentStore, IndexSpec, TypedCollection};
use libra_http::docs::{envelope, schema_ref, Operation};
use libra_kernel::{settings::StatisticsSettings, InitCtx, Module};
use serde_json::json;

use service::StatisticsService;

/// Yearly reading goals and read-book history
pub struct StatisticsModule {
    collection: String,
    service: Arc<StatisticsService>,
}

impl StatisticsModule {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &StatisticsSettings) -> Self {
        let service = StatisticsService::new(
            TypedCollection::new(store.clone(), settings.collection.as_str()),
            TypedCollection::new(store, settings.collection.as_str()),
        );
        Self {
            collection: settings.collection.clone(),
            service: Arc::new(service),
        }
    }
}

#[async_trait]
impl Module for StatisticsModule {
    fn name(&self) -> &'static str {
        "statistics"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            collection = %self.collection,
            store = ctx.store.backend(),
            "statistics module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        vec![
            IndexSpec::unique(
                self.collection.as_str(),
                "goal_user_year",
                "userGoal",
                &["userId", "year"],
            ),
            IndexSpec::unique(
                self.collection.as_str(),
                "read_book_user_book",
                "readBooks",
                &["userId", "book.bookId"],
            ),
        ]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "statistics module stopped");
        Ok(())
    }
}

fn openapi() -> serde_json::Value {
    const TAG: &str = "Statistics";
    let goal = || envelope(schema_ref("Goal"));
    let bad = (400, "Bad request");
    let missing = (404, "Goal not found");
    let forbidden = (403, "Goal belongs to a different user");

    json!({
        "paths": {
            "/goals": {
                "post": Operation::new("Create this year's reading goal", TAG)
                    .body(schema_ref("NewGoal"))
                    .success(201, "Goal created", goal())
                    .errors(&[bad, (409, "Goal for this user and year already exists")])
                    .build()
            },
            "/readBooks": {
                "post": Operation::new("Log a finished book", TAG)
                    .body(schema_ref("NewReadBook"))
                    .success(201, "Read book logged", envelope(schema_ref("ReadBook")))
                    .errors(&[
                        bad,
                        forbidden,
                        (404, "Source goal not found"),
                        (409, "Read book already logged"),
                    ])
                    .build()
            },
            "/goals/{id}": {
                "delete": Operation::new("Delete goal", TAG)
                    .path_param("id")
                    .success(200, "Goal deleted", envelope(json!({})))
                    .errors(&[bad, missing])
                    .build()
            },
            "/goals/{id}/targetBooks": {
                "put": Operation::new("Change goal target", TAG)
                    .path_param("id")
                    .body(schema_ref("TargetUpdate"))
                    .success(200, "Goal updated", goal())
                    .errors(&[bad, missing])
                    .build()
            },
            "/goals/{id}/books": {
                "put": Operation::new("Add a book to a goal", TAG)
                    .path_param("id")
                    .body(schema_ref("AddBook"))
                    .success(200, "Book added", goal())
                    .errors(&[bad, forbidden, missing, (409, "Book already added to this goal")])
                    .build(),
                "delete": Operation::new("Remove a book from a goal", TAG)
                    .path_param("id")
                    .body(schema_ref("RemoveBook"))
                    .success(200, "Book removed", goal())
                    .errors(&[bad, forbidden, (404, "Goal or book not found")])
                    .build()
            },
            "/goals/{id}/pages": {
                "get": Operation::new("Total pages across a goal's books", TAG)
                    .path_param("id")
                    .success(200, "Total pages", envelope(json!({
                        "type": "object",
                        "properties": { "totalPages": { "type": "integer" } }
                    })))
                    .errors(&[bad, missing])
                    .build()
            },
            "/goals/{id}/genres": {
                "get": Operation::new(
                    "Genre distribution of the current year's goal (id is the user id)",
                    TAG,
                )
                    .path_param("id")
                    .success(200, "Percentage per genre", envelope(json!({
                        "type": "object",
                        "properties": {
                            "distribution": {
                                "type": "object",
                                "additionalProperties": { "type": "number" }
                            }
                        }
                    })))
                    .errors(&[(404, "No goal this year or no genre data")])
                    .build()
            },
            "/goals/user/{user_id}": {
                "get": Operation::new("The user's most recent goal", TAG)
                    .path_param("user_id")
                    .success(200, "Goal", goal())
                    .errors(&[(404, "Goal not found for this user")])
                    .build()
            }
        },
        "components": {
            "schemas": {
                "BookRef": {
                    "type": "object",
                    "properties": {
                        "bookId": { "type": "string" },
                        "title": { "type": "string" },
                        "finishedAt": { "type": "string", "format": "date-time", "nullable": true },
                        "genre": {
                            "type": "array",
                            "items": { "type": "string" },
                            "nullable": true
                        },
                        "pages": { "type": "integer", "minimum": 0, "nullable": true }
                    },
                    "required": ["bookId", "title"]
                },
                "Goal": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "userId": { "type": "string" },
                        "year": { "type": "integer" },
                        "targetBooks": { "type": "integer" },
                        "books": { "type": "array", "items": schema_ref("BookRef") },
                        "completedBooks": { "type": "integer" },
                        "createdAt": { "type": "string", "format": "date-time" }
                    },
                    "required": [
                        "id", "userId", "year", "targetBooks",
                        "books", "completedBooks", "createdAt"
                    ]
                },
                "ReadBook": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "userId": { "type": "string" },
                        "book": schema_ref("BookRef"),
                        "fromGoalId": { "type": "string", "nullable": true },
                        "createdAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "userId", "book", "createdAt"]
                },
                "NewGoal": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string", "minLength": 1 },
                        "targetBooks": { "type": "integer", "minimum": 1 }
                    },
                    "required": ["userId", "targetBooks"]
                },
                "TargetUpdate": {
                    "type": "object",
                    "properties": { "targetBooks": { "type": "integer", "minimum": 1 } },
                    "required": ["targetBooks"]
                },
                "AddBook": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string", "minLength": 1 },
                        "book": schema_ref("BookRef")
                    },
                    "required": ["userId", "book"]
                },
                "RemoveBook": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string", "minLength": 1 },
                        "bookId": { "type": "string", "minLength": 1 }
                    },
                    "required": ["userId", "bookId"]
                },
                "NewReadBook": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string", "minLength": 1 },
                        "book": schema_ref("BookRef"),
                        "fromGoalId": { "type": "string" }
                    },
                    "required": ["userId", "book"]
                }
            }
        }
    })
}

/// Create the statistics module backed by `store`
pub fn create_module(
    store: Arc<dyn DocumentStore>,
    settings: &StatisticsSettings,
) -> Arc<dyn Module> {
    Arc::new(StatisticsModule::new(store, settings))
}
