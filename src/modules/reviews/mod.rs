pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use libra_db::{DocumentStore, IndexSpec, TypedCollection};
use libra_http::docs::{envelope, item_list, schema_ref, Operation};
use libra_kernel::{settings::ReviewsSettings, InitCtx, Module};
use serde_json::json;

use crate::upstream::UpstreamClient;
use models::{Comment, Review};
use service::ReviewsService;

/// Reviews and comments on books
pub struct ReviewsModule {
    collection: String,
    service: Arc<ReviewsService>,
}

impl ReviewsModule {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &ReviewsSettings) -> anyhow::Result<Self> {
        let books = settings
            .books_api_url
            .as_deref()
            .map(|url| {
                UpstreamClient::new(url, Duration::from_millis(settings.books_api_timeout_ms))
            })
            .transpose()?;

        let service = ReviewsService::new(
            TypedCollection::new(store.clone(), settings.collection.as_str()),
            TypedCollection::new(store, settings.collection.as_str()),
            books,
        );

        Ok(Self {
            collection: settings.collection.clone(),
            service: Arc::new(service),
        })
    }
}

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "reviews"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            collection = %self.collection,
            store = ctx.store.backend(),
            book_check = ctx.settings.reviews.books_api_url.is_some(),
            "reviews module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        vec![IndexSpec::unique(
            self.collection.as_str(),
            "review_user_book",
            "review",
            &["userId", "bookId"],
        )]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "reviews module stopped");
        Ok(())
    }
}

fn openapi() -> serde_json::Value {
    const TAG: &str = "Reviews";
    let review = || envelope(schema_ref("Review"));
    let comment = || envelope(schema_ref("Comment"));
    let message = || envelope(json!({}));
    let bad = (400, "Bad request");
    let missing = (404, "Not found");
    let forbidden = (403, "Resource belongs to a different user");

    json!({
        "paths": {
            "/reviews": {
                "post": Operation::new("New review from user for a book", TAG)
                    .body(schema_ref("NewReview"))
                    .success(201, "Review created", review())
                    .errors(&[
                        bad,
                        (404, "Book not found"),
                        (409, "Duplicated review"),
                        (502, "Book service unavailable"),
                    ])
                    .build()
            },
            "/comments": {
                "post": Operation::new("New comment on a book", TAG)
                    .body(schema_ref("NewComment"))
                    .success(201, "Comment created", comment())
                    .errors(&[bad])
                    .build()
            },
            "/reviews/{id}": {
                "get": Operation::new("Get review by id", TAG)
                    .path_param("id")
                    .success(200, "Review", review())
                    .errors(&[bad, missing])
                    .build(),
                "delete": Operation::new("Delete review", TAG)
                    .path_param("id")
                    .success(200, "Review deleted", message())
                    .errors(&[bad, missing])
                    .build()
            },
            "/reviews/{id}/text": {
                "put": Operation::new("Update review text", TAG)
                    .path_param("id")
                    .body(schema_ref("ReviewTextUpdate"))
                    .success(200, "Review text updated", review())
                    .errors(&[bad, forbidden, missing])
                    .build()
            },
            "/reviews/{id}/rating": {
                "put": Operation::new("Update review rating", TAG)
                    .path_param("id")
                    .body(schema_ref("RatingUpdate"))
                    .success(200, "Rating updated", review())
                    .errors(&[bad, forbidden, missing])
                    .build()
            },
            "/reviews/{id}/average": {
                "get": Operation::new("Average rating of a book (id is the book id)", TAG)
                    .path_param("id")
                    .success(200, "Average rating", envelope(schema_ref("AverageScore")))
                    .errors(&[(404, "No reviews for this book")])
                    .build()
            },
            "/reviews/user/{user_id}/book/{book_id}": {
                "get": Operation::new("Get review by userId and bookId", TAG)
                    .path_param("user_id")
                    .path_param("book_id")
                    .success(200, "Review", review())
                    .errors(&[missing])
                    .build()
            },
            "/books/{book_id}/reviews": {
                "get": Operation::new("All reviews for a book, newest first", TAG)
                    .path_param("book_id")
                    .success(200, "Reviews", envelope(item_list(schema_ref("Review"))))
                    .errors(&[missing, (502, "Book service unavailable")])
                    .build()
            },
            "/books/{book_id}/comments": {
                "get": Operation::new("All comments for a book, newest first", TAG)
                    .path_param("book_id")
                    .success(200, "Comments", envelope(item_list(schema_ref("Comment"))))
                    .errors(&[missing])
                    .build()
            },
            "/comments/{id}": {
                "delete": Operation::new("Delete own comment", TAG)
                    .path_param("id")
                    .body(schema_ref("CommentDelete"))
                    .success(200, "Comment deleted", message())
                    .errors(&[bad, forbidden, missing])
                    .build()
            }
        },
        "components": {
            "schemas": {
                "Review": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "userId": { "type": "string" },
                        "bookId": { "type": "string" },
                        "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                        "review": { "type": "string", "nullable": true },
                        "createdAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "userId", "bookId", "rating", "createdAt"]
                },
                "Comment": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "userId": { "type": "string" },
                        "bookId": { "type": "string" },
                        "comment": { "type": "string" },
                        "createdAt": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "userId", "bookId", "comment", "createdAt"]
                },
                "NewReview": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string", "minLength": 1 },
                        "bookId": { "type": "string", "minLength": 1 },
                        "rating": { "type": "integer", "minimum": 1, "maximum": 5 },
                        "review": { "type": "string", "maxLength": 10000 }
                    },
                    "required": ["userId", "bookId", "rating"]
                },
                "NewComment": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string", "minLength": 1 },
                        "bookId": { "type": "string", "minLength": 1 },
                        "comment": { "type": "string", "minLength": 1, "maxLength": 10000 }
                    },
                    "required": ["userId", "bookId", "comment"]
                },
                "ReviewTextUpdate": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string" },
                        "review": { "type": "string", "minLength": 1, "maxLength": 10000 }
                    },
                    "required": ["userId", "review"]
                },
                "RatingUpdate": {
                    "type": "object",
                    "properties": {
                        "userId": { "type": "string" },
                        "rating": { "type": "integer", "minimum": 1, "maximum": 5 }
                    },
                    "required": ["userId", "rating"]
                },
                "CommentDelete": {
                    "type": "object",
                    "properties": { "userId": { "type": "string" } },
                    "required": ["userId"]
                },
                "AverageScore": {
                    "type": "object",
                    "properties": { "average": { "type": "number" } },
                    "required": ["average"]
                }
            }
        }
    })
}

/// Create the reviews module backed by `store`
pub fn create_module(
    store: Arc<dyn DocumentStore>,
    settings: &ReviewsSettings,
) -> anyhow::Result<Arc<dyn Module>> {
    Ok(Arc::new(ReviewsModule::new(store, settings)?))
}
