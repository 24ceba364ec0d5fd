use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Router,
};
use libra_http::{
    error::AppError,
    response::{ItemList, Reply},
    validate::{parse_id, ValidJson},
};

use super::models::{
    AverageScore, Comment, CommentDelete, NewComment, NewReview, RatingUpdate, Review,
    ReviewTextUpdate,
};
use super::service::ReviewsService;

type Service = State<Arc<ReviewsService>>;

pub fn router(service: Arc<ReviewsService>) -> Router {
    // `/reviews/{id}/average` takes a book id; the segment name is shared with
    // the review-id routes below it.
    Router::new()
        .route("/reviews", post(create_review))
        .route("/comments", post(create_comment))
        .route("/reviews/{id}", get(get_review).delete(delete_review))
        .route("/reviews/{id}/text", put(update_text))
        .route("/reviews/{id}/rating", put(update_rating))
        .route("/reviews/{id}/average", get(average_rating))
        .route(
            "/reviews/user/{user_id}/book/{book_id}",
            get(review_by_user_and_book),
        )
        .route("/books/{book_id}/reviews", get(reviews_for_book))
        .route("/books/{book_id}/comments", get(comments_for_book))
        .route("/comments/{id}", delete(delete_comment))
        .with_state(service)
}

async fn create_review(
    State(service): Service,
    ValidJson(body): ValidJson<NewReview>,
) -> Result<Reply<Review>, AppError> {
    let review = service.create_review(body).await?;
    Ok(Reply::created("Review created successfully", review))
}

async fn create_comment(
    State(service): Service,
    ValidJson(body): ValidJson<NewComment>,
) -> Result<Reply<Comment>, AppError> {
    let comment = service.create_comment(body).await?;
    Ok(Reply::created("Comment created successfully", comment))
}

async fn update_text(
    State(service): Service,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<ReviewTextUpdate>,
) -> Result<Reply<Review>, AppError> {
    parse_id(&id)?;
    let review = service.update_text(&id, body).await?;
    Ok(Reply::ok("Review text updated successfully", review))
}

async fn update_rating(
    State(service): Service,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<RatingUpdate>,
) -> Result<Reply<Review>, AppError> {
    parse_id(&id)?;
    let review = service.update_rating(&id, body).await?;
    Ok(Reply::ok("Rating updated successfully", review))
}

async fn get_review(
    State(service): Service,
    Path(id): Path<String>,
) -> Result<Reply<Review>, AppError> {
    parse_id(&id)?;
    let review = service.get_review(&id).await?;
    Ok(Reply::ok("Review fetched successfully", review))
}

async fn review_by_user_and_book(
    State(service): Service,
    Path((user_id, book_id)): Path<(String, String)>,
) -> Result<Reply<Review>, AppError> {
    let review = service.review_by_user_and_book(&user_id, &book_id).await?;
    Ok(Reply::ok("Review fetched successfully", review))
}

async fn reviews_for_book(
    State(service): Service,
    Path(book_id): Path<String>,
) -> Result<Reply<ItemList<Review>>, AppError> {
    let reviews = service.reviews_for_book(&book_id).await?;
    Ok(Reply::ok("Reviews fetched successfully", reviews.into()))
}

async fn comments_for_book(
    State(service): Service,
    Path(book_id): Path<String>,
) -> Result<Reply<ItemList<Comment>>, AppError> {
    let comments = service.comments_for_book(&book_id).await?;
    Ok(Reply::ok("Comments fetched successfully", comments.into()))
}

async fn average_rating(
    State(service): Service,
    Path(book_id): Path<String>,
) -> Result<Reply<AverageScore>, AppError> {
    let average = service.average_rating(&book_id).await?;
    Ok(Reply::ok("Average rating calculated successfully", average))
}

async fn delete_comment(
    State(service): Service,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<CommentDelete>,
) -> Result<Reply<()>, AppError> {
    parse_id(&id)?;
    service.delete_comment(&id, body).await?;
    Ok(Reply::message(format!(
        "Successfully deleted comment with id='{id}'"
    )))
}

async fn delete_review(
    State(service): Service,
    Path(id): Path<String>,
) -> Result<Reply<()>, AppError> {
    parse_id(&id)?;
    service.delete_review(&id).await?;
    Ok(Reply::message(format!(
        "Successfully deleted review with id='{id}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use libra_db::{DocumentStore, MemoryStore, TypedCollection};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let service = ReviewsService::new(
            TypedCollection::new(store.clone(), "reviews"),
            TypedCollection::new(store, "reviews"),
            None,
        );
        router(Arc::new(service))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn review_lifecycle_over_http() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/reviews",
            Some(json!({"userId": "u1", "bookId": "b1", "rating": 4, "review": "Solid"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Review created successfully");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", "/books/b1/reviews", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 1);

        let (status, body) = send(&app, "GET", "/reviews/b1/average", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["average"], 4.0);

        let (status, _) = send(&app, "GET", "/reviews/user/u1/book/b1", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/reviews/{id}/rating"),
            Some(json!({"userId": "u2", "rating": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "DELETE", &format!("/reviews/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("data").is_none());

        let (status, _) = send(&app, "GET", &format!("/reviews/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_bodies_and_ids_are_400() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/reviews",
            Some(json!({"userId": "u1", "bookId": "b1", "rating": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Bad request");
        assert_eq!(body["errors"][0]["loc"], json!(["body", "rating"]));

        let (status, _) = send(&app, "GET", "/reviews/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
