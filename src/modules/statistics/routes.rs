use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Router,
};
use libra_http::{
    error::AppError,
    response::Reply,
    validate::{parse_id, ValidJson},
};

use super::models::{
    AddBook, GenreDistribution, Goal, NewGoal, NewReadBook, ReadBook, RemoveBook, TargetUpdate,
    TotalPages,
};
use super::service::StatisticsService;

type Service = State<Arc<StatisticsService>>;

pub fn router(service: Arc<StatisticsService>) -> Router {
    // `/goals/{id}/genres` takes a user id.
    Router::new()
        .route("/goals", post(create_goal))
        .route("/readBooks", post(log_read_book))
        .route("/goals/{id}", delete(delete_goal))
        .route("/goals/{id}/targetBooks", put(update_target))
        .route("/goals/{id}/books", put(add_book).delete(remove_book))
        .route("/goals/{id}/pages", get(total_pages))
        .route("/goals/{id}/genres", get(genre_distribution))
        .route("/goals/user/{user_id}", get(goal_for_user))
        .with_state(service)
}

async fn create_goal(
    State(service): Service,
    ValidJson(body): ValidJson<NewGoal>,
) -> Result<Reply<Goal>, AppError> {
    let goal = service.create_goal(body).await?;
    Ok(Reply::created("Goal created successfully", goal))
}

async fn log_read_book(
    State(service): Service,
    ValidJson(body): ValidJson<NewReadBook>,
) -> Result<Reply<ReadBook>, AppError> {
    let record = service.log_read_book(body).await?;
    Ok(Reply::created("Read book logged successfully", record))
}

async fn update_target(
    State(service): Service,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<TargetUpdate>,
) -> Result<Reply<Goal>, AppError> {
    parse_id(&id)?;
    let goal = service.update_target(&id, body).await?;
    Ok(Reply::ok("Goal targetBooks updated successfully", goal))
}

async fn add_book(
    State(service): Service,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<AddBook>,
) -> Result<Reply<Goal>, AppError> {
    parse_id(&id)?;
    let goal = service.add_book(&id, body).await?;
    Ok(Reply::ok("Book added to goal successfully", goal))
}

async fn remove_book(
    State(service): Service,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<RemoveBook>,
) -> Result<Reply<Goal>, AppError> {
    parse_id(&id)?;
    let goal = service.remove_book(&id, body).await?;
    Ok(Reply::ok("Book removed from goal successfully", goal))
}

async fn goal_for_user(
    State(service): Service,
    Path(user_id): Path<String>,
) -> Result<Reply<Goal>, AppError> {
    let goal = service.goal_for_user(&user_id).await?;
    Ok(Reply::ok("Goal found successfully", goal))
}

async fn total_pages(
    State(service): Service,
    Path(id): Path<String>,
) -> Result<Reply<TotalPages>, AppError> {
    parse_id(&id)?;
    let pages = service.total_pages(&id).await?;
    Ok(Reply::ok("Total pages calculated successfully", pages))
}

async fn genre_distribution(
    State(service): Service,
    Path(user_id): Path<String>,
) -> Result<Reply<GenreDistribution>, AppError> {
    let distribution = service.genre_distribution(&user_id).await?;
    Ok(Reply::ok(
        "Genre distribution calculated successfully",
        distribution,
    ))
}

async fn delete_goal(
    State(service): Service,
    Path(id): Path<String>,
) -> Result<Reply<()>, AppError> {
    parse_id(&id)?;
    service.delete_goal(&id).await?;
    Ok(Reply::message("Goal deleted successfully"))
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
        router(Arc::new(StatisticsService::new(
            TypedCollection::new(store.clone(), "statistics"),
            TypedCollection::new(store, "statistics"),
        )))
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
    async fn goal_lifecycle_over_http() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/goals",
            Some(json!({"userId": "u1", "targetBooks": 12})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["completedBooks"], 0);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let book = json!({"bookId": "b1", "title": "Dune", "genre": ["SciFi"], "pages": 412});
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/goals/{id}/books"),
            Some(json!({"userId": "u1", "book": book})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["completedBooks"], 1);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/goals/{id}/books"),
            Some(json!({"userId": "u1", "book": book})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = send(&app, "GET", &format!("/goals/{id}/pages"), None).await;
        assert_eq!(body["data"]["totalPages"], 412);

        let (_, body) = send(&app, "GET", "/goals/u1/genres", None).await;
        assert_eq!(body["data"]["distribution"]["SciFi"], 100.0);

        let (status, body) = send(&app, "GET", "/goals/user/u1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id.as_str());

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/goals/{id}/targetBooks"),
            Some(json!({"targetBooks": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "DELETE", &format!("/goals/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Goal deleted successfully");

        let (status, _) = send(&app, "GET", "/goals/user/u1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
