//! Request validation: field checks, the `ValidJson` extractor, and id parsing.

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;

/// One failed check, located like `["body", "rating"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
}

impl FieldError {
    pub fn to_json(&self) -> serde_json::Value {
        json!({ "loc": self.loc, "msg": self.msg, "type": "value_error" })
    }
}

/// Implemented by request bodies that carry field constraints.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// Accumulates field errors for a request body.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &str, msg: String) {
        self.errors.push(FieldError {
            loc: vec!["body".to_string(), field.to_string()],
            msg,
        });
    }

    pub fn non_empty(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.fail(field, "must not be empty".to_string());
        }
        self
    }

    pub fn max_chars(mut self, field: &str, value: Option<&str>, max: usize) -> Self {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.fail(field, format!("must be at most {max} characters"));
        }
        self
    }

    pub fn range(mut self, field: &str, value: i64, min: i64, max: i64) -> Self {
        if value < min || value > max {
            self.fail(field, format!("must be between {min} and {max}"));
        }
        self
    }

    pub fn at_least(mut self, field: &str, value: i64, min: i64) -> Self {
        if value < min {
            self.fail(field, format!("must be at least {min}"));
        }
        self
    }

    pub fn uuid(mut self, field: &str, value: Option<&str>) -> Self {
        if value.is_some_and(|v| Uuid::parse_str(v).is_err()) {
            self.fail(field, "invalid id".to_string());
        }
        self
    }

    /// Arbitrary predicate; `msg` is reported when `ok` is false.
    pub fn require(mut self, field: &str, ok: bool, msg: &str) -> Self {
        if !ok {
            self.fail(field, msg.to_string());
        }
        self
    }

    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn bad_request(errors: &[FieldError]) -> AppError {
    AppError::validation(errors.iter().map(FieldError::to_json).collect(), "Bad request")
}

/// JSON body extractor that rejects malformed or invalid bodies with a 400
/// `{message, errors}` response.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                AppError::validation(
                    vec![json!({
                        "loc": ["body"],
                        "msg": rejection.body_text(),
                        "type": "json_invalid",
                    })],
                    "Bad request",
                )
            })?;
        value.validate().map_err(|errors| bad_request(&errors))?;
        Ok(Self(value))
    }
}

/// Parse a path identifier, mapping garbage to a 400.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        AppError::validation(
            vec![json!({"loc": ["path", "id"], "msg": "invalid id", "type": "value_error"})],
            "Bad request",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Rating {
        rating: i64,
    }

    impl Validate for Rating {
        fn validate(&self) -> Result<(), Vec<FieldError>> {
            Checks::new().range("rating", self.rating, 1, 5).finish()
        }
    }

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        let request = json_request(r#"{"rating": 3}"#);
        let ValidJson(rating) = ValidJson::<Rating>::from_request(request, &())
            .await
            .unwrap();
        assert_eq!(rating.rating, 3);
    }

    #[tokio::test]
    async fn rejects_out_of_range_field() {
        let err = ValidJson::<Rating>::from_request(json_request(r#"{"rating": 9}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let err = ValidJson::<Rating>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn checks_collect_every_failure() {
        let errors = Checks::new()
            .non_empty("userId", " ")
            .max_chars("review", Some("abcdef"), 3)
            .at_least("targetBooks", 0, 1)
            .uuid("fromGoalId", Some("nope"))
            .finish()
            .unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0].loc, vec!["body", "userId"]);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(parse_id("not-a-uuid").is_err());
        assert!(parse_id(&Uuid::now_v7().to_string()).is_ok());
    }
}
