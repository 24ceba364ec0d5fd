use libra_db::Entity;
use libra_http::validate::{Checks, FieldError, Validate};
use serde::{Deserialize, Serialize};

const MAX_TEXT: usize = 10_000;

/// A user's rating of a book, optionally with text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub rating: i64,
    #[serde(default)]
    pub review: Option<String>,
    pub created_at: String,
}

impl Entity for Review {
    const KIND: &'static str = "review";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub comment: String,
    pub created_at: String,
}

impl Entity for Comment {
    const KIND: &'static str = "comment";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub user_id: String,
    pub book_id: String,
    pub rating: i64,
    #[serde(default)]
    pub review: Option<String>,
}

impl Validate for NewReview {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("userId", &self.user_id)
            .non_empty("bookId", &self.book_id)
            .range("rating", self.rating, 1, 5)
            .max_chars("review", self.review.as_deref(), MAX_TEXT)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub user_id: String,
    pub book_id: String,
    pub comment: String,
}

impl Validate for NewComment {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("userId", &self.user_id)
            .non_empty("bookId", &self.book_id)
            .non_empty("comment", &self.comment)
            .max_chars("comment", Some(&self.comment), MAX_TEXT)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTextUpdate {
    pub user_id: String,
    pub review: String,
}

impl Validate for ReviewTextUpdate {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("userId", &self.user_id)
            .non_empty("review", &self.review)
            .max_chars("review", Some(&self.review), MAX_TEXT)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingUpdate {
    pub user_id: String,
    pub rating: i64,
}

impl Validate for RatingUpdate {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("userId", &self.user_id)
            .range("rating", self.rating, 1, 5)
            .finish()
    }
}

/// Body of a comment delete: only the owner may remove it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDelete {
    pub user_id: String,
}

impl Validate for CommentDelete {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new().non_empty("userId", &self.user_id).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageScore {
    pub average: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_serializes_camel_case() {
        let review = Review {
            id: "r1".into(),
            user_id: "u1".into(),
            book_id: "b1".into(),
            rating: 5,
            review: None,
            created_at: "2025-01-01T00:00:00Z".into(),
        };
        let value = serde_json::to_value(&review).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["createdAt"], "2025-01-01T00:00:00Z");
        assert!(value["review"].is_null());
    }

    #[test]
    fn new_review_limits() {
        let body = NewReview {
            user_id: "u1".into(),
            book_id: "".into(),
            rating: 6,
            review: Some("x".repeat(MAX_TEXT + 1)),
        };
        assert_eq!(body.validate().unwrap_err().len(), 3);
    }
}
