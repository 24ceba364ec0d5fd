use std::collections::BTreeMap;

use libra_db::Entity;
use libra_http::validate::{Checks, FieldError, Validate};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Upper bound for page and book counts, so they fit a GraphQL `Int`.
pub const MAX_COUNT: i64 = i32::MAX as i64;

/// A book as recorded inside a goal or a read-book event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRef {
    pub book_id: String,
    pub title: String,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub genre: Option<Vec<String>>,
    #[serde(default)]
    pub pages: Option<i64>,
}

impl BookRef {
    fn check(&self, checks: Checks) -> Checks {
        let finished_at_ok = self
            .finished_at
            .as_deref()
            .map_or(true, |stamp| OffsetDateTime::parse(stamp, &Rfc3339).is_ok());
        checks
            .non_empty("book.bookId", &self.book_id)
            .range("book.pages", self.pages.unwrap_or(0), 0, MAX_COUNT)
            .require(
                "book.finishedAt",
                finished_at_ok,
                "must be an RFC 3339 timestamp",
            )
    }
}

/// A user's reading goal for one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub year: i32,
    pub target_books: i64,
    #[serde(default)]
    pub books: Vec<BookRef>,
    pub completed_books: i64,
    pub created_at: String,
}

impl Goal {
    pub fn has_book(&self, book_id: &str) -> bool {
        self.books.iter().any(|book| book.book_id == book_id)
    }
}

impl Entity for Goal {
    const KIND: &'static str = "userGoal";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A finished book logged outside of (or moved out of) a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadBook {
    pub id: String,
    pub user_id: String,
    pub book: BookRef,
    #[serde(default)]
    pub from_goal_id: Option<String>,
    pub created_at: String,
}

impl Entity for ReadBook {
    const KIND: &'static str = "readBooks";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub user_id: String,
    pub target_books: i64,
}

impl Validate for NewGoal {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("userId", &self.user_id)
            .range("targetBooks", self.target_books, 1, MAX_COUNT)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetUpdate {
    pub target_books: i64,
}

impl Validate for TargetUpdate {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .range("targetBooks", self.target_books, 1, MAX_COUNT)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBook {
    pub user_id: String,
    pub book: BookRef,
}

impl Validate for AddBook {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        self.book
            .check(Checks::new().non_empty("userId", &self.user_id))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBook {
    pub user_id: String,
    pub book_id: String,
}

impl Validate for RemoveBook {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        Checks::new()
            .non_empty("userId", &self.user_id)
            .non_empty("bookId", &self.book_id)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReadBook {
    pub user_id: String,
    pub book: BookRef,
    #[serde(default)]
    pub from_goal_id: Option<String>,
}

impl Validate for NewReadBook {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        self.book
            .check(Checks::new().non_empty("userId", &self.user_id))
            .uuid("fromGoalId", self.from_goal_id.as_deref())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalPages {
    pub total_pages: i64,
}

/// Percentage of genre tags per genre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreDistribution {
    pub distribution: BTreeMap<String, f64>,
}
