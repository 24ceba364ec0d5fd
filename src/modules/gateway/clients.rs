//! Typed reads against the reviews, statistics, and book-detail services.
//!
//! Every read degrades instead of failing: a timeout, a non-2xx answer, or an
//! unreadable body becomes an empty list or `None`, logged at warn.

use std::time::Duration;

use libra_kernel::settings::GatewaySettings;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use super::envelope;
use super::fanout::fan_out;
use super::schema::{AverageScore, BookInGoal, Comment, Goal, GoalWithBooks, Review};
use crate::upstream::{UpstreamClient, UpstreamError};

/// A goal as the statistics service returns it, books still raw.
#[derive(Debug, Deserialize)]
struct GoalRecord {
    #[serde(flatten)]
    goal: Goal,
    #[serde(default)]
    books: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookEntry {
    book_id: String,
    #[serde(default)]
    finished_at: Option<String>,
    #[serde(default)]
    genre: Option<Vec<String>>,
    #[serde(default)]
    pages: Option<i64>,
}

/// Book-detail provider answer for `GET /books/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("unexpected payload: {0}")]
    Shape(#[from] serde_json::Error),
}

impl FetchError {
    fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Upstream(err) if err.is_timeout())
    }
}

/// One client per upstream service, sharing the configured timeout.
#[derive(Debug, Clone)]
pub struct GatewayClients {
    reviews: UpstreamClient,
    statistics: UpstreamClient,
    books: UpstreamClient,
}

impl GatewayClients {
    pub fn new(settings: &GatewaySettings) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(settings.upstream_timeout_ms);
        Ok(Self {
            reviews: UpstreamClient::new(&settings.reviews_url, timeout)?,
            statistics: UpstreamClient::new(&settings.statistics_url, timeout)?,
            books: UpstreamClient::new(&settings.books_url, timeout)?,
        })
    }

    pub async fn reviews_by_book(&self, book_id: &str) -> Vec<Review> {
        match self.reviews.get_json(&["books", book_id, "reviews"]).await {
            Ok(payload) => envelope::decode_items(envelope::items(payload), "review"),
            Err(err) => degraded("reviewsByBook", &FetchError::from(err), Vec::new()),
        }
    }

    /// All comments on the book, not only those tied to one review.
    pub async fn comments_by_book(&self, book_id: &str) -> Vec<Comment> {
        match self.reviews.get_json(&["books", book_id, "comments"]).await {
            Ok(payload) => envelope::decode_items(envelope::items(payload), "comment"),
            Err(err) => degraded("comments", &FetchError::from(err), Vec::new()),
        }
    }

    pub async fn average_rating(&self, book_id: &str) -> Option<AverageScore> {
        fetch_data(&self.reviews, &["reviews", book_id, "average"])
            .await
            .map_err(|err| degraded("averageRating", &err, ()))
            .ok()
    }

    pub async fn goal_by_user(&self, user_id: &str) -> Option<Goal> {
        self.goal_record(user_id).await.map(|record| record.goal)
    }

    /// The user's goal with one concurrent detail lookup per book.
    pub async fn goal_with_books(&self, user_id: &str) -> Option<GoalWithBooks> {
        let record = self.goal_record(user_id).await?;
        let entries: Vec<BookEntry> = envelope::decode_items(record.books, "goal book");

        let details = fan_out(entries.iter(), |entry| self.book_details(&entry.book_id)).await;

        let books = entries
            .into_iter()
            .zip(details)
            .map(|(entry, details)| {
                let details = details.unwrap_or_else(|err| {
                    tracing::warn!(
                        book_id = %entry.book_id,
                        error = %err,
                        "book enrichment failed; leaving fields empty"
                    );
                    BookDetails::default()
                });
                BookInGoal {
                    book_id: entry.book_id,
                    finished_at: entry.finished_at,
                    genre: entry.genre.unwrap_or_default(),
                    pages: entry.pages.map(saturate_i32),
                    title: details.title,
                    author: details.author,
                    cover_url: details.cover_url,
                    average_rating: details.average_rating,
                }
            })
            .collect();

        Some(GoalWithBooks::new(record.goal, books))
    }

    pub async fn book_details(&self, book_id: &str) -> Result<BookDetails, UpstreamError> {
        let payload = self.books.get_json(&["books", book_id]).await?;
        match serde_json::from_value(envelope::data(payload)) {
            Ok(details) => Ok(details),
            Err(err) => {
                tracing::warn!(book_id, error = %err, "unreadable book details");
                Ok(BookDetails::default())
            }
        }
    }

    async fn goal_record(&self, user_id: &str) -> Option<GoalRecord> {
        fetch_data(&self.statistics, &["goals", "user", user_id])
            .await
            .map_err(|err| degraded("goal", &err, ()))
            .ok()
    }
}

/// GET an object response and decode its (possibly enveloped) payload.
async fn fetch_data<T: DeserializeOwned>(
    client: &UpstreamClient,
    segments: &[&str],
) -> Result<T, FetchError> {
    let payload = client.get_json(segments).await?;
    Ok(serde_json::from_value(envelope::data(payload))?)
}

fn degraded<T>(field: &'static str, err: &FetchError, fallback: T) -> T {
    tracing::warn!(
        field,
        timeout = err.is_timeout(),
        error = %err,
        "upstream read failed; returning empty result"
    );
    fallback
}

/// Clamp an upstream integer into GraphQL `Int` range.
pub(super) fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}
