use libra_db::{Accumulator, Filter, Sort, TypedCollection, Update};
use libra_http::error::AppError;

use super::models::{
    AverageScore, Comment, CommentDelete, NewComment, NewReview, RatingUpdate, Review,
    ReviewTextUpdate,
};
use crate::upstream::{UpstreamClient, UpstreamError};
use crate::utils;

const RATING_MIN: f64 = 1.0;
const RATING_MAX: f64 = 5.0;

/// Review and comment operations over the shared reviews collection.
pub struct ReviewsService {
    reviews: TypedCollection<Review>,
    comments: TypedCollection<Comment>,
    books: Option<UpstreamClient>,
}

impl ReviewsService {
    pub fn new(
        reviews: TypedCollection<Review>,
        comments: TypedCollection<Comment>,
        books: Option<UpstreamClient>,
    ) -> Self {
        Self {
            reviews,
            comments,
            books,
        }
    }

    pub async fn create_review(&self, body: NewReview) -> Result<Review, AppError> {
        let existing = self
            .reviews
            .find_one(
                Filter::new()
                    .eq("userId", body.user_id.as_str())
                    .eq("bookId", body.book_id.as_str()),
            )
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict(
                "Review already exists for this user and book",
            ));
        }

        self.ensure_book_exists(&body.book_id).await?;

        let review = Review {
            id: utils::new_id(),
            user_id: body.user_id,
            book_id: body.book_id,
            rating: body.rating,
            review: body.review,
            created_at: utils::timestamp_now()?,
        };
        let created = self.reviews.insert(&review).await?;
        tracing::info!(review_id = %created.id, book_id = %created.book_id, "review created");
        Ok(created)
    }

    pub async fn create_comment(&self, body: NewComment) -> Result<Comment, AppError> {
        let comment = Comment {
            id: utils::new_id(),
            user_id: body.user_id,
            book_id: body.book_id,
            comment: body.comment,
            created_at: utils::timestamp_now()?,
        };
        let created = self.comments.insert(&comment).await?;
        tracing::info!(comment_id = %created.id, book_id = %created.book_id, "comment created");
        Ok(created)
    }

    pub async fn update_text(&self, id: &str, body: ReviewTextUpdate) -> Result<Review, AppError> {
        self.owned_review(id, &body.user_id).await?;
        self.apply_review_update(id, Update::new().set("review", body.review))
            .await
    }

    pub async fn update_rating(&self, id: &str, body: RatingUpdate) -> Result<Review, AppError> {
        self.owned_review(id, &body.user_id).await?;
        self.apply_review_update(id, Update::new().set("rating", body.rating))
            .await
    }

    pub async fn get_review(&self, id: &str) -> Result<Review, AppError> {
        self.reviews
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Review not found"))
    }

    pub async fn review_by_user_and_book(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> Result<Review, AppError> {
        self.reviews
            .find_one(
                Filter::new()
                    .eq("userId", user_id)
                    .eq("bookId", book_id)
                    .between("rating", RATING_MIN, RATING_MAX),
            )
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Review not found for userId='{user_id}' and bookId='{book_id}'"
                ))
            })
    }

    /// Newest first.
    pub async fn reviews_for_book(&self, book_id: &str) -> Result<Vec<Review>, AppError> {
        self.ensure_book_exists(book_id).await?;

        let reviews = self
            .reviews
            .find(
                Filter::new().eq("bookId", book_id),
                Some(Sort::descending("createdAt")),
            )
            .await?;
        if reviews.is_empty() {
            return Err(AppError::not_found(format!(
                "Book not found or no reviews for bookId='{book_id}'"
            )));
        }
        Ok(reviews)
    }

    /// Newest first.
    pub async fn comments_for_book(&self, book_id: &str) -> Result<Vec<Comment>, AppError> {
        let comments = self
            .comments
            .find(
                Filter::new().eq("bookId", book_id),
                Some(Sort::descending("createdAt")),
            )
            .await?;
        if comments.is_empty() {
            return Err(AppError::not_found(format!(
                "Book not found or no comments for bookId='{book_id}'"
            )));
        }
        Ok(comments)
    }

    pub async fn average_rating(&self, book_id: &str) -> Result<AverageScore, AppError> {
        let average = self
            .reviews
            .aggregate(
                Filter::new()
                    .eq("bookId", book_id)
                    .between("rating", RATING_MIN, RATING_MAX),
                Accumulator::Avg("rating".to_string()),
            )
            .await?
            .ok_or_else(|| AppError::not_found(format!("No reviews for bookId='{book_id}'")))?;
        Ok(AverageScore {
            average: utils::round2(average),
        })
    }

    pub async fn delete_comment(&self, id: &str, body: CommentDelete) -> Result<(), AppError> {
        let comment = self
            .comments
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment not found"))?;
        if comment.user_id != body.user_id {
            return Err(AppError::forbidden(
                "Forbidden: comment belongs to a different user",
            ));
        }

        if self.comments.delete(Filter::new().eq("id", id)).await? == 0 {
            return Err(AppError::not_found("Comment not found"));
        }
        tracing::info!(comment_id = %id, "comment deleted");
        Ok(())
    }

    pub async fn delete_review(&self, id: &str) -> Result<(), AppError> {
        if self.reviews.delete(Filter::new().eq("id", id)).await? == 0 {
            return Err(AppError::not_found("Review not found"));
        }
        tracing::info!(review_id = %id, "review deleted");
        Ok(())
    }

    /// Existence first, then ownership.
    async fn owned_review(&self, id: &str, user_id: &str) -> Result<Review, AppError> {
        let review = self.get_review(id).await?;
        if review.user_id != user_id {
            return Err(AppError::forbidden(
                "Forbidden: review belongs to a different user",
            ));
        }
        Ok(review)
    }

    async fn apply_review_update(&self, id: &str, update: Update) -> Result<Review, AppError> {
        let updated = self
            .reviews
            .update(Filter::new().eq("id", id), update)
            .await?
            .ok_or_else(|| AppError::not_found("Review not found"))?;
        tracing::info!(review_id = %id, "review updated");
        Ok(updated)
    }

    async fn ensure_book_exists(&self, book_id: &str) -> Result<(), AppError> {
        let Some(books) = &self.books else {
            return Ok(());
        };

        match books.get_json(&["books", book_id]).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Err(AppError::not_found(format!(
                "Book with id='{book_id}' not found"
            ))),
            Err(err @ UpstreamError::Transport { .. }) => {
                tracing::warn!(error = %err, book_id, "book service unreachable");
                Err(AppError::upstream("Error connecting to book-service"))
            }
            Err(err) => {
                tracing::warn!(error = %err, book_id, "book existence check failed");
                Err(AppError::upstream(
                    "Error checking book existence in book-service",
                ))
            }
        }
    }
}
