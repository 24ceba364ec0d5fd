use std::collections::BTreeMap;

use libra_db::{Filter, Sort, TypedCollection, Update};
use libra_http::error::AppError;

use super::models::{
    AddBook, BookRef, GenreDistribution, Goal, NewGoal, NewReadBook, ReadBook, RemoveBook,
    TargetUpdate, TotalPages,
};
use crate::utils;

/// Goal and read-book operations over the shared statistics collection.
pub struct StatisticsService {
    goals: TypedCollection<Goal>,
    read_books: TypedCollection<ReadBook>,
}

impl StatisticsService {
    pub fn new(goals: TypedCollection<Goal>, read_books: TypedCollection<ReadBook>) -> Self {
        Self { goals, read_books }
    }

    /// Goals are per calendar year (UTC); the year is assigned here.
    pub async fn create_goal(&self, body: NewGoal) -> Result<Goal, AppError> {
        let year = utils::current_year();
        let existing = self
            .goals
            .find_one(
                Filter::new()
                    .eq("userId", body.user_id.as_str())
                    .eq("year", year),
            )
            .await?;
        if existing.is_some() {
            return Err(AppError::conflict(
                "Goal for this user and year already exists",
            ));
        }

        let goal = Goal {
            id: utils::new_id(),
            user_id: body.user_id,
            year,
            target_books: body.target_books,
            books: Vec::new(),
            completed_books: 0,
            created_at: utils::timestamp_now()?,
        };
        let created = self.goals.insert(&goal).await?;
        tracing::info!(goal_id = %created.id, year, "goal created");
        Ok(created)
    }

    pub async fn log_read_book(&self, body: NewReadBook) -> Result<ReadBook, AppError> {
        if let Some(goal_id) = body.from_goal_id.as_deref() {
            let source = self
                .goals
                .find_by_id(goal_id)
                .await?
                .ok_or_else(|| AppError::not_found("Source goal not found"))?;
            if source.user_id != body.user_id {
                return Err(AppError::forbidden(
                    "Forbidden: goal belongs to a different user",
                ));
            }
        }

        let duplicate = self
            .read_books
            .find_one(
                Filter::new()
                    .eq("userId", body.user_id.as_str())
                    .eq("book.bookId", body.book.book_id.as_str()),
            )
            .await?;
        if duplicate.is_some() {
            return Err(AppError::conflict("Read book already logged for this user"));
        }

        let now = utils::timestamp_now()?;
        let mut book = body.book;
        if book.finished_at.is_none() {
            book.finished_at = Some(now.clone());
        }
        let record = ReadBook {
            id: utils::new_id(),
            user_id: body.user_id,
            book,
            from_goal_id: body.from_goal_id,
            created_at: now,
        };
        let created = self.read_books.insert(&record).await?;
        tracing::info!(
            read_book_id = %created.id,
            book_id = %created.book.book_id,
            "read book logged"
        );
        Ok(created)
    }

    pub async fn update_target(&self, id: &str, body: TargetUpdate) -> Result<Goal, AppError> {
        let updated = self
            .goals
            .update(
                Filter::new().eq("id", id),
                Update::new().set("targetBooks", body.target_books),
            )
            .await?
            .ok_or_else(|| AppError::not_found("Goal not found"))?;
        tracing::info!(goal_id = %id, target_books = body.target_books, "goal target updated");
        Ok(updated)
    }

    /// Push the book and bump `completedBooks` in one update that only
    /// matches while the book is absent, so racing adds count once.
    pub async fn add_book(&self, id: &str, body: AddBook) -> Result<Goal, AppError> {
        let goal = self.owned_goal(id, &body.user_id).await?;
        if goal.has_book(&body.book.book_id) {
            return Err(AppError::conflict("Book already added to this goal"));
        }

        let book_id = body.book.book_id.clone();
        let book = serde_json::to_value(&body.book).map_err(anyhow::Error::from)?;
        let updated = self
            .goals
            .update(
                Filter::new()
                    .eq("id", id)
                    .ne("books.bookId", book_id.as_str()),
                Update::new().push("books", book).inc("completedBooks", 1),
            )
            .await?;

        match updated {
            Some(goal) => {
                tracing::info!(goal_id = %id, book_id = %book_id, "book added to goal");
                Ok(goal)
            }
            None => Err(self.missed_update(id, "Book already added to this goal").await?),
        }
    }

    pub async fn remove_book(&self, id: &str, body: RemoveBook) -> Result<Goal, AppError> {
        let goal = self.owned_goal(id, &body.user_id).await?;
        if !goal.has_book(&body.book_id) {
            return Err(AppError::not_found("Book not found in this goal"));
        }

        let updated = self
            .goals
            .update(
                Filter::new()
                    .eq("id", id)
                    .eq("books.bookId", body.book_id.as_str()),
                Update::new()
                    .pull("books", "bookId", body.book_id.as_str())
                    .inc("completedBooks", -1),
            )
            .await?
            .ok_or_else(|| AppError::not_found("Goal or book not found"))?;
        tracing::info!(goal_id = %id, book_id = %body.book_id, "book removed from goal");
        Ok(updated)
    }

    /// The user's most recent goal.
    pub async fn goal_for_user(&self, user_id: &str) -> Result<Goal, AppError> {
        self.goals
            .find(
                Filter::new().eq("userId", user_id),
                Some(Sort::descending("year")),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("Goal not found for this user"))
    }

    pub async fn total_pages(&self, id: &str) -> Result<TotalPages, AppError> {
        let goal = self.goal(id).await?;
        Ok(TotalPages {
            total_pages: page_sum(&goal.books),
        })
    }

    /// Share of each genre among all genre tags of the current year's goal.
    pub async fn genre_distribution(&self, user_id: &str) -> Result<GenreDistribution, AppError> {
        let goal = self
            .goals
            .find_one(
                Filter::new()
                    .eq("userId", user_id)
                    .eq("year", utils::current_year()),
            )
            .await?
            .ok_or_else(|| {
                AppError::not_found("Goal not found for this user for the current year")
            })?;

        let distribution = genre_shares(&goal.books)
            .ok_or_else(|| AppError::not_found("No genre data available for this goal"))?;
        Ok(GenreDistribution { distribution })
    }

    pub async fn delete_goal(&self, id: &str) -> Result<(), AppError> {
        if self.goals.delete(Filter::new().eq("id", id)).await? == 0 {
            return Err(AppError::not_found("Goal not found"));
        }
        tracing::info!(goal_id = %id, "goal deleted");
        Ok(())
    }

    async fn goal(&self, id: &str) -> Result<Goal, AppError> {
        self.goals
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Goal not found"))
    }

    /// Existence first, then ownership.
    async fn owned_goal(&self, id: &str, user_id: &str) -> Result<Goal, AppError> {
        let goal = self.goal(id).await?;
        if goal.user_id != user_id {
            return Err(AppError::forbidden(
                "Forbidden: goal belongs to a different user",
            ));
        }
        Ok(goal)
    }

    /// Explain a guarded update that matched nothing.
    async fn missed_update(&self, id: &str, conflict: &str) -> Result<AppError, AppError> {
        Ok(match self.goals.find_by_id(id).await? {
            Some(_) => AppError::conflict(conflict),
            None => AppError::not_found("Goal not found"),
        })
    }
}

/// Missing page counts add nothing; the total saturates instead of wrapping.
fn page_sum(books: &[BookRef]) -> i64 {
    books
        .iter()
        .filter_map(|book| book.pages)
        .fold(0, i64::saturating_add)
}

/// `None` when no book carries a genre tag.
fn genre_shares(books: &[BookRef]) -> Option<BTreeMap<String, f64>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for genre in books.iter().flat_map(|book| book.genre.iter().flatten()) {
        *counts.entry(genre.clone()).or_default() += 1;
    }

    let total: usize = counts.values().sum();
    if total == 0 {
        return None;
    }
    Some(
        counts
            .into_iter()
            .map(|(genre, count)| (genre, utils::round2(count as f64 / total as f64 * 100.0)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use libra_db::{DocumentStore, MemoryStore};
    use libra_http::validate::Validate;

    use crate::modules::statistics::models::MAX_COUNT;

    fn service() -> Arc<StatisticsService> {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        Arc::new(StatisticsService::new(
            TypedCollection::new(store.clone(), "statistics"),
            TypedCollection::new(store, "statistics"),
        ))
    }

    fn book(id: &str, genre: &[&str], pages: Option<i64>) -> BookRef {
        BookRef {
            book_id: id.into(),
            title: format!("Title {id}"),
            finished_at: None,
            genre: Some(genre.iter().map(|g| g.to_string()).collect()),
            pages,
        }
    }

    async fn goal_for(service: &StatisticsService, user: &str) -> Goal {
        service
            .create_goal(NewGoal {
                user_id: user.into(),
                target_books: 10,
            })
            .await
            .unwrap()
    }

    fn add(user: &str, book: BookRef) -> AddBook {
        AddBook {
            user_id: user.into(),
            book,
        }
    }

    #[tokio::test]
    async fn new_goal_starts_empty_and_is_unique_per_year() {
        let service = service();
        let goal = goal_for(&service, "u1").await;
        assert_eq!(goal.completed_books, 0);
        assert!(goal.books.is_empty());
        assert_eq!(goal.year, utils::current_year());

        let err = service
            .create_goal(NewGoal {
                user_id: "u1".into(),
                target_books: 3,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn adding_same_book_twice_conflicts_and_counts_once() {
        let service = service();
        let goal = goal_for(&service, "u1").await;

        service
            .add_book(&goal.id, add("u1", book("b1", &["Fiction"], Some(300))))
            .await
            .unwrap();
        let err = service
            .add_book(&goal.id, add("u1", book("b1", &["Fiction"], Some(300))))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let stored = service.goal_for_user("u1").await.unwrap();
        assert_eq!(stored.completed_books, 1);
        assert_eq!(stored.books.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_adds_of_one_book_count_once() {
        let service = service();
        let goal = goal_for(&service, "u1").await;

        let attempts = (0..8).map(|_| {
            let service = service.clone();
            let id = goal.id.clone();
            tokio::spawn(async move {
                service
                    .add_book(&id, add("u1", book("b1", &["Fiction"], None)))
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;
        let succeeded = results
            .into_iter()
            .filter(|result| matches!(result, Ok(Ok(_))))
            .count();

        assert_eq!(succeeded, 1);
        assert_eq!(service.goal_for_user("u1").await.unwrap().completed_books, 1);
    }

    #[tokio::test]
    async fn ownership_is_checked_after_existence() {
        let service = service();
        let goal = goal_for(&service, "u1").await;

        let err = service
            .add_book(&goal.id, add("u2", book("b1", &[], None)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = service
            .add_book(&utils::new_id(), add("u2", book("b1", &[], None)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remove_book_decrements_and_missing_book_is_not_found() {
        let service = service();
        let goal = goal_for(&service, "u1").await;
        service
            .add_book(&goal.id, add("u1", book("b1", &["Fiction"], Some(100))))
            .await
            .unwrap();

        let updated = service
            .remove_book(
                &goal.id,
                RemoveBook {
                    user_id: "u1".into(),
                    book_id: "b1".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.completed_books, 0);
        assert!(updated.books.is_empty());

        let err = service
            .remove_book(
                &goal.id,
                RemoveBook {
                    user_id: "u1".into(),
                    book_id: "b1".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pages_and_genres_are_derived_from_goal_books() {
        let service = service();
        let goal = goal_for(&service, "u1").await;
        service
            .add_book(&goal.id, add("u1", book("b1", &["Fiction"], Some(320))))
            .await
            .unwrap();
        service
            .add_book(
                &goal.id,
                add("u1", book("b2", &["Fiction", "Mystery"], None)),
            )
            .await
            .unwrap();

        assert_eq!(service.total_pages(&goal.id).await.unwrap().total_pages, 320);

        let distribution = service.genre_distribution("u1").await.unwrap().distribution;
        assert_eq!(distribution["Fiction"], 66.67);
        assert_eq!(distribution["Mystery"], 33.33);
    }

    #[tokio::test]
    async fn page_totals_past_int_range_do_not_overflow() {
        let service = service();
        let goal = goal_for(&service, "u1").await;
        for id in ["b1", "b2", "b3"] {
            let body = add("u1", book(id, &[], Some(MAX_COUNT)));
            assert!(body.validate().is_ok());
            service.add_book(&goal.id, body).await.unwrap();
        }

        let total = service.total_pages(&goal.id).await.unwrap().total_pages;
        assert_eq!(total, 3 * MAX_COUNT);
    }

    #[test]
    fn page_sum_saturates_on_stored_outliers() {
        let books = [
            book("b1", &[], Some(i64::MAX)),
            book("b2", &[], Some(i64::MAX)),
            book("b3", &[], None),
        ];
        assert_eq!(page_sum(&books), i64::MAX);
        assert_eq!(page_sum(&books[2..]), 0);
    }

    #[tokio::test]
    async fn genres_without_tags_is_not_found() {
        let service = service();
        goal_for(&service, "u1").await;
        let err = service.genre_distribution("u1").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn read_books_default_finish_time_and_dedupe() {
        let service = service();
        let goal = goal_for(&service, "u1").await;

        let logged = service
            .log_read_book(NewReadBook {
                user_id: "u1".into(),
                book: book("b1", &[], None),
                from_goal_id: Some(goal.id.clone()),
            })
            .await
            .unwrap();
        assert!(logged.book.finished_at.is_some());
        assert_eq!(logged.from_goal_id.as_deref(), Some(goal.id.as_str()));

        let err = service
            .log_read_book(NewReadBook {
                user_id: "u1".into(),
                book: book("b1", &[], None),
                from_goal_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = service
            .log_read_book(NewReadBook {
                user_id: "u2".into(),
                book: book("b2", &[], None),
                from_goal_id: Some(goal.id),
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn genre_shares_round_to_two_decimals() {
        let shares = genre_shares(&[
            book("b1", &["Fiction"], None),
            book("b2", &["Fiction", "Mystery"], None),
        ])
        .unwrap();
        assert_eq!(shares.len(), 2);
        assert!(genre_shares(&[book("b1", &[], None)]).is_none());
    }
}
