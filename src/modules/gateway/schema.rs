//! GraphQL query surface of the gateway.

use std::sync::Arc;

use async_graphql::{
    ComplexObject, Context, EmptyMutation, EmptySubscription, Object, Schema, SimpleObject,
};
use serde::{Deserialize, Deserializer};

use super::clients::{saturate_i32, GatewayClients};

pub type GatewaySchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn build_schema(clients: Arc<GatewayClients>) -> GatewaySchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(clients)
        .finish()
}

#[derive(Debug, Clone, PartialEq, Deserialize, SimpleObject)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub rating: i32,
    #[serde(default)]
    pub review: Option<String>,
    pub created_at: String,
}

#[ComplexObject]
impl Review {
    /// Every comment on this review's book.
    async fn comments(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Comment>> {
        let clients = ctx.data::<Arc<GatewayClients>>()?;
        Ok(clients.comments_by_book(&self.book_id).await)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, SimpleObject)]
pub struct AverageScore {
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub year: i32,
    #[serde(deserialize_with = "saturating_int")]
    pub target_books: i32,
    #[serde(deserialize_with = "saturating_int")]
    pub completed_books: i32,
    pub created_at: String,
}

/// Counters are 64-bit upstream; out-of-range values clamp instead of
/// failing the whole goal.
fn saturating_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    i64::deserialize(deserializer).map(saturate_i32)
}

/// A goal book merged with book-detail provider data. The provider fields
/// stay null when the lookup for that book failed.
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct BookInGoal {
    pub book_id: String,
    pub finished_at: Option<String>,
    pub genre: Vec<String>,
    pub pages: Option<i32>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct GoalWithBooks {
    pub id: String,
    pub user_id: String,
    pub year: i32,
    pub target_books: i32,
    pub completed_books: i32,
    pub created_at: String,
    pub books: Vec<BookInGoal>,
}

impl GoalWithBooks {
    pub fn new(goal: Goal, books: Vec<BookInGoal>) -> Self {
        Self {
            id: goal.id,
            user_id: goal.user_id,
            year: goal.year,
            target_books: goal.target_books,
            completed_books: goal.completed_books,
            created_at: goal.created_at,
            books,
        }
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Reviews of a book, newest first. Empty when the reviews service fails.
    async fn reviews_by_book(
        &self,
        ctx: &Context<'_>,
        book_id: String,
    ) -> async_graphql::Result<Vec<Review>> {
        let clients = ctx.data::<Arc<GatewayClients>>()?;
        Ok(clients.reviews_by_book(&book_id).await)
    }

    async fn average_rating(
        &self,
        ctx: &Context<'_>,
        book_id: String,
    ) -> async_graphql::Result<Option<AverageScore>> {
        let clients = ctx.data::<Arc<GatewayClients>>()?;
        Ok(clients.average_rating(&book_id).await)
    }

    async fn goal_by_user(
        &self,
        ctx: &Context<'_>,
        user_id: String,
    ) -> async_graphql::Result<Option<Goal>> {
        let clients = ctx.data::<Arc<GatewayClients>>()?;
        Ok(clients.goal_by_user(&user_id).await)
    }

    /// The user's goal with each book enriched from the book-detail provider.
    async fn goal_with_books(
        &self,
        ctx: &Context<'_>,
        user_id: String,
    ) -> async_graphql::Result<Option<GoalWithBooks>> {
        let clients = ctx.data::<Arc<GatewayClients>>()?;
        Ok(clients.goal_with_books(&user_id).await)
    }
}
