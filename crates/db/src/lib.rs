//! Document store client for LIBRA services.
//!
//! Every service keeps its entities in a single collection and tells them
//! apart by a discriminator field (`type`). The [`DocumentStore`] trait is the
//! only thing services talk to; [`TypedCollection`] layers the discriminator
//! and serde decoding on top of it.

use async_trait::async_trait;

pub mod error;
pub mod index;
pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;
pub mod query;
pub mod typed;

pub use error::{Result, StoreError};
pub use index::IndexSpec;
pub use memory::MemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;
pub use query::{Accumulator, Condition, Filter, Operation, Sort, SortDirection, Update};
pub use typed::{Entity, TypedCollection};

/// A stored document. Keys are field names; `id` holds the primary key.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding the entity variant of a document.
pub const DISCRIMINATOR: &str = "type";

/// Field holding the primary key of a document.
pub const ID_FIELD: &str = "id";

/// Backend-agnostic document collection operations.
///
/// All updates apply to a single document atomically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Return every matching document, optionally sorted.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> Result<Vec<Document>>;

    /// Insert a document carrying an `id` and return that id.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<String>;

    /// Apply `update` to the first matching document and return it as it is
    /// after the update, or `None` when nothing matched.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>>;

    /// Delete the first matching document, returning the number deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Fold matching documents into a single number. `None` when nothing matched.
    async fn aggregate(
        &self,
        collection: &str,
        filter: &Filter,
        accumulator: &Accumulator,
    ) -> Result<Option<f64>>;

    /// Declare a unique index. Idempotent.
    async fn ensure_index(&self, index: &IndexSpec) -> Result<()>;
}
