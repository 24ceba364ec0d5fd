//! Discriminated, serde-typed view over a shared collection.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    Accumulator, Document, DocumentStore, Filter, Result, Sort, StoreError, Update, DISCRIMINATOR,
    ID_FIELD,
};

/// One variant of the tagged union stored in a service collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Discriminator value written to the `type` field.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Collection handle restricted to one entity variant.
///
/// Every filter gets `type == T::KIND` appended, and every inserted document
/// is tagged with it, so variants sharing a collection never see each other.
pub struct TypedCollection<T> {
    store: Arc<dyn DocumentStore>,
    name: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: self.name.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> TypedCollection<T> {
    pub fn new(store: Arc<dyn DocumentStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            _entity: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn scoped(&self, filter: Filter) -> Filter {
        filter.eq(DISCRIMINATOR, T::KIND)
    }

    pub async fn find_one(&self, filter: Filter) -> Result<Option<T>> {
        self.store
            .find_one(&self.name, &self.scoped(filter))
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.find_one(Filter::new().eq(ID_FIELD, id)).await
    }

    pub async fn find(&self, filter: Filter, sort: Option<Sort>) -> Result<Vec<T>> {
        self.store
            .find(&self.name, &self.scoped(filter), sort.as_ref())
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Insert and return the stored projection, read back from the store.
    pub async fn insert(&self, entity: &T) -> Result<T> {
        let id = self.store.insert_one(&self.name, encode(entity)?).await?;
        self.find_by_id(&id).await?.ok_or_else(|| {
            StoreError::Backend(format!("document '{id}' missing right after insert"))
        })
    }

    pub async fn update(&self, filter: Filter, update: Update) -> Result<Option<T>> {
        self.store
            .find_one_and_update(&self.name, &self.scoped(filter), &update)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn delete(&self, filter: Filter) -> Result<u64> {
        self.store.delete_one(&self.name, &self.scoped(filter)).await
    }

    pub async fn aggregate(&self, filter: Filter, accumulator: Accumulator) -> Result<Option<f64>> {
        self.store
            .aggregate(&self.name, &self.scoped(filter), &accumulator)
            .await
    }
}

fn encode<T: Entity>(entity: &T) -> Result<Document> {
    match serde_json::to_value(entity)? {
        Value::Object(mut document) => {
            document.insert(DISCRIMINATOR.to_string(), Value::from(T::KIND));
            Ok(document)
        }
        _ => Err(StoreError::NotAnObject),
    }
}

fn decode<T: DeserializeOwned>(document: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        text: String,
    }

    impl Entity for Note {
        const KIND: &'static str = "note";

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        id: String,
        text: String,
    }

    impl Entity for Tag {
        const KIND: &'static str = "tag";

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[tokio::test]
    async fn variants_sharing_a_collection_stay_apart() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let notes = TypedCollection::<Note>::new(store.clone(), "shared");
        let tags = TypedCollection::<Tag>::new(store.clone(), "shared");

        let note = Note {
            id: "n1".into(),
            text: "same".into(),
        };
        assert_eq!(notes.insert(&note).await.unwrap(), note);
        tags.insert(&Tag {
            id: "t1".into(),
            text: "same".into(),
        })
        .await
        .unwrap();

        let found = notes
            .find(Filter::new().eq("text", "same"), None)
            .await
            .unwrap();
        assert_eq!(found, vec![note]);
        assert!(tags.find_by_id("n1").await.unwrap().is_none());

        let raw = store
            .find_one("shared", &Filter::new().eq("id", "t1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw["type"], "tag");
    }
}
