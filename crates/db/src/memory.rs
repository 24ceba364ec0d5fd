//! In-process document store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::query::lookup;
use crate::{
    Accumulator, Document, DocumentStore, Filter, IndexSpec, Result, Sort, StoreError, Update,
    DISCRIMINATOR, ID_FIELD,
};

/// Document store held in memory, preserving insertion order.
///
/// Writers take a single lock, which makes every operation atomic with
/// respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    indexes: RwLock<Vec<IndexSpec>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn index_key(index: &IndexSpec, document: &Document) -> Option<Vec<Value>> {
    if document.get(DISCRIMINATOR).and_then(Value::as_str) != Some(index.kind) {
        return None;
    }
    index
        .fields
        .iter()
        .map(|field| lookup(document, field).first().map(|value| (*value).clone()))
        .collect()
}

fn document_id(document: &Document) -> Result<String> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(StoreError::MissingId { field: ID_FIELD })
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let mut found: Vec<Document> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(sort) = sort {
            found.sort_by(|left, right| sort.compare(left, right));
        }
        Ok(found)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<String> {
        let id = document_id(&document)?;
        let indexes = self.indexes.read().await;
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if documents
            .iter()
            .any(|existing| existing.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()))
        {
            return Err(StoreError::Duplicate {
                index: ID_FIELD.to_string(),
            });
        }

        for index in indexes.iter().filter(|index| index.collection == collection) {
            let Some(key) = index_key(index, &document) else {
                continue;
            };
            if documents
                .iter()
                .any(|existing| index_key(index, existing).as_ref() == Some(&key))
            {
                return Err(StoreError::Duplicate {
                    index: index.name.to_string(),
                });
            }
        }

        documents.push(document);
        Ok(id)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>> {
        let mut collections = self.collections.write().await;
        let Some(target) = collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|doc| filter.matches(doc)))
        else {
            return Ok(None);
        };
        update.apply(target)?;
        Ok(Some(target.clone()))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match documents.iter().position(|doc| filter.matches(doc)) {
            Some(position) => {
                documents.remove(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: &Filter,
        accumulator: &Accumulator,
    ) -> Result<Option<f64>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|documents| {
            accumulator.fold(documents.iter().filter(|doc| filter.matches(doc)))
        }))
    }

    async fn ensure_index(&self, index: &IndexSpec) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        if !indexes.contains(index) {
            tracing::debug!(
                collection = %index.collection,
                index = index.name,
                "registering unique index"
            );
            indexes.push(index.clone());
        }
        Ok(())
    }
}
