//! MongoDB document store.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document as BsonDocument};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;

use crate::{
    Accumulator, Condition, Document, DocumentStore, Filter, IndexSpec, Operation, Result, Sort,
    SortDirection, StoreError, Update, DISCRIMINATOR, ID_FIELD,
};

const MONGO_ID: &str = "_id";
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB implementation of [`DocumentStore`].
///
/// Documents keep their string `id` as `_id`; everything else is stored as-is.
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await.map_err(map_error)?;
        Ok(Self {
            database: client.database(database),
        })
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.database.collection(name)
    }
}

fn field_name(field: &str) -> &str {
    if field == ID_FIELD {
        MONGO_ID
    } else {
        field
    }
}

fn to_bson(value: &Value) -> Result<Bson> {
    bson::to_bson(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn filter_document(filter: &Filter) -> Result<BsonDocument> {
    let mut out = BsonDocument::new();
    for condition in filter.conditions() {
        match condition {
            Condition::Eq { field, value } => {
                out.insert(field_name(field), to_bson(value)?);
            }
            Condition::Ne { field, value } => {
                out.insert(field_name(field), doc! { "$ne": to_bson(value)? });
            }
            Condition::Between { field, min, max } => {
                out.insert(field_name(field), doc! { "$gte": *min, "$lte": *max });
            }
        }
    }
    Ok(out)
}

fn update_document(update: &Update) -> Result<BsonDocument> {
    let mut set = BsonDocument::new();
    let mut push = BsonDocument::new();
    let mut pull = BsonDocument::new();
    let mut inc = BsonDocument::new();

    for operation in update.operations() {
        match operation {
            Operation::Set { field, value } => {
                set.insert(field_name(field), to_bson(value)?);
            }
            Operation::Push { field, value } => {
                push.insert(field_name(field), to_bson(value)?);
            }
            Operation::Pull { field, key, value } => {
                let mut matcher = BsonDocument::new();
                matcher.insert(key.as_str(), to_bson(value)?);
                pull.insert(field_name(field), matcher);
            }
            Operation::Inc { field, by } => {
                inc.insert(field_name(field), *by);
            }
        }
    }

    let mut out = BsonDocument::new();
    for (operator, fields) in [("$set", set), ("$push", push), ("$pull", pull), ("$inc", inc)] {
        if !fields.is_empty() {
            out.insert(operator, fields);
        }
    }
    Ok(out)
}

fn into_bson_document(document: Document) -> Result<BsonDocument> {
    let mut out = bson::to_document(&document).map_err(|e| StoreError::Backend(e.to_string()))?;
    if let Some(id) = out.remove(ID_FIELD) {
        out.insert(MONGO_ID, id);
    }
    Ok(out)
}

fn from_bson_document(mut document: BsonDocument) -> Result<Document> {
    if let Some(id) = document.remove(MONGO_ID) {
        document.insert(ID_FIELD, id);
    }
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

fn map_error(err: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write)) = err.kind.as_ref() {
        if write.code == DUPLICATE_KEY {
            return StoreError::Duplicate {
                index: write.message.clone(),
            };
        }
    }
    StoreError::Mongo(err)
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        self.collection(collection)
            .find_one(filter_document(filter)?)
            .await
            .map_err(map_error)?
            .map(from_bson_document)
            .transpose()
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> Result<Vec<Document>> {
        let mut action = self.collection(collection).find(filter_document(filter)?);
        if let Some(sort) = sort {
            let direction = match sort.direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            let mut order = BsonDocument::new();
            order.insert(field_name(&sort.field), direction);
            action = action.sort(order);
        }
        let cursor = action.await.map_err(map_error)?;
        let documents: Vec<BsonDocument> = cursor.try_collect().await.map_err(map_error)?;
        documents.into_iter().map(from_bson_document).collect()
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<String> {
        let id = document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(StoreError::MissingId { field: ID_FIELD })?;
        self.collection(collection)
            .insert_one(into_bson_document(document)?)
            .await
            .map_err(map_error)?;
        Ok(id)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>> {
        self.collection(collection)
            .find_one_and_update(filter_document(filter)?, update_document(update)?)
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_error)?
            .map(from_bson_document)
            .transpose()
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let result = self
            .collection(collection)
            .delete_one(filter_document(filter)?)
            .await
            .map_err(map_error)?;
        Ok(result.deleted_count)
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: &Filter,
        accumulator: &Accumulator,
    ) -> Result<Option<f64>> {
        let value = match accumulator {
            Accumulator::Avg(field) => doc! { "$avg": format!("${field}") },
            Accumulator::Sum(field) => doc! { "$sum": format!("${field}") },
            Accumulator::Count => doc! { "$sum": 1 },
        };
        let pipeline = vec![
            doc! { "$match": filter_document(filter)? },
            doc! { "$group": { "_id": Bson::Null, "value": value } },
        ];

        let mut cursor = self
            .collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(map_error)?;
        let Some(group) = cursor.try_next().await.map_err(map_error)? else {
            return Ok(None);
        };
        Ok(match group.get("value") {
            Some(Bson::Double(v)) => Some(*v),
            Some(Bson::Int32(v)) => Some(f64::from(*v)),
            Some(Bson::Int64(v)) => Some(*v as f64),
            _ => None,
        })
    }

    async fn ensure_index(&self, index: &IndexSpec) -> Result<()> {
        let mut keys = BsonDocument::new();
        for field in &index.fields {
            keys.insert(field_name(field), 1);
        }
        let mut scope = BsonDocument::new();
        scope.insert(DISCRIMINATOR, index.kind);
        let options = IndexOptions::builder()
            .name(index.name.to_string())
            .unique(true)
            .partial_filter_expression(scope)
            .build();
        let model = IndexModel::builder().keys(keys).options(options).build();

        self.collection(&index.collection)
            .create_index(model)
            .await
            .map_err(map_error)?;

        tracing::info!(
            collection = %index.collection,
            index = index.name,
            "unique index ensured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_field_maps_to_mongo_primary_key() {
        let filter = Filter::new().eq("id", "abc").ne("books.bookId", "b1");
        let translated = filter_document(&filter).unwrap();
        assert_eq!(translated.get_str("_id").unwrap(), "abc");
        assert!(translated.get_document("books.bookId").is_ok());
    }

    #[test]
    fn update_groups_operations_by_operator() {
        let update = Update::new()
            .pull("books", "bookId", "b1")
            .inc("completedBooks", -1);
        let translated = update_document(&update).unwrap();
        assert!(translated.get_document("$pull").is_ok());
        assert_eq!(
            translated
                .get_document("$inc")
                .unwrap()
                .get_i64("completedBooks")
                .unwrap(),
            -1
        );
        assert!(translated.get("$set").is_none());
    }
}
