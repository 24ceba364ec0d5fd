//! Filter, update, sort, and aggregation descriptions shared by all backends.
//!
//! The in-memory backend evaluates these directly; other backends translate
//! them into their native query language.

use std::cmp::Ordering;

use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{Document, Result, StoreError};

/// A single predicate on a (possibly dotted) field path.
///
/// Paths descend into embedded objects and fan out over embedded arrays, so
/// `books.bookId` matches when any element of `books` has that `bookId`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq { field: String, value: Value },
    /// True when no value at the path equals `value`, including when the
    /// path is absent.
    Ne { field: String, value: Value },
    /// Inclusive numeric range.
    Between { field: String, min: f64, max: f64 },
}

/// Conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Ne {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn between(mut self, field: impl Into<String>, min: f64, max: f64) -> Self {
        self.conditions.push(Condition::Between {
            field: field.into(),
            min,
            max,
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq { field, value } => lookup(document, field)
                .iter()
                .any(|candidate| value_matches(candidate, value)),
            Condition::Ne { field, value } => !lookup(document, field)
                .iter()
                .any(|candidate| value_matches(candidate, value)),
            Condition::Between { field, min, max } => {
                lookup(document, field).iter().any(|candidate| {
                    candidate
                        .as_f64()
                        .is_some_and(|number| number >= *min && number <= *max)
                })
            }
        })
    }
}

/// One field-level mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Set { field: String, value: Value },
    Push { field: String, value: Value },
    /// Remove every array element whose `key` equals `value`.
    Pull {
        field: String,
        key: String,
        value: Value,
    },
    Inc { field: String, by: i64 },
}

/// Ordered set of operations applied to one document atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    operations: Vec<Operation>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operations.push(Operation::Set {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operations.push(Operation::Push {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn pull(
        mut self,
        field: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.operations.push(Operation::Pull {
            field: field.into(),
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.operations.push(Operation::Inc {
            field: field.into(),
            by,
        });
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Apply to a copy first so a failing operation leaves `document` intact.
    pub(crate) fn apply(&self, document: &mut Document) -> Result<()> {
        let mut next = document.clone();
        for operation in &self.operations {
            match operation {
                Operation::Set { field, value } => {
                    next.insert(field.clone(), value.clone());
                }
                Operation::Push { field, value } => {
                    match next
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()))
                    {
                        Value::Array(items) => items.push(value.clone()),
                        _ => return Err(invalid(field, "push target is not an array")),
                    }
                }
                Operation::Pull { field, key, value } => match next.get_mut(field) {
                    Some(Value::Array(items)) => {
                        items.retain(|item| item.get(key.as_str()) != Some(value));
                    }
                    None => {}
                    Some(_) => return Err(invalid(field, "pull target is not an array")),
                },
                Operation::Inc { field, by } => {
                    let current = match next.get(field) {
                        None | Some(Value::Null) => 0,
                        Some(existing) => existing
                            .as_i64()
                            .ok_or_else(|| invalid(field, "increment target is not an integer"))?,
                    };
                    next.insert(field.clone(), Value::from(current + by));
                }
            }
        }
        *document = next;
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> StoreError {
    StoreError::InvalidUpdate {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    pub(crate) fn compare(&self, left: &Document, right: &Document) -> Ordering {
        let ordering = compare_values(
            lookup(left, &self.field).first().copied(),
            lookup(right, &self.field).first().copied(),
        );
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Reduction applied by [`crate::DocumentStore::aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accumulator {
    Avg(String),
    Sum(String),
    Count,
}

impl Accumulator {
    pub(crate) fn fold<'a>(&self, documents: impl Iterator<Item = &'a Document>) -> Option<f64> {
        let mut count = 0usize;
        let mut total = 0.0;
        for document in documents {
            count += 1;
            if let Accumulator::Avg(field) | Accumulator::Sum(field) = self {
                total += lookup(document, field)
                    .first()
                    .and_then(|value| value.as_f64())
                    .unwrap_or(0.0);
            }
        }
        if count == 0 {
            return None;
        }
        Some(match self {
            Accumulator::Avg(_) => total / count as f64,
            Accumulator::Sum(_) => total,
            Accumulator::Count => count as f64,
        })
    }
}

/// Resolve a dotted path, fanning out over arrays along the way.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return Vec::new();
    };
    let mut current: Vec<&Value> = document.get(first).into_iter().collect();
    for segment in segments {
        current = current
            .into_iter()
            .flat_map(|value| match value {
                Value::Object(map) => map.get(segment).into_iter().collect::<Vec<_>>(),
                Value::Array(items) => items.iter().filter_map(|item| item.get(segment)).collect(),
                _ => Vec::new(),
            })
            .collect();
    }
    current
}

fn value_matches(candidate: &Value, expected: &Value) -> bool {
    if candidate == expected {
        return true;
    }
    match candidate {
        Value::Array(items) => items.iter().any(|item| item == expected),
        _ => false,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => {
            // RFC 3339 strings with different sub-second precision do not sort
            // lexically, so compare them as instants when both parse.
            match (
                OffsetDateTime::parse(a, &Rfc3339),
                OffsetDateTime::parse(b, &Rfc3339),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn dotted_path_matches_any_array_element() {
        let goal = doc(json!({
            "type": "userGoal",
            "books": [{"bookId": "b1"}, {"bookId": "b2"}]
        }));

        assert!(Filter::new().eq("books.bookId", "b2").matches(&goal));
        assert!(!Filter::new().eq("books.bookId", "b3").matches(&goal));
        assert!(Filter::new().ne("books.bookId", "b3").matches(&goal));
        assert!(!Filter::new().ne("books.bookId", "b1").matches(&goal));
    }

    #[test]
    fn between_is_inclusive() {
        let review = doc(json!({"rating": 5}));
        assert!(Filter::new().between("rating", 1.0, 5.0).matches(&review));
        assert!(!Filter::new().between("rating", 1.0, 4.0).matches(&review));
    }

    #[test]
    fn push_pull_and_inc_apply_together() {
        let mut goal = doc(json!({"books": [], "completedBooks": 0}));

        Update::new()
            .push("books", json!({"bookId": "b1"}))
            .inc("completedBooks", 1)
            .apply(&mut goal)
            .unwrap();
        assert_eq!(goal["completedBooks"], json!(1));
        assert_eq!(goal["books"], json!([{"bookId": "b1"}]));

        Update::new()
            .pull("books", "bookId", "b1")
            .inc("completedBooks", -1)
            .apply(&mut goal)
            .unwrap();
        assert_eq!(goal["completedBooks"], json!(0));
        assert_eq!(goal["books"], json!([]));
    }

    #[test]
    fn failed_update_leaves_document_untouched() {
        let mut document = doc(json!({"books": "oops", "completedBooks": 3}));
        let result = Update::new()
            .inc("completedBooks", 1)
            .push("books", json!({}))
            .apply(&mut document);

        assert!(matches!(result, Err(StoreError::InvalidUpdate { .. })));
        assert_eq!(document["completedBooks"], json!(3));
    }

    #[test]
    fn timestamps_sort_by_instant() {
        let older = doc(json!({"createdAt": "2024-05-01T10:00:00Z"}));
        let newer = doc(json!({"createdAt": "2024-05-01T10:00:00.5Z"}));
        let sort = Sort::descending("createdAt");
        assert_eq!(sort.compare(&newer, &older), Ordering::Less);
    }

    #[test]
    fn average_over_nothing_is_none() {
        let documents: Vec<Document> = Vec::new();
        assert_eq!(Accumulator::Avg("rating".into()).fold(documents.iter()), None);
    }
}
