//! Read-only document store contract.
//!
//! Defines [`DocumentStore`], the trait implemented by the MongoDB-backed
//! store and the in-memory store, along with the [`Filter`] and
//! [`FindOptions`] it accepts.

use std::cmp::Ordering;
use std::future::Future;

use serde_json::Value;

/// A document as a field → value mapping. Absent fields are simply missing.
pub type Document = serde_json::Map<String, Value>;

/// A failed count or find on one collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{collection}: {message}")]
pub struct StoreError {
    pub collection: String,
    pub message: String,
}

impl StoreError {
    pub fn new(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Predicate applied to a single top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value. Against an array field, any element may match.
    Eq(Value),
    /// Field is present (`true`) or absent (`false`).
    Exists(bool),
}

/// Conjunction of field conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), Condition::Eq(value.into())));
        self
    }

    pub fn exists(mut self, field: impl Into<String>, present: bool) -> Self {
        self.clauses.push((field.into(), Condition::Exists(present)));
        self
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|(field, cond)| match cond {
            Condition::Exists(present) => doc.contains_key(field) == *present,
            Condition::Eq(expected) => match doc.get(field) {
                Some(Value::Array(items)) if !expected.is_array() => {
                    items.iter().any(|item| item == expected)
                }
                Some(actual) => actual == expected,
                None => expected.is_null(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Find options
// ---------------------------------------------------------------------------

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

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn sorted(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sort: Some(Sort {
                field: field.into(),
                direction,
            }),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Total order over JSON values used for in-memory sorting.
///
/// Missing sorts before null, then numbers, strings, objects, arrays and
/// booleans, loosely following the server's type ordering.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Object(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Bool(_)) => 6,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// A connected, read-only document database.
pub trait DocumentStore: Send + Sync {
    /// Lightweight liveness probe. Never fails: connectivity problems
    /// degrade to `false`.
    fn is_alive(&self) -> impl Future<Output = bool> + Send;

    /// Count documents of `collection` matching `filter`.
    fn count(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Fetch documents of `collection` matching `filter`.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
