//! Document store abstraction.
//!
//! Every collection holds schemaless JSON documents. The store assigns each
//! document an opaque string id on insert and exposes it as the `_id` field
//! on reads. Two backends implement [`DocumentStore`]: [`SqliteStore`] for
//! the running server and [`MemoryStore`] for tests and local experiments.

mod memory;
pub mod models;
mod sqlite;
pub mod users;

pub use memory::MemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A stored document: a JSON object keyed by top-level field names.
pub type Document = Map<String, Value>;

/// Name of the field carrying the store-assigned id.
pub const ID_FIELD: &str = "_id";

/// The collections the service works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Menu,
    Reviews,
    Carts,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Menu,
        Collection::Reviews,
        Collection::Carts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Menu => "menu",
            Collection::Reviews => "reviews",
            Collection::Carts => "carts",
        }
    }

    /// Top-level fields whose values must be unique within the collection.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Users => &["email"],
            _ => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conjunction of top-level equality tests.
///
/// A `null` value matches documents where the field is missing or null.
/// The [`ID_FIELD`] condition matches against the store-assigned id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().eq(ID_FIELD, id.into())
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, id: &str, doc: &Document) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            if field == ID_FIELD {
                return expected.as_str() == Some(id);
            }
            match (doc.get(field), expected) {
                (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
                (Some(actual), expected) => scalar_eq(actual, expected),
                (None, _) => false,
            }
        })
    }
}

/// Equality as SQLite's `json_extract` sees it: numbers compare by value
/// (`7` matches `7.0`) and booleans compare as `1`/`0`.
fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    fn numeric(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    match (numeric(actual), numeric(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl InsertOneResult {
    pub fn new(inserted_id: String) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateResult {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for unique field `{field}` in `{collection}`")]
    Conflict {
        collection: Collection,
        field: &'static str,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Collection-oriented storage. Each call is an independent operation with
/// no atomicity across calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_all(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    /// Inserts `doc` under a fresh id. Any caller-supplied `_id` is dropped.
    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> Result<InsertOneResult, StoreError>;

    /// Merges the top-level fields of `set` into the first matching document.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError>;

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError>;
}

/// Generate a new store id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Apply a partial set onto `doc`, returning whether anything changed.
pub(crate) fn merge_set(doc: &mut Document, set: Document) -> bool {
    let mut changed = false;
    for (key, value) in set {
        if key == ID_FIELD {
            continue;
        }
        if doc.get(&key) != Some(&value) {
            doc.insert(key, value);
            changed = true;
        }
    }
    changed
}

/// Copy of `doc` with the id exposed under [`ID_FIELD`].
pub(crate) fn with_id(id: &str, mut doc: Document) -> Document {
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    doc
}
