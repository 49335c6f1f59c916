//! SQLite-backed document store.
//!
//! All collections share one `documents` table; bodies are JSON text and
//! filters are evaluated with `json_extract`. Unique fields are enforced with
//! partial expression indexes, one per (collection, field).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    QueryBuilder, Sqlite, SqlitePool,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::{
    merge_set, new_id, with_id, Collection, DeleteResult, Document, DocumentStore, Filter,
    InsertOneResult, StoreError, UpdateResult, ID_FIELD,
};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

/// File path named by a `sqlite:` URL, if it names a file at all.
fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

/// How long a writer waits for the database write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn unique_index_name(collection: Collection, field: &str) -> String {
    format!("idx_{}_{}_unique", collection.as_str(), field)
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field)
}

impl SqliteStore {
    /// Open a pool against `url` and make sure the schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to document store at {}", url);

        if let Some(parent) = database_file(url).as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        sqlx::query("SELECT 1").execute(&store.pool).await?;
        info!("Successfully connected to the document store");
        Ok(store)
    }

    /// A private in-memory database. Uses a single connection so every query
    /// sees the same data.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        info!("Running document store migrations...");

        execute_sql(&self.pool, include_str!("../../migrations/001_documents.sql")).await?;

        for collection in Collection::ALL {
            for field in collection.unique_fields() {
                let sql = format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents (json_extract(body, '{}')) WHERE collection = '{}'",
                    unique_index_name(collection, field),
                    json_path(field),
                    collection.as_str(),
                );
                sqlx::query(&sql).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Append `collection = ? AND <conditions>` to the builder.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, collection: Collection, filter: &Filter) {
    builder.push("collection = ");
    builder.push_bind(collection.as_str());

    for (field, value) in filter.conditions() {
        builder.push(" AND ");

        if field == ID_FIELD {
            builder.push("id = ");
            match value {
                Value::String(id) => builder.push_bind(id.clone()),
                other => builder.push_bind(other.to_string()),
            };
            continue;
        }

        builder.push("json_extract(body, ");
        builder.push_bind(json_path(field));
        builder.push(")");

        match value {
            Value::Null => {
                builder.push(" IS NULL");
            }
            Value::Bool(b) => {
                builder.push(" = ");
                builder.push_bind(i64::from(*b));
            }
            Value::Number(n) => {
                builder.push(" = ");
                match n.as_i64() {
                    Some(i) => builder.push_bind(i),
                    None => builder.push_bind(n.as_f64().unwrap_or(f64::NAN)),
                };
            }
            Value::String(s) => {
                builder.push(" = ");
                builder.push_bind(s.clone());
            }
            Value::Array(_) | Value::Object(_) => {
                builder.push(" = json(");
                builder.push_bind(value.to_string());
                builder.push(")");
            }
        }
    }
}

fn decode(id: String, body: String) -> Result<Document, StoreError> {
    let doc: Document = serde_json::from_str(&body)?;
    Ok(with_id(&id, doc))
}

/// Map unique-index violations to [`StoreError::Conflict`].
fn map_write_error(collection: Collection, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            let field = collection
                .unique_fields()
                .iter()
                .copied()
                .find(|field| message.contains(&unique_index_name(collection, field)))
                .or_else(|| collection.unique_fields().first().copied());
            if let Some(field) = field {
                return StoreError::Conflict { collection, field };
            }
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find_all(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT id, body FROM documents WHERE ");
        push_filter(&mut builder, collection, filter);
        builder.push(" ORDER BY rowid");

        let rows: Vec<(String, String)> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(|(id, body)| decode(id, body)).collect()
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT id, body FROM documents WHERE ");
        push_filter(&mut builder, collection, filter);
        builder.push(" ORDER BY rowid LIMIT 1");

        let row: Option<(String, String)> =
            builder.build_query_as().fetch_optional(&self.pool).await?;
        row.map(|(id, body)| decode(id, body)).transpose()
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> Result<InsertOneResult, StoreError> {
        doc.remove(ID_FIELD);
        let id = new_id();
        let body = serde_json::to_string(&doc)?;

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;

        Ok(InsertOneResult::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        // Take the write lock up front. A deferred transaction that reads
        // first cannot be upgraded once another connection has written.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let mut builder = QueryBuilder::new("SELECT id, body FROM documents WHERE ");
        push_filter(&mut builder, collection, filter);
        builder.push(" ORDER BY rowid LIMIT 1");
        let row: Option<(String, String)> =
            builder.build_query_as().fetch_optional(&mut *tx).await?;

        let Some((id, body)) = row else {
            return Ok(UpdateResult::new(0, 0));
        };

        let mut doc: Document = serde_json::from_str(&body)?;
        if !merge_set(&mut doc, set) {
            return Ok(UpdateResult::new(1, 0));
        }

        sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&doc)?)
            .bind(collection.as_str())
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(collection, e))?;

        tx.commit().await?;
        Ok(UpdateResult::new(1, 1))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError> {
        let mut builder = QueryBuilder::new(
            "DELETE FROM documents WHERE rowid = (SELECT rowid FROM documents WHERE ",
        );
        push_filter(&mut builder, collection, filter);
        builder.push(" ORDER BY rowid LIMIT 1)");

        let result = builder.build().execute(&self.pool).await?;
        Ok(DeleteResult::new(result.rows_affected()))
    }
}
