//! libSQL backend: `DocumentStore` over a single `documents` table.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Collection, DocumentStore, merge_fields};

/// libSQL document store.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Document store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn parse_body(collection: Collection, id: &str, body: &str) -> Result<Value, DatabaseError> {
    serde_json::from_str(body)
        .map_err(|e| DatabaseError::Serialization(format!("{collection}/{id}: {e}")))
}

#[async_trait]
impl DocumentStore for LibSqlStore {
    fn backend_name(&self) -> &'static str {
        "libsql"
    }

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<(), DatabaseError> {
        let body = serde_json::to_string(&doc)
            .map_err(|e| DatabaseError::Serialization(format!("{collection}/{id}: {e}")))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO documents (collection, id, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    body = excluded.body,
                    updated_at = excluded.updated_at",
                params![collection.as_str(), id, body, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("put {collection}/{id}: {e}")))?;

        debug!(%collection, id, "Document stored");
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get {collection}/{id}: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get {collection}/{id}: {e}")))?;

        match row {
            Some(row) => {
                let body: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get {collection}/{id}: {e}")))?;
                parse_body(collection, id, &body).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Value, DatabaseError> {
        // Read-modify-write without a version check: concurrent merges race.
        let mut doc = self
            .get(collection, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_fields(&mut doc, fields)?;

        let body = serde_json::to_string(&doc)
            .map_err(|e| DatabaseError::Serialization(format!("{collection}/{id}: {e}")))?;
        self.conn()
            .execute(
                "UPDATE documents SET body = ?3, updated_at = ?4
                 WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id, body, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("merge {collection}/{id}: {e}")))?;

        Ok(doc)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete {collection}/{id}: {e}")))?;
        Ok(affected > 0)
    }

    async fn list(&self, collection: Collection, limit: usize) -> Result<Vec<Value>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, body FROM documents WHERE collection = ?1
                 ORDER BY rowid DESC LIMIT ?2",
                params![collection.as_str(), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list {collection}: {e}")))?;

        let mut docs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list {collection}: {e}")))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list {collection}: {e}")))?;
            let body: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("list {collection}: {e}")))?;
            docs.push(parse_body(collection, &id, &body)?);
        }
        Ok(docs)
    }

    async fn count(&self, collection: Collection) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count {collection}: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count {collection}: {e}")))?;
        let count: i64 = match row {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("count {collection}: {e}")))?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}
