//! `DocumentStore` trait: one async interface over every persistence backend.
//!
//! Records are JSON documents addressed by `(collection, id)`. Callers get the
//! store injected as `Arc<dyn DocumentStore>` and never know which backend
//! is active.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DatabaseError;

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Intake message records written by the secretary.
    Requests,
    /// Analysis records tracking a request through brain and smart core.
    BrainAnalysis,
    /// Stored external-credential records.
    StoredApis,
    /// Question/answer log per user.
    Conversations,
    /// Long-lived memory entries for high-value turns.
    PermanentMemory,
    /// Per-user interaction counters.
    UserProfiles,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Requests,
        Collection::BrainAnalysis,
        Collection::StoredApis,
        Collection::Conversations,
        Collection::PermanentMemory,
        Collection::UserProfiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Requests => "requests",
            Collection::BrainAnalysis => "brain_analysis",
            Collection::StoredApis => "stored_apis",
            Collection::Conversations => "conversations",
            Collection::PermanentMemory => "permanent_memory",
            Collection::UserProfiles => "user_profiles",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-agnostic document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend label reported by `/status` (`memory`, `libsql`).
    fn backend_name(&self) -> &'static str;

    /// Insert or replace a document.
    async fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<(), DatabaseError>;

    /// Fetch a document by id.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, DatabaseError>;

    /// Shallow-merge `fields` into an existing document and return the result.
    ///
    /// Last write wins; there is no version check.
    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Value, DatabaseError>;

    /// Delete a document. Returns `false` if it did not exist.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, DatabaseError>;

    /// Most recently created documents first, up to `limit`.
    async fn list(&self, collection: Collection, limit: usize) -> Result<Vec<Value>, DatabaseError>;

    /// Number of documents in a collection.
    async fn count(&self, collection: Collection) -> Result<u64, DatabaseError>;
}

impl dyn DocumentStore {
    /// Serialize and store a typed record.
    pub async fn put_record<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: &str,
        record: &T,
    ) -> Result<(), DatabaseError> {
        let doc = serde_json::to_value(record)
            .map_err(|e| DatabaseError::Serialization(format!("{collection}/{id}: {e}")))?;
        self.put(collection, id, doc).await
    }

    /// Fetch and deserialize a typed record.
    pub async fn get_record<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, DatabaseError> {
        match self.get(collection, id).await? {
            Some(doc) => serde_json::from_value(doc)
                .map(Some)
                .map_err(|e| DatabaseError::Serialization(format!("{collection}/{id}: {e}"))),
            None => Ok(None),
        }
    }
}

/// Apply a shallow merge of `fields` onto `doc`.
///
/// Both must be JSON objects.
pub(crate) fn merge_fields(doc: &mut Value, fields: Value) -> Result<(), DatabaseError> {
    let (Some(target), Value::Object(updates)) = (doc.as_object_mut(), fields) else {
        return Err(DatabaseError::Serialization(
            "merge requires JSON objects".to_string(),
        ));
    };
    for (key, value) in updates {
        target.insert(key, value);
    }
    Ok(())
}
