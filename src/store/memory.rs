//! Process-local document store used when no database is configured.
//!
//! Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::store::traits::{Collection, DocumentStore, merge_fields};

/// In-memory `DocumentStore`. Documents keep insertion order per collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<(String, Value)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(collection: Collection, id: &str) -> DatabaseError {
    DatabaseError::NotFound {
        entity: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        match docs.iter_mut().find(|(doc_id, _)| doc_id == id) {
            Some((_, existing)) => *existing = doc,
            None => docs.push((id.to_string(), doc)),
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| doc_id == id))
            .map(|(_, doc)| doc.clone()))
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        fields: Value,
    ) -> Result<Value, DatabaseError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| doc_id == id))
            .map(|(_, doc)| doc)
            .ok_or_else(|| not_found(collection, id))?;
        merge_fields(doc, fields)?;
        Ok(doc.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|(doc_id, _)| doc_id != id);
        Ok(docs.len() < before)
    }

    async fn list(&self, collection: Collection, limit: usize) -> Result<Vec<Value>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .rev()
                    .take(limit)
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection) -> Result<u64, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, |docs| docs.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn put_get_and_replace() {
        let store = MemoryStore::new();
        store
            .put(Collection::Requests, "1", json!({"text": "a"}))
            .await
            .unwrap();
        store
            .put(Collection::Requests, "1", json!({"text": "b"}))
            .await
            .unwrap();

        let doc = store.get(Collection::Requests, "1").await.unwrap().unwrap();
        assert_eq!(doc["text"], "b");
        assert_eq!(store.count(Collection::Requests).await.unwrap(), 1);
        assert!(store.get(Collection::BrainAnalysis, "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .put(Collection::Conversations, &i.to_string(), json!({"n": i}))
                .await
                .unwrap();
        }
        let docs = store.list(Collection::Conversations, 3).await.unwrap();
        let ns: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn merge_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .merge(Collection::BrainAnalysis, "404", json!({"status": "completed"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn merge_updates_in_place() {
        let store = MemoryStore::new();
        store
            .put(Collection::BrainAnalysis, "7", json!({"status": "analyzed", "taskType": "code"}))
            .await
            .unwrap();
        let merged = store
            .merge(Collection::BrainAnalysis, "7", json!({"status": "coordinating"}))
            .await
            .unwrap();
        assert_eq!(merged["status"], "coordinating");
        assert_eq!(merged["taskType"], "code");
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemoryStore::new();
        store
            .put(Collection::StoredApis, "k", json!({}))
            .await
            .unwrap();
        assert!(store.delete(Collection::StoredApis, "k").await.unwrap());
        assert!(!store.delete(Collection::StoredApis, "k").await.unwrap());
        assert!(!store.delete(Collection::UserProfiles, "k").await.unwrap());
    }
}
