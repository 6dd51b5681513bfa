//! Stored external credentials.
//!
//! Keys are never persisted in full: only `mask_api_key` output reaches the
//! store, so listings can be returned to clients as-is.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_USER_ID;
use crate::error::CredentialError;
use crate::store::records::{CredentialRecord, mask_api_key};
use crate::store::traits::{Collection, DocumentStore};

/// Upper bound on records returned by a listing.
const LIST_LIMIT: usize = 500;

/// Body of a store request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreApiRequest {
    #[serde(default)]
    pub api_type: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Body of a delete request. `api_type` is only echoed in messages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteApiRequest {
    #[serde(default)]
    pub api_id: String,
    #[serde(default)]
    pub api_type: Option<String>,
}

/// CRUD over credential records.
pub struct CredentialService {
    store: Arc<dyn DocumentStore>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Mask and persist a credential. Returns the stored record.
    pub async fn store(&self, request: StoreApiRequest) -> Result<CredentialRecord, CredentialError> {
        let api_type = request.api_type.trim();
        if api_type.is_empty() {
            return Err(CredentialError::Invalid("apiType is required".into()));
        }
        if request.api_key.trim().is_empty() {
            return Err(CredentialError::Invalid("apiKey is required".into()));
        }

        let record = CredentialRecord {
            id: Uuid::new_v4().to_string(),
            api_type: api_type.to_string(),
            endpoint: request.endpoint.trim().to_string(),
            api_key_hash: mask_api_key(request.api_key.trim()),
            user_id: request
                .user_id
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            status: "active".to_string(),
            timestamp: Utc::now(),
        };

        self.store
            .put_record(Collection::StoredApis, &record.id, &record)
            .await?;
        info!(api_id = %record.id, api_type = %record.api_type, "Stored credential");
        Ok(record)
    }

    /// Stored credentials, newest first. Unreadable documents are skipped.
    pub async fn list(&self) -> Result<Vec<CredentialRecord>, CredentialError> {
        let docs = self.store.list(Collection::StoredApis, LIST_LIMIT).await?;
        let records = docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<CredentialRecord>(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed credential record");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// Remove a credential by id.
    pub async fn delete(&self, api_id: &str) -> Result<(), CredentialError> {
        let api_id = api_id.trim();
        if api_id.is_empty() {
            return Err(CredentialError::Invalid("apiId is required".into()));
        }
        if self.store.delete(Collection::StoredApis, api_id).await? {
            info!(api_id, "Deleted credential");
            Ok(())
        } else {
            Err(CredentialError::NotFound {
                api_id: api_id.to_string(),
            })
        }
    }
}
