//! HTTP surface: shared state, error mapping and the router.

pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::error;

use crate::config::SuroohConfig;
use crate::credentials::CredentialService;
use crate::error::{CredentialError, DatabaseError, DispatchError, IntegrationError};
use crate::integrations::github::GithubClient;
use crate::integrations::gmail::GmailConfig;
use crate::llm::provider::LlmProvider;
use crate::pipeline::responder::SYSTEM_ERROR;
use crate::pipeline::{Brain, Secretary};
use crate::store::records::RequestIdGenerator;
use crate::store::traits::DocumentStore;

pub use routes::api_routes;

/// Timeout for `/check-system` probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub secretary: Arc<Secretary>,
    pub store: Arc<dyn DocumentStore>,
    pub credentials: Arc<CredentialService>,
    /// Gmail settings (None if Gmail is not configured).
    pub gmail: Option<GmailConfig>,
    /// GitHub uploader (None if no token is configured).
    pub github: Option<Arc<GithubClient>>,
    /// Client for local service probes.
    pub probe: reqwest::Client,
    /// Port probed by `/check-system` when none is given.
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire the pipeline together. Without an LLM the secretary answers
    /// locally only.
    pub fn new(
        config: &SuroohConfig,
        store: Arc<dyn DocumentStore>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self, IntegrationError> {
        let ids = Arc::new(RequestIdGenerator::new());
        let brain = llm.map(|llm| Brain::new(llm, Arc::clone(&store), Arc::clone(&ids)));
        let secretary = Secretary::new(
            Arc::clone(&store),
            brain,
            ids,
            config.default_user_id.clone(),
        );
        let github = config
            .github
            .clone()
            .map(GithubClient::new)
            .transpose()?
            .map(Arc::new);
        let probe = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;

        Ok(Self {
            secretary: Arc::new(secretary),
            credentials: Arc::new(CredentialService::new(Arc::clone(&store))),
            store,
            gmail: config.gmail.clone(),
            github,
            probe,
            port: config.server.port,
            started_at: Utc::now(),
        })
    }
}

/// Handler error, mapped onto a status code and JSON body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match &self {
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            ),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::Dispatch(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "response": SYSTEM_ERROR }),
            ),
            ApiError::Integration(IntegrationError::NotConfigured { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "success": false, "error": message }),
            ),
            ApiError::Credential(CredentialError::NotFound { .. }) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": message }),
            ),
            ApiError::Credential(CredentialError::Invalid(_)) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            ),
            ApiError::Integration(_) | ApiError::Credential(_) | ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": message }),
            ),
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn dispatch_failure_is_server_error_with_raw_message() {
        let err = ApiError::from(DispatchError::UnknownBot {
            task_type: "management".into(),
        });
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "No bot available for task type: management");
        assert_eq!(body["response"], SYSTEM_ERROR);
    }

    #[tokio::test]
    async fn database_failure_is_server_error() {
        let err = ApiError::from(DatabaseError::Query("disk full".into()));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Query failed: disk full");
    }

    #[tokio::test]
    async fn client_errors_keep_their_status() {
        let (status, body) = render(ApiError::BadRequest("bad json".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad json");

        let invalid = CredentialError::Invalid("apiKey is required".into());
        let (status, _) = render(ApiError::from(invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
