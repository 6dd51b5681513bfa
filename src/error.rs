//! Error types for Surooh.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Smart Core dispatch errors.
///
/// These are not downgraded to a friendly string; they surface to the
/// HTTP caller as a 500 carrying the message.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No bot available for task type: {task_type}")]
    UnknownBot { task_type: String },

    #[error("Bot {bot} failed: {source}")]
    Bot {
        bot: String,
        #[source]
        source: LlmError,
    },
}

/// Errors from external integrations (mail, repository uploads, probes).
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("{integration} is not configured")]
    NotConfigured { integration: String },

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("GitHub returned {status}: {reason}")]
    Github { status: u16, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Background task failed: {0}")]
    Join(String),
}

/// Stored external-credential errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential {api_id} not found")]
    NotFound { api_id: String },

    #[error("Invalid credential request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
