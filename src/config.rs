//! Configuration types.
//!
//! Everything is read from the process environment. Optional features
//! (LLM brain, Gmail, GitHub, on-disk store) are switched off when their
//! variables are absent; only malformed values are errors.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::integrations::github::GithubConfig;
use crate::integrations::gmail::GmailConfig;
use crate::llm::LlmConfig;

/// Source of configuration values keyed by environment variable name.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Default user when a chat request does not name one.
pub const DEFAULT_USER_ID: &str = "abo_sham";

/// Read a variable, treating blank values as absent.
pub(crate) fn non_empty(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when it is absent.
pub(crate) fn parsed_or<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 3001,
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory (or `.db` file) for the libSQL store. `None` keeps
    /// everything in process memory.
    pub db_url: Option<PathBuf>,
    pub db_name: String,
}

impl StoreConfig {
    /// Resolved database file, if an on-disk store is configured.
    pub fn database_file(&self) -> Option<PathBuf> {
        let url = self.db_url.as_ref()?;
        if url.extension().is_some_and(|ext| ext == "db") {
            Some(url.clone())
        } else {
            Some(url.join(format!("{}.db", self.db_name)))
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_url: None,
            db_name: "surooh".to_string(),
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct SuroohConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub llm: Option<LlmConfig>,
    pub gmail: Option<GmailConfig>,
    pub github: Option<GithubConfig>,
    pub default_user_id: String,
    pub log_dir: Option<PathBuf>,
}

impl SuroohConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key/value source.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();
        let server = ServerConfig {
            bind: parsed_or(lookup, "SUROOH_BIND", defaults.bind)?,
            port: parsed_or(lookup, "SUROOH_PORT", defaults.port)?,
        };

        let store = StoreConfig {
            db_url: non_empty(lookup, "SUROOH_DB_URL").map(PathBuf::from),
            db_name: non_empty(lookup, "SUROOH_DB_NAME")
                .unwrap_or_else(|| StoreConfig::default().db_name),
        };

        Ok(Self {
            server,
            store,
            llm: LlmConfig::from_lookup(lookup)?,
            gmail: GmailConfig::from_lookup(lookup)?,
            github: GithubConfig::from_lookup(lookup)?,
            default_user_id: non_empty(lookup, "SUROOH_USER_ID")
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            log_dir: non_empty(lookup, "SUROOH_LOG_DIR").map(PathBuf::from),
        })
    }
}
