//! GitHub contents API uploads.
//!
//! Each file is a create-or-update: the current blob `sha` is looked up
//! first and sent back with the PUT when the file already exists.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{Lookup, non_empty, parsed_or};
use crate::error::{ConfigError, IntegrationError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub settings. Enabled when `GITHUB_TOKEN` is set.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: SecretString,
    /// `owner/name`.
    pub repo: String,
    pub branch: Option<String>,
    /// Directory inside the repo that uploads land in. Empty means the root.
    pub path_prefix: String,
    pub api_url: String,
    /// Pause between consecutive uploads.
    pub upload_delay: Duration,
}

impl GithubConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(token) = non_empty(lookup, "GITHUB_TOKEN") else {
            return Ok(None);
        };

        Ok(Some(Self {
            token: SecretString::from(token),
            repo: non_empty(lookup, "GITHUB_REPO").unwrap_or_else(|| "sorooh/smartcore".to_string()),
            branch: non_empty(lookup, "GITHUB_BRANCH"),
            path_prefix: lookup("GITHUB_PATH_PREFIX")
                .map(|p| p.trim().trim_matches('/').to_string())
                .unwrap_or_else(|| "system".to_string()),
            api_url: non_empty(lookup, "GITHUB_API_URL")
                .unwrap_or_else(|| "https://api.github.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            upload_delay: Duration::from_millis(parsed_or(lookup, "GITHUB_UPLOAD_DELAY_MS", 1000)?),
        }))
    }
}

/// One file to upload, path relative to the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployFile {
    pub path: String,
    pub content: String,
}

/// Body of a deploy request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployRequest {
    #[serde(default)]
    pub files: Option<Vec<DeployFile>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Created or updated.
    Success,
    /// GitHub answered with a non-success status.
    Failed,
    /// The request never got an answer.
    Error,
}

/// Per-file outcome.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub file: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    /// The file existed before this upload.
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a deploy run.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub success: bool,
    pub repo: String,
    pub uploaded: usize,
    pub total: usize,
    pub message: String,
    pub results: Vec<UploadResult>,
}

#[derive(Deserialize)]
struct ContentsEntry {
    sha: String,
}

#[derive(Deserialize)]
struct PutResponse {
    #[serde(default)]
    content: Option<PutContent>,
    #[serde(default)]
    commit: Option<PutCommit>,
}

#[derive(Deserialize)]
struct PutContent {
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct PutCommit {
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Status report uploaded when a deploy names no files.
pub fn status_report_file(now: DateTime<Utc>) -> DeployFile {
    let content = format!(
        "# سُروح - تحديث من النظام\n\n\
         ## معلومات التحديث:\n\
         - **التاريخ:** {date}\n\
         - **الوقت:** {time}\n\
         - **المطور:** أبو شام (Sam Borvat)\n\
         - **النظام:** نواة سُروح\n\n\
         ## الملفات المحدثة:\n\
         - Dashboard Pro\n\
         - سُروح الدردشة\n\
         - APIs النظام\n\
         - البوتات الذكية\n\n\
         تم الرفع تلقائياً من النظام.\n",
        date = now.format("%d/%m/%Y"),
        time = now.format("%H:%M:%S"),
    );
    DeployFile {
        path: format!("surooh_update_{}.md", now.timestamp_millis()),
        content,
    }
}

/// Client for the repository contents API.
pub struct GithubClient {
    client: Client,
    config: GithubConfig,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self, IntegrationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("surooh/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    fn repo_path(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if self.config.path_prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{path}", self.config.path_prefix)
        }
    }

    fn contents_url(&self, repo_path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{repo_path}",
            self.config.api_url, self.config.repo
        )
    }

    fn auth_header(&self) -> String {
        format!("token {}", self.config.token.expose_secret())
    }

    /// Upload every file, pausing between uploads. Per-file failures are
    /// reported in the results rather than aborting the run.
    pub async fn deploy(&self, files: Vec<DeployFile>, message: Option<&str>) -> DeployReport {
        let commit_message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("سُروح النظام - {}", Utc::now().to_rfc3339()));
        let total = files.len();
        info!(repo = %self.config.repo, total, "Deploying files to GitHub");

        let mut results = Vec::with_capacity(total);
        for (i, file) in files.iter().enumerate() {
            if i > 0 && !self.config.upload_delay.is_zero() {
                tokio::time::sleep(self.config.upload_delay).await;
            }
            results.push(self.upload(file, &commit_message).await);
        }

        let uploaded = results
            .iter()
            .filter(|r| r.status == UploadStatus::Success)
            .count();
        info!(repo = %self.config.repo, uploaded, total, "GitHub deploy finished");

        DeployReport {
            success: uploaded > 0,
            repo: self.config.repo.clone(),
            uploaded,
            total,
            message: format!("تم رفع {uploaded} من {total} ملفات على GitHub"),
            results,
        }
    }

    async fn upload(&self, file: &DeployFile, commit_message: &str) -> UploadResult {
        let repo_path = self.repo_path(&file.path);
        let url = self.contents_url(&repo_path);

        let existing_sha = self.existing_sha(&url).await;
        let mut body = json!({
            "message": commit_message,
            "content": BASE64.encode(file.content.as_bytes()),
        });
        if let Some(sha) = &existing_sha {
            body["sha"] = json!(sha);
        }
        if let Some(branch) = &self.config.branch {
            body["branch"] = json!(branch);
        }

        let response = match self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(file = %repo_path, error = %e, "GitHub upload request failed");
                return UploadResult {
                    file: repo_path,
                    status: UploadStatus::Error,
                    url: None,
                    sha: None,
                    updated: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            let error = IntegrationError::Github {
                status: status.as_u16(),
                reason,
            };
            warn!(file = %repo_path, error = %error, "GitHub rejected upload");
            return UploadResult {
                file: repo_path,
                status: UploadStatus::Failed,
                url: None,
                sha: None,
                updated: false,
                error: Some(error.to_string()),
            };
        }

        let parsed = response.json::<PutResponse>().await.ok();
        let content = parsed.as_ref().and_then(|p| p.content.as_ref());
        let sha = content
            .and_then(|c| c.sha.clone())
            .or_else(|| parsed.as_ref().and_then(|p| p.commit.as_ref()).and_then(|c| c.sha.clone()));

        debug!(file = %repo_path, updated = existing_sha.is_some(), "Uploaded file");
        UploadResult {
            file: repo_path,
            status: UploadStatus::Success,
            url: content.and_then(|c| c.html_url.clone()),
            sha,
            updated: existing_sha.is_some(),
            error: None,
        }
    }

    /// Blob sha of the file at `url`, or `None` when it does not exist yet
    /// or cannot be read.
    async fn existing_sha(&self, url: &str) -> Option<String> {
        let mut request = self
            .client
            .get(url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/vnd.github+json");
        if let Some(branch) = &self.config.branch {
            request = request.query(&[("ref", branch)]);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                response.json::<ContentsEntry>().await.ok().map(|e| e.sha)
            }
            Ok(response) if response.status() == StatusCode::NOT_FOUND => None,
            Ok(response) => {
                debug!(url, status = %response.status(), "Could not read existing file");
                None
            }
            Err(e) => {
                debug!(url, error = %e, "Could not read existing file");
                None
            }
        }
    }
}
