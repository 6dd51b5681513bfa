//! Outbound integrations triggered from the HTTP surface.

pub mod github;
pub mod gmail;

pub use github::{DeployFile, DeployReport, DeployRequest, GithubClient, GithubConfig};
pub use gmail::{GmailConfig, InboxSummary, check_inbox};
