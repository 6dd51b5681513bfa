//! Gmail inbox check over raw IMAP.
//!
//! One short session per check: LOGIN, SELECT INBOX, SEARCH ALL, then header
//! fetches for the newest few messages. Nothing is marked as read.

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use mail_parser::MessageParser;
use rustls_pki_types::ServerName;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Lookup, non_empty, parsed_or};
use crate::error::{ConfigError, IntegrationError};

const SUMMARY_CHARS: usize = 50;
const NO_SUBJECT: &str = "بدون عنوان";
const UNKNOWN_SENDER: &str = "مجهول";
const READ_TIMEOUT: Duration = Duration::from_secs(30);

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Gmail settings. Enabled only when both address and app password are set.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub address: String,
    pub app_password: SecretString,
    pub imap_host: String,
    pub imap_port: u16,
    /// How many of the newest messages to summarize.
    pub fetch_limit: usize,
}

impl GmailConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Option<Self>, ConfigError> {
        let (Some(address), Some(password)) = (
            non_empty(lookup, "GMAIL_ADDRESS"),
            non_empty(lookup, "GMAIL_APP_PASSWORD"),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            address,
            app_password: SecretString::from(password),
            imap_host: non_empty(lookup, "GMAIL_IMAP_HOST")
                .unwrap_or_else(|| "imap.gmail.com".to_string()),
            imap_port: parsed_or(lookup, "GMAIL_IMAP_PORT", 993)?,
            fetch_limit: parsed_or(lookup, "GMAIL_FETCH_LIMIT", 3)?,
        }))
    }
}

/// Header summary of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailSummary {
    pub subject: String,
    pub sender: String,
    pub date: Option<String>,
}

/// Result of one inbox check.
#[derive(Debug, Clone, Serialize)]
pub struct InboxSummary {
    pub gmail_address: String,
    pub total_emails: usize,
    pub emails: Vec<EmailSummary>,
}

/// Log in and summarize the newest messages in the inbox.
pub async fn check_inbox(config: &GmailConfig) -> Result<InboxSummary, IntegrationError> {
    info!(address = %config.address, host = %config.imap_host, "Checking Gmail inbox");
    let cfg = config.clone();
    let summary = tokio::task::spawn_blocking(move || fetch_inbox_headers(&cfg))
        .await
        .map_err(|e| IntegrationError::Join(e.to_string()))??;
    info!(
        total = summary.total_emails,
        fetched = summary.emails.len(),
        "Gmail inbox checked"
    );
    Ok(summary)
}

fn imap_err(e: impl std::fmt::Display) -> IntegrationError {
    IntegrationError::Imap(e.to_string())
}

/// Blocking IMAP session; run inside `spawn_blocking`.
fn fetch_inbox_headers(config: &GmailConfig) -> Result<InboxSummary, IntegrationError> {
    let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port)).map_err(imap_err)?;
    tcp.set_read_timeout(Some(READ_TIMEOUT)).map_err(imap_err)?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = ServerName::try_from(config.imap_host.clone()).map_err(imap_err)?;
    let conn = rustls::ClientConnection::new(tls_config, server_name).map_err(imap_err)?;
    let mut tls = rustls::StreamOwned::new(conn, tcp);

    let read_line = |tls: &mut TlsStream| -> Result<String, IntegrationError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(tls, &mut byte) {
                Ok(0) => return Err(imap_err("connection closed")),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(imap_err(e)),
            }
        }
    };

    let send_cmd = |tls: &mut TlsStream, tag: &str, cmd: &str| -> Result<Vec<String>, IntegrationError> {
        IoWrite::write_all(tls, format!("{tag} {cmd}\r\n").as_bytes()).map_err(imap_err)?;
        IoWrite::flush(tls).map_err(imap_err)?;
        let mut lines = Vec::new();
        loop {
            let line = read_line(tls)?;
            let done = line.starts_with(tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    };

    let _greeting = read_line(&mut tls)?;

    let login = send_cmd(
        &mut tls,
        "A1",
        &format!(
            "LOGIN {} {}",
            quote(&config.address),
            quote(config.app_password.expose_secret())
        ),
    )?;
    ensure_ok(&login, "A1", "login")?;

    let select = send_cmd(&mut tls, "A2", "SELECT \"INBOX\"")?;
    ensure_ok(&select, "A2", "select INBOX")?;

    let search = send_cmd(&mut tls, "A3", "SEARCH ALL")?;
    let ids = parse_search(&search);
    debug!(total = ids.len(), "Inbox search complete");

    let mut emails = Vec::new();
    let mut tag_counter = 4_u32;
    for id in newest(&ids, config.fetch_limit) {
        let tag = format!("A{tag_counter}");
        tag_counter += 1;
        let fetched = send_cmd(&mut tls, &tag, &format!("FETCH {id} BODY.PEEK[HEADER]"))?;
        emails.push(summarize_headers(header_block(&fetched).as_bytes()));
    }

    let _ = send_cmd(&mut tls, &format!("A{tag_counter}"), "LOGOUT");

    Ok(InboxSummary {
        gmail_address: config.address.clone(),
        total_emails: ids.len(),
        emails,
    })
}

/// IMAP quoted string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn ensure_ok(lines: &[String], tag: &str, what: &str) -> Result<(), IntegrationError> {
    let ok = lines
        .last()
        .and_then(|l| l.strip_prefix(tag))
        .is_some_and(|rest| rest.trim_start().starts_with("OK"));
    if ok {
        Ok(())
    } else {
        Err(imap_err(format!("{what} failed")))
    }
}

/// Message sequence numbers from an untagged `* SEARCH` response.
fn parse_search(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().map(str::to_string))
        .collect()
}

/// The last `limit` ids, in mailbox order.
fn newest(ids: &[String], limit: usize) -> &[String] {
    &ids[ids.len().saturating_sub(limit)..]
}

/// Raw header text from a FETCH response: drops the untagged FETCH line, the
/// closing paren and the tagged status line.
fn header_block(lines: &[String]) -> String {
    let body = match lines.len() {
        0..=2 => return String::new(),
        n => &lines[1..n - 1],
    };
    let body = match body.last() {
        Some(last) if last.trim() == ")" => &body[..body.len() - 1],
        _ => body,
    };
    body.concat()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn summarize_headers(raw: &[u8]) -> EmailSummary {
    let Some(parsed) = MessageParser::default().parse(raw) else {
        return EmailSummary {
            subject: NO_SUBJECT.to_string(),
            sender: UNKNOWN_SENDER.to_string(),
            date: None,
        };
    };

    let subject = parsed
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUBJECT);

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| match (a.name(), a.address()) {
            (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
            (None, Some(address)) => Some(address.to_string()),
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        })
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    EmailSummary {
        subject: truncate(subject, SUMMARY_CHARS),
        sender: truncate(&sender, SUMMARY_CHARS),
        date: parsed.date().map(|d| d.to_rfc3339()),
    }
}
