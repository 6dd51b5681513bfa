//! Typed records stored as documents, plus request id generation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::bots::BotResult;
use crate::pipeline::classifier::{MessageAnalysis, TaskType};

// ── Request ids ─────────────────────────────────────────────────────

/// Wall-clock millisecond identifier for messages and analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Document key for this id.
    pub fn key(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out millisecond timestamps that never repeat within the process.
///
/// Two calls in the same millisecond get consecutive values, so ids can run
/// slightly ahead of the clock under bursts.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    last: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> RequestId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return RequestId(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

// ── Message records ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Received,
    Answered,
    Error,
}

/// One inbound chat message as recorded by the secretary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: RequestId,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    /// Last pipeline stage that touched the message.
    pub step: String,
    #[serde(default)]
    pub analysis: Option<MessageAnalysis>,
    #[serde(default)]
    pub request_id: Option<RequestId>,
    #[serde(default)]
    pub response: Option<String>,
}

impl MessageRecord {
    pub fn received(
        id: RequestId,
        user_id: impl Into<String>,
        session_id: Option<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            session_id,
            text: text.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Received,
            step: "secretary".to_string(),
            analysis: None,
            request_id: None,
            response: None,
        }
    }
}

// ── Analysis records ────────────────────────────────────────────────

/// Lifecycle of an analysis record.
///
/// The record is first written once the brain has parsed the LLM reply, so it
/// starts at `analyzed`. From there: `coordinating → completed | error` for
/// dispatched tasks, `completed` for tasks that skip dispatch, and `error`
/// when no bot matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Analyzed,
    Coordinating,
    Completed,
    Error,
}

/// The evolving record of one request through brain and smart core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub request_id: RequestId,
    pub original_message: String,
    pub user_id: String,
    pub task_type: TaskType,
    pub instructions: String,
    pub response: String,
    pub time_estimate: String,
    pub status: AnalysisStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_core_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BotResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ── Credentials ─────────────────────────────────────────────────────

/// Most leading key characters kept in the stored hash.
const KEY_PREFIX_CHARS: usize = 8;

/// Reduce a raw API key to a short prefix plus an ellipsis.
///
/// At most half the key survives, so short keys are never stored whole.
pub fn mask_api_key(raw: &str) -> String {
    let keep = KEY_PREFIX_CHARS.min(raw.chars().count() / 2);
    let prefix: String = raw.chars().take(keep).collect();
    format!("{prefix}...")
}

/// A stored external credential. Only the masked key is ever kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub api_type: String,
    pub endpoint: String,
    pub api_key_hash: String,
    pub user_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

// ── Conversation log, memory and profiles ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: RequestId,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
    pub response: String,
    pub ai_used: bool,
    pub task_type: TaskType,
    pub analysis: MessageAnalysis,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Normal,
    High,
}

/// A turn worth remembering beyond the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: RequestId,
    pub user_id: String,
    pub content: String,
    pub response: String,
    pub task_type: TaskType,
    pub importance: Importance,
    pub timestamp: DateTime<Utc>,
}

/// Per-user interaction counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub total_interactions: u64,
    pub ai_interactions: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub last_context: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            total_interactions: 0,
            ai_interactions: 0,
            first_seen: now,
            last_seen: now,
            last_context: None,
        }
    }

    /// Count one more turn.
    pub fn record_turn(&mut self, ai_used: bool, context: &str) {
        self.total_interactions += 1;
        if ai_used {
            self.ai_interactions += 1;
        }
        self.last_seen = Utc::now();
        self.last_context = Some(context.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn request_ids_strictly_increase() {
        let ids = RequestIdGenerator::new();
        let mut prev = ids.next();
        for _ in 0..1000 {
            let next = ids.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn request_ids_track_wall_clock() {
        let before = Utc::now().timestamp_millis() as u64;
        let id = RequestIdGenerator::new().next();
        assert!(id.0 >= before);
    }

    #[test]
    fn request_ids_unique_across_threads() {
        let ids = Arc::new(RequestIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn mask_keeps_only_prefix() {
        assert_eq!(mask_api_key("sk-abcdefghijklmnop"), "sk-abcde...");
        assert_eq!(mask_api_key("مفتاح-سري-طويل-جداً"), "مفتاح-سر...");
    }

    #[test]
    fn mask_never_keeps_a_short_key_whole() {
        assert_eq!(mask_api_key("short"), "sh...");
        assert_eq!(mask_api_key("abc123"), "abc...");
        assert_eq!(mask_api_key("12345678"), "1234...");
        assert_eq!(mask_api_key("x"), "...");
        assert_eq!(mask_api_key(""), "...");
    }

    #[test]
    fn analysis_record_uses_camel_case_fields() {
        let record = AnalysisRecord {
            request_id: RequestId(1_700_000_000_000),
            original_message: "بدي موقع".into(),
            user_id: "abo_sham".into(),
            task_type: TaskType::Development,
            instructions: "build it".into(),
            response: "ok".into(),
            time_estimate: "يومين".into(),
            status: AnalysisStatus::Analyzed,
            timestamp: Utc::now(),
            smart_core_step: None,
            result: None,
            error: None,
            updated_at: None,
            completed_at: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["requestId"], 1_700_000_000_000u64);
        assert_eq!(json["taskType"], "development");
        assert_eq!(json["status"], "analyzed");
        assert!(json.get("result").is_none());

        let back: AnalysisRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.task_type, TaskType::Development);
    }

    #[test]
    fn profile_counts_turns() {
        let mut profile = UserProfile::new("abo_sham");
        profile.record_turn(false, "general");
        profile.record_turn(true, "work");
        assert_eq!(profile.total_interactions, 2);
        assert_eq!(profile.ai_interactions, 1);
        assert_eq!(profile.last_context.as_deref(), Some("work"));
    }
}
