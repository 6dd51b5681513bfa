//! Secretary: intake for every chat message.
//!
//! Records the message, classifies it, and either answers locally or hands it
//! to the brain. Bookkeeping writes (message status, conversation log, memory,
//! user profile) are best-effort: failures are logged and the reply still goes
//! out.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::pipeline::bots::BotResult;
use crate::pipeline::brain::{Brain, BrainOutcome, NextStep};
use crate::pipeline::classifier::{MessageAnalysis, TaskType, Urgency, analyze_message, classify_task};
use crate::pipeline::responder::{local_response, should_use_ai};
use crate::store::records::{
    ConversationRecord, Importance, MemoryEntry, MessageRecord, MessageStatus, RequestId,
    RequestIdGenerator, UserProfile,
};
use crate::store::traits::{Collection, DocumentStore};

/// Flow trace label for the local responder.
const LOCAL_STEP: &str = "local_responder";

/// Chat request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatInput {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Chat reply body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub flow_trace: Vec<String>,
    #[serde(rename = "requestId")]
    pub request_id: Option<RequestId>,
    #[serde(rename = "taskType")]
    pub task_type: TaskType,
    #[serde(rename = "nextStep")]
    pub next_step: String,
    #[serde(rename = "timeEstimate", skip_serializing_if = "Option::is_none")]
    pub time_estimate: Option<String>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub analysis: MessageAnalysis,
    pub ai_used: bool,
    #[serde(rename = "botResult", skip_serializing_if = "Option::is_none")]
    pub bot_result: Option<BotResult>,
}

/// Intake stage.
pub struct Secretary {
    store: Arc<dyn DocumentStore>,
    brain: Option<Brain>,
    ids: Arc<RequestIdGenerator>,
    default_user_id: String,
}

impl Secretary {
    /// `brain` is `None` when no LLM is configured; messages that need it
    /// then get the same apology as a failed LLM call.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        brain: Option<Brain>,
        ids: Arc<RequestIdGenerator>,
        default_user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            brain,
            ids,
            default_user_id: default_user_id.into(),
        }
    }

    pub fn brain_enabled(&self) -> bool {
        self.brain.is_some()
    }

    /// Process one chat message end to end.
    pub async fn process(&self, input: ChatInput) -> Result<ChatReply, DispatchError> {
        let text = input.message.trim().to_string();
        let user_id = input
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(self.default_user_id.as_str())
            .to_string();

        let message_id = self.ids.next();
        info!(%message_id, user_id = %user_id, "Secretary received message");

        let analysis = analyze_message(&text);
        let use_ai = should_use_ai(&text, &analysis);
        debug!(%message_id, ?analysis, use_ai, "Message classified");

        let mut record = MessageRecord::received(message_id, &user_id, input.session_id.clone(), &text);
        record.analysis = Some(analysis);
        if let Err(e) = self
            .store
            .put_record(Collection::Requests, &message_id.key(), &record)
            .await
        {
            warn!(%message_id, error = %e, "Failed to save message record");
        }

        let reply = if use_ai {
            let outcome = match &self.brain {
                Some(brain) => match brain.analyze(&text, &user_id, &analysis).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.mark_message(message_id, MessageStatus::Error, "smart_core", None, None)
                            .await;
                        return Err(e);
                    }
                },
                None => {
                    warn!(%message_id, "Message needs the brain but no LLM is configured");
                    BrainOutcome::failed()
                }
            };
            brain_reply(outcome, &analysis, input.session_id.clone())
        } else {
            ChatReply {
                response: local_response(&text).to_string(),
                flow_trace: vec!["secretary".to_string(), LOCAL_STEP.to_string()],
                request_id: None,
                task_type: classify_task(&text),
                next_step: NextStep::Completed.as_str().to_string(),
                time_estimate: None,
                session_id: input.session_id.clone(),
                analysis,
                ai_used: false,
                bot_result: None,
            }
        };

        let status = if reply.task_type == TaskType::Error {
            MessageStatus::Error
        } else {
            MessageStatus::Answered
        };
        let step = reply
            .flow_trace
            .last()
            .map(String::as_str)
            .unwrap_or("secretary");
        self.mark_message(message_id, status, step, Some(&reply.response), reply.request_id)
            .await;

        self.record_turn(message_id, &user_id, &text, &reply).await;

        info!(
            %message_id,
            task_type = %reply.task_type,
            next_step = %reply.next_step,
            ai_used = reply.ai_used,
            "Secretary replied"
        );
        Ok(reply)
    }

    async fn mark_message(
        &self,
        message_id: RequestId,
        status: MessageStatus,
        step: &str,
        response: Option<&str>,
        request_id: Option<RequestId>,
    ) {
        let fields = json!({
            "status": status,
            "step": step,
            "response": response,
            "requestId": request_id,
        });
        if let Err(e) = self
            .store
            .merge(Collection::Requests, &message_id.key(), fields)
            .await
        {
            warn!(%message_id, error = %e, "Failed to update message record");
        }
    }

    /// Conversation log, long-term memory and profile counters.
    async fn record_turn(&self, message_id: RequestId, user_id: &str, text: &str, reply: &ChatReply) {
        let now = Utc::now();
        let conversation = ConversationRecord {
            id: message_id,
            user_id: user_id.to_string(),
            session_id: reply.session_id.clone(),
            message: text.to_string(),
            response: reply.response.clone(),
            ai_used: reply.ai_used,
            task_type: reply.task_type.clone(),
            analysis: reply.analysis,
            timestamp: now,
        };
        if let Err(e) = self
            .store
            .put_record(Collection::Conversations, &message_id.key(), &conversation)
            .await
        {
            warn!(%message_id, error = %e, "Failed to save conversation entry");
        }

        if reply.ai_used && reply.task_type != TaskType::Error {
            let importance = if reply.analysis.urgency == Urgency::Urgent || reply.bot_result.is_some()
            {
                Importance::High
            } else {
                Importance::Normal
            };
            let entry = MemoryEntry {
                id: message_id,
                user_id: user_id.to_string(),
                content: text.to_string(),
                response: reply.response.clone(),
                task_type: reply.task_type.clone(),
                importance,
                timestamp: now,
            };
            if let Err(e) = self
                .store
                .put_record(Collection::PermanentMemory, &message_id.key(), &entry)
                .await
            {
                warn!(%message_id, error = %e, "Failed to save memory entry");
            }
        }

        let profile = match self
            .store
            .get_record::<UserProfile>(Collection::UserProfiles, user_id)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to read user profile");
                None
            }
        };
        let mut profile = profile.unwrap_or_else(|| UserProfile::new(user_id));
        let context = serde_json::to_value(reply.analysis.context)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        profile.record_turn(reply.ai_used, &context);
        if let Err(e) = self
            .store
            .put_record(Collection::UserProfiles, user_id, &profile)
            .await
        {
            warn!(user_id, error = %e, "Failed to update user profile");
        }
    }
}

fn brain_reply(outcome: BrainOutcome, analysis: &MessageAnalysis, session_id: Option<String>) -> ChatReply {
    ChatReply {
        response: outcome.secretary_response,
        flow_trace: vec![
            "secretary".to_string(),
            "brain".to_string(),
            outcome.next_step.as_str().to_string(),
        ],
        request_id: outcome.request_id,
        task_type: outcome.task_type,
        next_step: outcome.next_step.as_str().to_string(),
        time_estimate: outcome.time_estimate,
        session_id,
        analysis: *analysis,
        ai_used: true,
        bot_result: outcome.bot_result,
    }
}
