//! Brain: one LLM call that decides the task type and phrases the reply.
//!
//! Flow:
//! 1. Ask the LLM for a structured decision (JSON object)
//! 2. Parse it, falling back to `TYPE:` / `INSTRUCTIONS:` style labeled lines
//! 3. Record the analysis
//! 4. Hand code/design/development tasks to Smart Core
//!
//! Any LLM failure (here or in the bot) collapses to the apology reply with
//! the `error` task type and no request id.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::bots::BotResult;
use crate::pipeline::classifier::{MessageAnalysis, TaskType};
use crate::pipeline::responder::{APOLOGY, acknowledgement};
use crate::pipeline::smart_core::SmartCore;
use crate::store::records::{AnalysisRecord, AnalysisStatus, RequestId, RequestIdGenerator};
use crate::store::traits::{Collection, DocumentStore};

const BRAIN_MAX_TOKENS: u32 = 1024;
const BRAIN_TEMPERATURE: f32 = 0.3;

/// Time estimate used when the LLM gives none.
pub const DEFAULT_TIME_ESTIMATE: &str = "بضع دقائق";

/// Where the request went after the brain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    SmartCore,
    Completed,
    Error,
}

impl NextStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextStep::SmartCore => "smart_core",
            NextStep::Completed => "completed",
            NextStep::Error => "error",
        }
    }
}

/// Result of one brain pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainOutcome {
    pub secretary_response: String,
    pub task_type: TaskType,
    pub instructions: Option<String>,
    pub next_step: NextStep,
    pub request_id: Option<RequestId>,
    pub time_estimate: Option<String>,
    pub bot_result: Option<BotResult>,
}

impl BrainOutcome {
    /// The fixed outcome for a failed LLM call.
    pub fn failed() -> Self {
        Self {
            secretary_response: APOLOGY.to_string(),
            task_type: TaskType::Error,
            instructions: None,
            next_step: NextStep::Error,
            request_id: None,
            time_estimate: None,
            bot_result: None,
        }
    }
}

/// Parsed brain decision.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainReply {
    pub task_type: TaskType,
    pub instructions: String,
    pub response: String,
    pub time_estimate: String,
}

/// Classification-plus-LLM stage.
pub struct Brain {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn DocumentStore>,
    smart_core: SmartCore,
    ids: Arc<RequestIdGenerator>,
}

impl Brain {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn DocumentStore>,
        ids: Arc<RequestIdGenerator>,
    ) -> Self {
        let smart_core = SmartCore::new(Arc::clone(&llm), Arc::clone(&store));
        Self {
            llm,
            store,
            smart_core,
            ids,
        }
    }

    /// Analyze a message and, when warranted, dispatch it.
    ///
    /// Only an unroutable dispatch is returned as an error.
    pub async fn analyze(
        &self,
        message: &str,
        user_id: &str,
        analysis: &MessageAnalysis,
    ) -> Result<BrainOutcome, DispatchError> {
        info!(user_id, "Brain analyzing request");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_brain_system_prompt()),
            ChatMessage::user(build_brain_user_prompt(message, user_id, analysis)),
        ])
        .with_temperature(BRAIN_TEMPERATURE)
        .with_max_tokens(BRAIN_MAX_TOKENS);

        let raw = match self.llm.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(error = %e, "Brain LLM call failed");
                return Ok(BrainOutcome::failed());
            }
        };

        let reply = parse_brain_reply(&raw, message);
        let request_id = self.ids.next();
        debug!(%request_id, task_type = %reply.task_type, "Brain decision parsed");

        let record = AnalysisRecord {
            request_id,
            original_message: message.to_string(),
            user_id: user_id.to_string(),
            task_type: reply.task_type.clone(),
            instructions: reply.instructions.clone(),
            response: reply.response.clone(),
            time_estimate: reply.time_estimate.clone(),
            status: AnalysisStatus::Analyzed,
            timestamp: Utc::now(),
            smart_core_step: None,
            result: None,
            error: None,
            updated_at: None,
            completed_at: None,
        };
        if let Err(e) = self
            .store
            .put_record(Collection::BrainAnalysis, &request_id.key(), &record)
            .await
        {
            warn!(%request_id, error = %e, "Failed to save analysis record");
        }

        let (next_step, bot_result) = if reply.task_type.is_dispatchable() {
            match self
                .smart_core
                .coordinate(request_id, &reply.task_type, &reply.instructions)
                .await
            {
                Ok(result) => (NextStep::SmartCore, Some(result)),
                Err(DispatchError::Bot { bot, source }) => {
                    warn!(%request_id, bot = %bot, error = %source, "Dispatch failed on bot LLM call");
                    return Ok(BrainOutcome::failed());
                }
                Err(e) => return Err(e),
            }
        } else {
            if let Err(e) = self
                .store
                .merge(
                    Collection::BrainAnalysis,
                    &request_id.key(),
                    json!({
                        "status": AnalysisStatus::Completed,
                        "completedAt": Utc::now(),
                    }),
                )
                .await
            {
                warn!(%request_id, error = %e, "Failed to complete analysis record");
            }
            (NextStep::Completed, None)
        };

        info!(%request_id, next_step = next_step.as_str(), "Brain finished");

        Ok(BrainOutcome {
            secretary_response: reply.response,
            task_type: reply.task_type,
            instructions: Some(reply.instructions),
            next_step,
            request_id: Some(request_id),
            time_estimate: Some(reply.time_estimate),
            bot_result,
        })
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_brain_system_prompt() -> String {
    "أنت المخ في منظومة سُروح. دورك:\n\
     1. تحليل الطلبات بعمق وفهم المطلوب بالضبط\n\
     2. تحديد نوع المهمة:\n\
        - برمجة (code) → للمبرمج\n\
        - تصميم (design) → للمصمم\n\
        - تطوير متكامل (development) → للمطور الكامل\n\
        - إدارة وتنظيم (management) → مباشر من المخ\n\
     3. كتابة تعليمات واضحة للمنسق الذكي\n\
     4. صياغة رد لسُروح بلهجة أبو شام\n\n\
     قواعد الرد:\n\
     - لهجة شامية طبيعية\n\
     - وضوح تام في التعليمات\n\
     - توقعات واقعية للوقت والجهد"
        .to_string()
}

fn build_brain_user_prompt(message: &str, user_id: &str, analysis: &MessageAnalysis) -> String {
    let mut prompt = String::with_capacity(512 + message.len());
    prompt.push_str(&format!("طلب من {user_id}: {message}\n\n"));

    let mut signals = Vec::new();
    if analysis.action_required {
        signals.push("يحتاج تنفيذ");
    }
    if analysis.urgency == crate::pipeline::classifier::Urgency::Urgent {
        signals.push("عاجل");
    }
    if !signals.is_empty() {
        prompt.push_str(&format!("ملاحظات: {}\n\n", signals.join("، ")));
    }

    prompt.push_str(
        "حلل هالطلب وجاوب فقط بكائن JSON بهالشكل:\n\
         {\"type\": \"code|design|development|management\", \"instructions\": \"...\", \
         \"response\": \"...\", \"time_estimate\": \"...\"}\n\
         - type: نوع المهمة\n\
         - instructions: التعليمات للمنسق الذكي\n\
         - response: رد لأبو شام\n\
         - time_estimate: تقدير الوقت المطلوب",
    );
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Structured brain decision.
#[derive(Debug, Default, Deserialize)]
struct StructuredReply {
    #[serde(default, rename = "type", alias = "task_type", alias = "taskType")]
    task_type: Option<String>,
    #[serde(default)]
    instructions: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default, alias = "timeEstimate")]
    time_estimate: Option<String>,
}

impl StructuredReply {
    fn is_empty(&self) -> bool {
        [&self.task_type, &self.instructions, &self.response, &self.time_estimate]
            .iter()
            .all(|f| f.as_deref().is_none_or(|v| v.trim().is_empty()))
    }
}

/// `LABEL: value` lines, tolerating markdown decoration around the label.
static LABEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s*_#>\-]*(TYPE|INSTRUCTIONS|RESPONSE|TIME_ESTIMATE)[\s*_]*:(.*)$")
        .expect("label regex is valid")
});

/// Parse a brain reply, filling in defaults for anything missing.
pub fn parse_brain_reply(raw: &str, message: &str) -> BrainReply {
    let structured = parse_structured(raw).unwrap_or_else(|| parse_labeled(raw));

    let non_empty = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    BrainReply {
        task_type: TaskType::from_label(
            structured
                .task_type
                .as_deref()
                .and_then(|t| t.lines().next())
                .unwrap_or_default(),
        ),
        instructions: non_empty(structured.instructions).unwrap_or_else(|| raw.trim().to_string()),
        response: non_empty(structured.response).unwrap_or_else(|| acknowledgement(message)),
        time_estimate: non_empty(structured.time_estimate)
            .unwrap_or_else(|| DEFAULT_TIME_ESTIMATE.to_string()),
    }
}

/// Read the first JSON value in the reply, ignoring whatever follows it.
fn parse_structured(raw: &str) -> Option<StructuredReply> {
    let body = json_start(raw)?;
    let reply = serde_json::Deserializer::from_str(body)
        .into_iter::<StructuredReply>()
        .next()?
        .ok()?;
    (!reply.is_empty()).then_some(reply)
}

#[derive(Debug, Clone, Copy)]
enum Label {
    Type,
    Instructions,
    Response,
    TimeEstimate,
}

impl StructuredReply {
    fn slot(&mut self, label: Label) -> &mut Option<String> {
        match label {
            Label::Type => &mut self.task_type,
            Label::Instructions => &mut self.instructions,
            Label::Response => &mut self.response,
            Label::TimeEstimate => &mut self.time_estimate,
        }
    }
}

/// Scan for labeled lines. A label's value runs until the next label.
fn parse_labeled(raw: &str) -> StructuredReply {
    let mut reply = StructuredReply::default();
    let mut current: Option<Label> = None;

    for line in raw.lines() {
        if let Some(caps) = LABEL_LINE.captures(line) {
            let label = match &caps[1] {
                "TYPE" => Label::Type,
                "INSTRUCTIONS" => Label::Instructions,
                "RESPONSE" => Label::Response,
                _ => Label::TimeEstimate,
            };
            let slot = reply.slot(label);
            // First occurrence of a label wins.
            if slot.is_some() {
                current = None;
                continue;
            }
            let value = caps
                .get(2)
                .map(|m| m.as_str().trim().trim_matches('*').trim())
                .unwrap_or_default();
            *slot = Some(value.to_string());
            current = Some(label);
        } else if let Some(label) = current
            && let Some(existing) = reply.slot(label).as_mut()
        {
            let line = line.trim();
            if !line.is_empty() {
                if !existing.is_empty() {
                    existing.push('\n');
                }
                existing.push_str(line);
            }
        }
    }
    reply
}

/// Text from the first `{`, preferring one inside a ```json fence.
fn json_start(text: &str) -> Option<&str> {
    let from = text.find("```json").map_or(0, |i| i + 7);
    let start = from + text[from..].find('{')?;
    Some(&text[start..])
}
