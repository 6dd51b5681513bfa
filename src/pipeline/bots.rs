//! The three specialist bots Smart Core can hand a task to.
//!
//! Each bot is a fixed persona over the shared LLM provider: one call with the
//! persona as system prompt and the brain's instructions as user content.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::classifier::TaskType;

const BOT_MAX_TOKENS: u32 = 2048;
const BOT_TEMPERATURE: f32 = 0.4;

/// Bot identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotKind {
    CodeMaster,
    DesignGenius,
    FullStackPro,
}

impl BotKind {
    pub const ALL: [BotKind; 3] = [BotKind::CodeMaster, BotKind::DesignGenius, BotKind::FullStackPro];

    /// The bot responsible for a task type, if any.
    pub fn for_task(task_type: &TaskType) -> Option<Self> {
        match task_type {
            TaskType::Code => Some(Self::CodeMaster),
            TaskType::Design => Some(Self::DesignGenius),
            TaskType::Development => Some(Self::FullStackPro),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::CodeMaster => "code_master",
            Self::DesignGenius => "design_genius",
            Self::FullStackPro => "fullstack_pro",
        }
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            Self::CodeMaster => TaskType::Code,
            Self::DesignGenius => TaskType::Design,
            Self::FullStackPro => TaskType::Development,
        }
    }

    pub fn persona(&self) -> &'static str {
        match self {
            Self::CodeMaster => {
                "أنت المبرمج الخبير في منظومة سُروح. تكتب كود نظيف، مفهوم، وقابل للصيانة."
            }
            Self::DesignGenius => "أنت مصمم UI/UX خبير في منظومة سُروح. تصمم واجهات جميلة وعملية.",
            Self::FullStackPro => "أنت مطور Full-Stack خبير في منظومة سُروح. تبني تطبيقات متكاملة.",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::CodeMaster => "تم إنشاء الكود بنجاح! 💻",
            Self::DesignGenius => "تم إنشاء التصميم بنجاح! 🎨",
            Self::FullStackPro => "تم بناء الحل المتكامل بنجاح! 🏗️",
        }
    }
}

/// What a bot produced for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotResult {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub content: String,
    pub message: String,
    pub bot: BotKind,
}

/// A bot bound to an LLM provider.
pub struct Bot {
    kind: BotKind,
    llm: Arc<dyn LlmProvider>,
}

impl Bot {
    pub fn new(kind: BotKind, llm: Arc<dyn LlmProvider>) -> Self {
        Self { kind, llm }
    }

    /// Run the task described by `instructions`.
    pub async fn execute(&self, instructions: &str) -> Result<BotResult, LlmError> {
        info!(bot = self.kind.id(), "Bot started task");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.kind.persona()),
            ChatMessage::user(instructions),
        ])
        .with_temperature(BOT_TEMPERATURE)
        .with_max_tokens(BOT_MAX_TOKENS);

        let response = self.llm.complete(request).await?;

        info!(
            bot = self.kind.id(),
            output_tokens = response.output_tokens,
            "Bot finished task"
        );

        Ok(BotResult {
            task_type: self.kind.task_type(),
            content: response.content,
            message: self.kind.success_message().to_string(),
            bot: self.kind,
        })
    }
}
