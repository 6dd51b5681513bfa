//! Smart Core: hands analyzed tasks to the matching bot and records progress.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::error::DispatchError;
use crate::llm::provider::LlmProvider;
use crate::pipeline::bots::{Bot, BotKind, BotResult};
use crate::pipeline::classifier::TaskType;
use crate::store::records::{AnalysisStatus, RequestId};
use crate::store::traits::{Collection, DocumentStore};

/// Dispatcher from task types to bots.
pub struct SmartCore {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn DocumentStore>,
}

impl SmartCore {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { llm, store }
    }

    /// Run `instructions` through the bot for `task_type`.
    ///
    /// The analysis record moves to `coordinating`, then `completed` with the
    /// bot's result, or `error` if the bot's LLM call fails. A task type with
    /// no bot goes straight to `error`. Record updates
    /// that fail are logged and do not stop the task.
    pub async fn coordinate(
        &self,
        request_id: RequestId,
        task_type: &TaskType,
        instructions: &str,
    ) -> Result<BotResult, DispatchError> {
        info!(%request_id, %task_type, "Smart core coordinating task");

        let Some(kind) = BotKind::for_task(task_type) else {
            let err = DispatchError::UnknownBot {
                task_type: task_type.to_string(),
            };
            error!(%request_id, %task_type, "No bot for task");
            self.update_record(
                request_id,
                json!({
                    "status": AnalysisStatus::Error,
                    "smartCoreStep": "failed",
                    "error": err.to_string(),
                    "updatedAt": Utc::now(),
                }),
            )
            .await;
            return Err(err);
        };

        self.update_record(
            request_id,
            json!({
                "status": AnalysisStatus::Coordinating,
                "smartCoreStep": "started",
                "updatedAt": Utc::now(),
            }),
        )
        .await;

        let bot = Bot::new(kind, Arc::clone(&self.llm));

        match bot.execute(instructions).await {
            Ok(result) => {
                self.update_record(
                    request_id,
                    json!({
                        "status": AnalysisStatus::Completed,
                        "smartCoreStep": "completed",
                        "result": &result,
                        "completedAt": Utc::now(),
                    }),
                )
                .await;
                info!(%request_id, bot = kind.id(), "Task completed");
                Ok(result)
            }
            Err(e) => {
                error!(%request_id, bot = kind.id(), error = %e, "Bot failed");
                self.update_record(
                    request_id,
                    json!({
                        "status": AnalysisStatus::Error,
                        "smartCoreStep": "failed",
                        "error": e.to_string(),
                        "updatedAt": Utc::now(),
                    }),
                )
                .await;
                Err(DispatchError::Bot {
                    bot: kind.id().to_string(),
                    source: e,
                })
            }
        }
    }

    async fn update_record(&self, request_id: RequestId, fields: serde_json::Value) {
        if let Err(e) = self
            .store
            .merge(Collection::BrainAnalysis, &request_id.key(), fields)
            .await
        {
            warn!(%request_id, error = %e, "Failed to update analysis record");
        }
    }
}
