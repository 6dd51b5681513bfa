//! Keyword classifier: coarse labels for a chat message without an LLM call.
//!
//! Plain substring containment on the lowercased text. Within each dimension
//! the first matching branch wins, in the order the lists appear here. Never
//! fails: unmatched text gets the neutral defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

const WORK_KEYWORDS: &[&str] = &["شغل", "عمل", "مشروع", "اجتماع"];
const PERSONAL_KEYWORDS: &[&str] = &["أهل", "بيت", "عائلة"];
const SAD_KEYWORDS: &[&str] = &["تعبان", "زعلان", "مضايق"];
const STRESSED_KEYWORDS: &[&str] = &["متوتر", "قلقان", "خايف"];
const URGENT_KEYWORDS: &[&str] = &["عاجل", "سريع", "ضروري"];

const CODE_KEYWORDS: &[&str] = &["كود", "برمجة", "api", "function", "code"];
const DESIGN_KEYWORDS: &[&str] = &["تصميم", "شعار", "واجهة", "ui", "design", "logo"];
const DEVELOPMENT_KEYWORDS: &[&str] = &["موقع", "تطبيق", "برنامج", "نظام", "website", "app"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    #[default]
    General,
    Work,
    Personal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Sad,
    Stressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    #[default]
    Chat,
    Business,
}

/// Coarse classification of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAnalysis {
    pub context: Context,
    pub emotion: Emotion,
    pub urgency: Urgency,
    pub intent: Intent,
    pub action_required: bool,
}

pub(crate) fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Classify a message by keyword containment.
pub fn analyze_message(text: &str) -> MessageAnalysis {
    let text = text.to_lowercase();
    let mut analysis = MessageAnalysis::default();

    if contains_any(&text, WORK_KEYWORDS) {
        analysis.context = Context::Work;
        analysis.intent = Intent::Business;
        analysis.action_required = true;
    } else if contains_any(&text, PERSONAL_KEYWORDS) {
        analysis.context = Context::Personal;
    }

    if contains_any(&text, SAD_KEYWORDS) {
        analysis.emotion = Emotion::Sad;
    } else if contains_any(&text, STRESSED_KEYWORDS) {
        analysis.emotion = Emotion::Stressed;
    }

    if contains_any(&text, URGENT_KEYWORDS) {
        analysis.urgency = Urgency::Urgent;
        analysis.action_required = true;
    }

    analysis
}

/// Task category used to pick a bot.
///
/// Serialized as its plain label. Labels outside the closed set are kept in
/// `Other` and never dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    Code,
    Design,
    Development,
    Management,
    Error,
    Other(String),
}

impl TaskType {
    /// Normalize a label as an LLM might write it (`code`, `[Design]`, `برمجة`).
    /// An empty label means management.
    pub fn from_label(label: &str) -> Self {
        let cleaned = label
            .trim()
            .trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')' | '"' | '\'' | '`' | '*' | '.'))
            .trim()
            .to_lowercase();

        match cleaned.as_str() {
            "" | "management" | "إدارة" | "ادارة" => Self::Management,
            "code" | "برمجة" => Self::Code,
            "design" | "تصميم" => Self::Design,
            "development" | "تطوير" | "تطوير متكامل" => Self::Development,
            "error" => Self::Error,
            _ => Self::Other(cleaned),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Code => "code",
            Self::Design => "design",
            Self::Development => "development",
            Self::Management => "management",
            Self::Error => "error",
            Self::Other(label) => label,
        }
    }

    /// Whether Smart Core hands this task to a bot.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Code | Self::Design | Self::Development)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TaskType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<TaskType> for String {
    fn from(task: TaskType) -> Self {
        task.as_str().to_string()
    }
}

/// Keyword task hint: code, then design, then development, else management.
pub fn classify_task(text: &str) -> TaskType {
    let text = text.to_lowercase();
    if contains_any(&text, CODE_KEYWORDS) {
        TaskType::Code
    } else if contains_any(&text, DESIGN_KEYWORDS) {
        TaskType::Design
    } else if contains_any(&text, DEVELOPMENT_KEYWORDS) {
        TaskType::Development
    } else {
        TaskType::Management
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_keyword_sets_work_context_and_action() {
        for text in ["عندي شغل كتير", "بدي أحضر اجتماع", "مشروع جديد"] {
            let a = analyze_message(text);
            assert_eq!(a.context, Context::Work, "{text}");
            assert_eq!(a.intent, Intent::Business);
            assert!(a.action_required);
        }
    }

    #[test]
    fn no_keyword_falls_back_to_defaults() {
        let a = analyze_message("hello there");
        assert_eq!(a.context, Context::General);
        assert_eq!(a.emotion, Emotion::Neutral);
        assert_eq!(a.urgency, Urgency::Normal);
        assert_eq!(a.intent, Intent::Chat);
        assert!(!a.action_required);
        assert_eq!(analyze_message(""), MessageAnalysis::default());
    }

    #[test]
    fn work_wins_over_personal() {
        let a = analyze_message("شغل البيت");
        assert_eq!(a.context, Context::Work);
    }

    #[test]
    fn personal_context_does_not_require_action() {
        let a = analyze_message("رايح عند أهلي");
        assert_eq!(a.context, Context::Personal);
        assert!(!a.action_required);
    }

    #[test]
    fn sad_wins_over_stressed() {
        assert_eq!(analyze_message("تعبان ومتوتر").emotion, Emotion::Sad);
        assert_eq!(analyze_message("أنا قلقان").emotion, Emotion::Stressed);
    }

    #[test]
    fn urgent_sets_action_required() {
        let a = analyze_message("موضوع ضروري");
        assert_eq!(a.urgency, Urgency::Urgent);
        assert!(a.action_required);
        assert_eq!(a.context, Context::General);
    }

    #[test]
    fn analysis_serializes_camel_case() {
        let json = serde_json::to_value(analyze_message("شغل عاجل")).unwrap();
        assert_eq!(json["context"], "work");
        assert_eq!(json["urgency"], "urgent");
        assert_eq!(json["actionRequired"], true);
    }

    #[test]
    fn task_labels_normalize() {
        assert_eq!(TaskType::from_label("code"), TaskType::Code);
        assert_eq!(TaskType::from_label(" [Design] "), TaskType::Design);
        assert_eq!(TaskType::from_label("**development**"), TaskType::Development);
        assert_eq!(TaskType::from_label("برمجة"), TaskType::Code);
        assert_eq!(TaskType::from_label(""), TaskType::Management);
        assert_eq!(
            TaskType::from_label("Marketing"),
            TaskType::Other("marketing".into())
        );
    }

    #[test]
    fn only_three_task_types_dispatch() {
        assert!(TaskType::Code.is_dispatchable());
        assert!(TaskType::Design.is_dispatchable());
        assert!(TaskType::Development.is_dispatchable());
        assert!(!TaskType::Management.is_dispatchable());
        assert!(!TaskType::Error.is_dispatchable());
        assert!(!TaskType::Other("general".into()).is_dispatchable());
    }

    #[test]
    fn task_type_serializes_as_label() {
        assert_eq!(serde_json::to_value(TaskType::Error).unwrap(), "error");
        let parsed: TaskType = serde_json::from_value(serde_json::json!("design")).unwrap();
        assert_eq!(parsed, TaskType::Design);
    }

    #[test]
    fn classify_task_keyword_order() {
        assert_eq!(classify_task("اكتبلي كود بايثون"), TaskType::Code);
        assert_eq!(classify_task("بدي تصميم شعار"), TaskType::Design);
        assert_eq!(classify_task("بدي موقع تجاري"), TaskType::Development);
        assert_eq!(classify_task("Build an API for the app"), TaskType::Code);
        assert_eq!(classify_task("مرحبا"), TaskType::Management);
    }
}
