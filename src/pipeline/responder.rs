//! Local responder: canned replies for low-value turns.
//!
//! The LLM is only called when a message looks complex or urgent; everything
//! else is answered from this fixed table.

use crate::pipeline::classifier::{MessageAnalysis, Urgency, contains_any};

/// Words that mark a request worth an LLM call.
const COMPLEX_KEYWORDS: &[&str] = &[
    "موقع", "تطبيق", "مشروع", "نظام", "برنامج", "تصميم", "شركة", "بناء", "إنشاء",
];

/// Reply when the brain's LLM call fails.
pub const APOLOGY: &str = "عذراً أبو شام، صار عندي خطأ في التحليل. جرب مرة تانية.";

/// Reply to an empty chat message.
pub const EMPTY_MESSAGE: &str = "شو بدك يا أبو شام؟ ما وصلني شي!";

/// Reply when a request fails outside the brain.
pub const SYSTEM_ERROR: &str = "عذراً أبو شام، حدث خطأ في النظام. جاري إصلاحه...";

/// Default acknowledgement when the LLM does not phrase one itself.
pub fn acknowledgement(message: &str) -> String {
    format!("تم استلام طلبك يا أبو شام: \"{message}\". عم أشتغل عليه!")
}

/// Ordered (keywords, reply) table; first hit wins.
const LOCAL_REPLIES: &[(&[&str], &str)] = &[
    (&["مرحبا", "أهلا", "السلام"], "أهلاً أبو شام! شو بدك اليوم؟"),
    (&["كيفك", "كيف حالك"], "الحمد لله أبو شام، كيفك إنت؟ شو أخبارك؟"),
    (&["شو أخبار", "شو عاملك"], "كله تمام، أنا هون أخدمك. إيش محتاج؟"),
    (&["تذكر", "فاكر"], "طبعاً بفتكر كل شي أبو شام. إيش بدك أتذكرلك؟"),
    (&["ساعد", "مساعدة"], "أكيد أبو شام! قلي شو بدك أساعدك فيه؟"),
];

const DEFAULT_REPLY: &str = "فهمت أبو شام. قلي أكتر عن الموضوع...";

/// Whether a message warrants the brain's LLM call.
pub fn should_use_ai(text: &str, analysis: &MessageAnalysis) -> bool {
    contains_any(&text.to_lowercase(), COMPLEX_KEYWORDS)
        || analysis.action_required
        || analysis.urgency == Urgency::Urgent
}

/// Canned reply for a message that skips the LLM.
pub fn local_response(text: &str) -> &'static str {
    let text = text.to_lowercase();
    LOCAL_REPLIES
        .iter()
        .find(|(keywords, _)| contains_any(&text, keywords))
        .map(|(_, reply)| *reply)
        .unwrap_or(DEFAULT_REPLY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classifier::analyze_message;

    fn routed_to_ai(text: &str) -> bool {
        should_use_ai(text, &analyze_message(text))
    }

    #[test]
    fn complex_keyword_uses_ai() {
        assert!(routed_to_ai("بدي موقع تجاري"));
        assert!(routed_to_ai("بدي تصميم لشركة"));
    }

    #[test]
    fn greeting_stays_local() {
        assert!(!routed_to_ai("مرحبا"));
        assert_eq!(local_response("مرحبا"), "أهلاً أبو شام! شو بدك اليوم؟");
    }

    #[test]
    fn urgent_or_work_uses_ai() {
        assert!(routed_to_ai("ضروري تساعدني"));
        assert!(routed_to_ai("عندي اجتماع"));
    }

    #[test]
    fn local_reply_table_order() {
        assert_eq!(
            local_response("كيف حالك اليوم"),
            "الحمد لله أبو شام، كيفك إنت؟ شو أخبارك؟"
        );
        assert_eq!(local_response("شو أخبارك"), "كله تمام، أنا هون أخدمك. إيش محتاج؟");
        assert_eq!(
            local_response("فاكر شو حكينا؟"),
            "طبعاً بفتكر كل شي أبو شام. إيش بدك أتذكرلك؟"
        );
        assert_eq!(local_response("بدي مساعدة"), "أكيد أبو شام! قلي شو بدك أساعدك فيه؟");
        // greeting beats help when both appear
        assert_eq!(local_response("مرحبا، بدي مساعدة"), "أهلاً أبو شام! شو بدك اليوم؟");
    }

    #[test]
    fn unknown_text_gets_default_reply() {
        assert_eq!(local_response("طقس حلو"), DEFAULT_REPLY);
        assert_eq!(local_response(""), DEFAULT_REPLY);
    }

    #[test]
    fn acknowledgement_echoes_message() {
        let ack = acknowledgement("بدي موقع");
        assert!(ack.contains("\"بدي موقع\""));
    }
}
