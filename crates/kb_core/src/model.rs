use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{KbError, Result};

/// One resolvable intent and the answer served for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: u64,
    pub intent: String,
    pub question: String,
    pub answer: String,
    pub is_active: bool,
    #[serde(default)]
    pub is_faq: bool,
    #[serde(default)]
    pub faq_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn validate(&self) -> Result<()> {
        if self.intent.trim().is_empty() {
            return Err(KbError::InvalidEntry("intent must not be empty".to_string()));
        }
        if self.question.trim().is_empty() {
            return Err(KbError::InvalidEntry(
                "question must not be empty".to_string(),
            ));
        }
        if self.answer.trim().is_empty() {
            return Err(KbError::InvalidEntry("answer must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Fields supplied when registering a new entry; the store assigns the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewKnowledge {
    pub intent: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub is_faq: bool,
    #[serde(default)]
    pub faq_category: Option<String>,
}

impl NewKnowledge {
    pub fn new(
        intent: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            question: question.into(),
            answer: answer.into(),
            is_faq: false,
            faq_category: None,
        }
    }

    pub fn into_entry(self, id: u64, now: DateTime<Utc>) -> Result<KnowledgeEntry> {
        let entry = KnowledgeEntry {
            id,
            intent: self.intent.trim().to_string(),
            question: self.question,
            answer: self.answer,
            is_active: true,
            is_faq: self.is_faq,
            faq_category: self.faq_category,
            created_at: now,
            updated_at: now,
        };
        entry.validate()?;
        Ok(entry)
    }
}

/// Absent → `None`, null → `Some(None)`, `"text"` → `Some(Some("text"))`.
pub fn deserialize_optional_nullable_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Option<String> = Option::deserialize(deserializer)?;
    Ok(Some(val))
}

/// Partial update: only the fields that are `Some` are written.
///
/// `faq_category` is two-level: `Some(None)` clears the category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePatch {
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub is_faq: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_nullable_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub faq_category: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl KnowledgePatch {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.intent.is_some() {
            fields.push("intent");
        }
        if self.question.is_some() {
            fields.push("question");
        }
        if self.answer.is_some() {
            fields.push("answer");
        }
        if self.is_faq.is_some() {
            fields.push("is_faq");
        }
        if self.faq_category.is_some() {
            fields.push("faq_category");
        }
        if self.is_active.is_some() {
            fields.push("is_active");
        }
        fields
    }

    /// Returns the patched copy of `entry`, leaving the original untouched
    /// when the result would be invalid.
    pub fn apply(&self, entry: &KnowledgeEntry, now: DateTime<Utc>) -> Result<KnowledgeEntry> {
        let mut next = entry.clone();
        if let Some(intent) = &self.intent {
            next.intent = intent.trim().to_string();
        }
        if let Some(question) = &self.question {
            next.question = question.clone();
        }
        if let Some(answer) = &self.answer {
            next.answer = answer.clone();
        }
        if let Some(is_faq) = self.is_faq {
            next.is_faq = is_faq;
        }
        if let Some(category) = &self.faq_category {
            next.faq_category = category.clone();
        }
        if let Some(is_active) = self.is_active {
            next.is_active = is_active;
        }
        next.validate()?;
        if !self.is_empty() {
            next.updated_at = now;
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: String,
    pub confidence: f32,
    pub succeeded: bool,
}

impl ClassificationResult {
    pub const FALLBACK_INTENT: &'static str = "nlu_fallback";

    pub fn success(intent: impl Into<String>, confidence: f32) -> Self {
        Self {
            intent: intent.into(),
            confidence,
            succeeded: true,
        }
    }

    pub fn failure() -> Self {
        Self {
            intent: Self::FALLBACK_INTENT.to_string(),
            confidence: 0.0,
            succeeded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Resolved {
        answer: String,
        intent: String,
        confidence: f32,
    },
    EmptyInput,
    LowConfidence {
        intent: String,
        confidence: f32,
    },
    NoMatchingKnowledge {
        intent: String,
        confidence: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Resolved,
    EmptyInput,
    LowConfidence,
    NoMatchingKnowledge,
}

pub const EMPTY_INPUT_MESSAGE: &str = "Please type a question so I can help you.";
pub const LOW_CONFIDENCE_MESSAGE: &str =
    "Sorry, I could not understand your question. Could you rephrase it?";
pub const NO_MATCHING_KNOWLEDGE_MESSAGE: &str =
    "No answer is registered for this question yet. Please contact an administrator.";

impl ResolutionOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Resolved { .. } => OutcomeKind::Resolved,
            Self::EmptyInput => OutcomeKind::EmptyInput,
            Self::LowConfidence { .. } => OutcomeKind::LowConfidence,
            Self::NoMatchingKnowledge { .. } => OutcomeKind::NoMatchingKnowledge,
        }
    }

    pub fn intent(&self) -> Option<&str> {
        match self {
            Self::Resolved { intent, .. }
            | Self::LowConfidence { intent, .. }
            | Self::NoMatchingKnowledge { intent, .. } => Some(intent),
            Self::EmptyInput => None,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Resolved { confidence, .. }
            | Self::LowConfidence { confidence, .. }
            | Self::NoMatchingKnowledge { confidence, .. } => *confidence,
            Self::EmptyInput => 0.0,
        }
    }

    /// The text shown to the user: the stored answer, or the fallback message.
    pub fn message(&self) -> &str {
        match self {
            Self::Resolved { answer, .. } => answer,
            Self::EmptyInput => EMPTY_INPUT_MESSAGE,
            Self::LowConfidence { .. } => LOW_CONFIDENCE_MESSAGE,
            Self::NoMatchingKnowledge { .. } => NO_MATCHING_KNOWLEDGE_MESSAGE,
        }
    }

    pub fn to_reply(&self) -> ChatReply {
        ChatReply {
            answer: self.message().to_string(),
            intent: self.intent().unwrap_or_default().to_string(),
            confidence: self.confidence(),
        }
    }
}

/// User-facing rendering of an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    pub intent: String,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> KnowledgeEntry {
        NewKnowledge::new("map_usage", "How do I use the map?", "Move the map...")
            .into_entry(1, Utc::now())
            .expect("valid entry")
    }

    #[test]
    fn new_entries_start_active_with_trimmed_intent() {
        let e = NewKnowledge::new("  map_usage ", "q", "a")
            .into_entry(7, Utc::now())
            .expect("valid");
        assert_eq!(e.id, 7);
        assert_eq!(e.intent, "map_usage");
        assert!(e.is_active);
        assert!(!e.is_faq);
        assert_eq!(e.created_at, e.updated_at);
    }

    #[test]
    fn new_entry_rejects_blank_answer() {
        let err = NewKnowledge::new("greet", "hi?", "   ")
            .into_entry(1, Utc::now())
            .unwrap_err();
        assert!(matches!(err, KbError::InvalidEntry(_)));
    }

    #[test]
    fn patch_sets_only_present_fields() {
        let original = entry();
        let later = original.created_at + chrono::Duration::seconds(5);
        let patch = KnowledgePatch {
            answer: Some("Drag with one finger.".to_string()),
            is_active: Some(false),
            ..Default::default()
        };

        let patched = patch.apply(&original, later).expect("apply");

        assert_eq!(patch.changed_fields(), vec!["answer", "is_active"]);
        assert_eq!(patched.answer, "Drag with one finger.");
        assert!(!patched.is_active);
        assert_eq!(patched.intent, original.intent);
        assert_eq!(patched.question, original.question);
        assert_eq!(patched.updated_at, later);
        assert_eq!(patched.created_at, original.created_at);
    }

    #[test]
    fn empty_patch_keeps_timestamp() {
        let original = entry();
        let patch = KnowledgePatch::default();
        assert!(patch.is_empty());
        let patched = patch.apply(&original, Utc::now()).expect("apply");
        assert_eq!(patched, original);
    }

    #[test]
    fn null_category_clears_and_absent_keeps() {
        let mut original = entry();
        original.faq_category = Some("maps".to_string());

        let keep: KnowledgePatch = serde_json::from_str(r#"{"answer": "Pinch to zoom."}"#).unwrap();
        assert_eq!(keep.faq_category, None);
        let kept = keep.apply(&original, Utc::now()).expect("apply");
        assert_eq!(kept.faq_category.as_deref(), Some("maps"));

        let clear: KnowledgePatch = serde_json::from_str(r#"{"faq_category": null}"#).unwrap();
        assert_eq!(clear.faq_category, Some(None));
        assert_eq!(clear.changed_fields(), vec!["faq_category"]);
        let cleared = clear.apply(&original, Utc::now()).expect("apply");
        assert_eq!(cleared.faq_category, None);

        let set: KnowledgePatch = serde_json::from_str(r#"{"faq_category": "billing"}"#).unwrap();
        let moved = set.apply(&original, Utc::now()).expect("apply");
        assert_eq!(moved.faq_category.as_deref(), Some("billing"));
    }

    #[test]
    fn invalid_patch_is_rejected() {
        let patch = KnowledgePatch {
            intent: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(patch.apply(&entry(), Utc::now()).is_err());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = ResolutionOutcome::LowConfidence {
            intent: "map_usage".to_string(),
            confidence: 0.3,
        };
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["outcome"], "low_confidence");
        assert_eq!(json["intent"], "map_usage");

        let empty = serde_json::to_value(ResolutionOutcome::EmptyInput).expect("serialize");
        assert_eq!(empty["outcome"], "empty_input");
    }

    #[test]
    fn reply_uses_answer_or_fallback_message() {
        let resolved = ResolutionOutcome::Resolved {
            answer: "Move the map...".to_string(),
            intent: "map_usage".to_string(),
            confidence: 0.93,
        };
        assert_eq!(resolved.to_reply().answer, "Move the map...");

        let missing = ResolutionOutcome::NoMatchingKnowledge {
            intent: "refund".to_string(),
            confidence: 0.8,
        };
        let reply = missing.to_reply();
        assert_eq!(reply.answer, NO_MATCHING_KNOWLEDGE_MESSAGE);
        assert_eq!(reply.intent, "refund");

        let empty = ResolutionOutcome::EmptyInput.to_reply();
        assert_eq!(empty.intent, "");
        assert_eq!(empty.confidence, 0.0);
    }
}
