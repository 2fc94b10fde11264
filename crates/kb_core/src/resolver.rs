use tracing::{debug, info};

use crate::classifier::IntentClassifier;
use crate::config::DEFAULT_THRESHOLD;
use crate::error::Result;
use crate::model::ResolutionOutcome;
use crate::storage::KnowledgeRepository;

/// Turns user text into an answer or a fallback outcome.
///
/// Pipeline: trim, classify, confidence gate, then look up the first active
/// entry whose intent matches. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct AnswerResolver<R, C> {
    repository: R,
    classifier: C,
    threshold: f32,
}

impl<R, C> AnswerResolver<R, C>
where
    R: KnowledgeRepository,
    C: IntentClassifier,
{
    pub fn new(repository: R, classifier: C) -> Self {
        Self {
            repository,
            classifier,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Only a knowledge store failure is returned as `Err`; classifier
    /// trouble surfaces as [`ResolutionOutcome::LowConfidence`].
    pub async fn resolve(&self, text: &str) -> Result<ResolutionOutcome> {
        let text = text.trim();
        if text.is_empty() {
            debug!("empty question, skipping classification");
            return Ok(ResolutionOutcome::EmptyInput);
        }

        let classification = self.classifier.classify(text).await;
        let intent = classification.intent;
        let confidence = classification.confidence;

        if !classification.succeeded || confidence < self.threshold {
            info!(
                %intent,
                confidence,
                succeeded = classification.succeeded,
                threshold = self.threshold,
                "classification below confidence gate"
            );
            return Ok(ResolutionOutcome::LowConfidence { intent, confidence });
        }

        let entries = self.repository.list_active().await?;
        // Duplicate active intents are not expected; the first in store order wins.
        let Some(entry) = entries.into_iter().find(|e| e.intent == intent) else {
            info!(%intent, confidence, "no active knowledge for intent");
            return Ok(ResolutionOutcome::NoMatchingKnowledge { intent, confidence });
        };

        info!(%intent, confidence, entry_id = entry.id, "resolved answer");
        Ok(ResolutionOutcome::Resolved {
            answer: entry.answer,
            intent,
            confidence,
        })
    }
}
