use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::classifier::IntentClassifier;
use crate::error::Result;
use crate::model::OutcomeKind;
use crate::resolver::AnswerResolver;
use crate::storage::KnowledgeRepository;

/// A labelled question with the outcome the pipeline should produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    pub case_id: String,
    pub question: String,
    pub expected: OutcomeKind,
    #[serde(default)]
    pub expected_intent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub case_id: String,
    pub passed: bool,
    pub actual: OutcomeKind,
    pub actual_intent: Option<String>,
    pub confidence: f32,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f32,
    pub outcomes: Vec<EvalOutcome>,
}

impl EvalSummary {
    pub fn meets(&self, required_pass_rate: f32) -> bool {
        self.pass_rate >= required_pass_rate
    }
}

pub fn case_passed(case: &EvalCase, actual: OutcomeKind, actual_intent: Option<&str>) -> bool {
    if case.expected != actual {
        return false;
    }

    match case.expected_intent.as_deref() {
        Some(expected) => actual_intent == Some(expected),
        None => true,
    }
}

/// Runs every case through the resolver. A store failure aborts the run.
pub async fn evaluate_cases<R, C>(
    resolver: &AnswerResolver<R, C>,
    cases: &[EvalCase],
) -> Result<EvalSummary>
where
    R: KnowledgeRepository,
    C: IntentClassifier,
{
    let mut outcomes = Vec::with_capacity(cases.len());

    for case in cases {
        let start = Instant::now();
        let outcome = resolver.resolve(&case.question).await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let actual = outcome.kind();
        let actual_intent = outcome.intent().map(str::to_string);
        let passed = case_passed(case, actual, actual_intent.as_deref());

        outcomes.push(EvalOutcome {
            case_id: case.case_id.clone(),
            passed,
            actual,
            actual_intent,
            confidence: outcome.confidence(),
            latency_ms,
        });
    }

    let total = outcomes.len();
    let passed = outcomes.iter().filter(|o| o.passed).count();
    let failed = total.saturating_sub(passed);
    let pass_rate = if total == 0 {
        0.0
    } else {
        passed as f32 / total as f32
    };

    Ok(EvalSummary {
        total,
        passed,
        failed,
        pass_rate,
        outcomes,
    })
}
