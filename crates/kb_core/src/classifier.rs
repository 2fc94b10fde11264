use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::error::{KbError, Result};
use crate::model::ClassificationResult;

/// Assigns an intent to a piece of user text.
///
/// Implementations are total: transport or format problems are reported as
/// [`ClassificationResult::failure`], never as an error.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> ClassificationResult;
}

#[async_trait]
impl<T: IntentClassifier + ?Sized> IntentClassifier for Arc<T> {
    async fn classify(&self, text: &str) -> ClassificationResult {
        (**self).classify(text).await
    }
}

#[derive(Debug, Error)]
enum NluFailure {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("non-JSON response (content-type '{0}')")]
    NotJson(String),

    #[error("response carries no intent name")]
    MissingIntent,
}

#[derive(Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
}

/// HTTP adapter for an NLU parse endpoint (`POST {"text": ...}`).
#[derive(Debug, Clone)]
pub struct NluClassifier {
    client: reqwest::Client,
    url: String,
}

impl NluClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KbError::InvalidConfig(format!("build NLU client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Self::new(config.nlu_url.clone(), config.classifier_timeout)
    }

    async fn parse(&self, text: &str) -> std::result::Result<ClassificationResult, NluFailure> {
        let response = self
            .client
            .post(&self.url)
            .json(&ParseRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NluFailure::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.contains("application/json") {
            return Err(NluFailure::NotJson(content_type));
        }

        let payload: Value = response.json().await?;
        parse_nlu_payload(&payload).ok_or(NluFailure::MissingIntent)
    }
}

#[async_trait]
impl IntentClassifier for NluClassifier {
    async fn classify(&self, text: &str) -> ClassificationResult {
        match self.parse(text).await {
            Ok(result) => {
                debug!(intent = %result.intent, confidence = result.confidence, "NLU classified text");
                result
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "NLU classification failed, using fallback");
                ClassificationResult::failure()
            }
        }
    }
}

/// Reads `intent.name` and `intent.confidence` out of an NLU parse response.
///
/// Returns `None` when the intent name is absent or empty. Confidence may be a
/// number or a numeric string; anything else reads as 0.0. Values are clamped
/// into [0, 1].
pub fn parse_nlu_payload(payload: &Value) -> Option<ClassificationResult> {
    let intent = payload.get("intent")?;
    let name = intent
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())?;

    let raw = match intent.get("confidence") {
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(v) => v.as_f64().unwrap_or(0.0),
        None => 0.0,
    };
    let confidence = if raw.is_finite() {
        raw.clamp(0.0, 1.0) as f32
    } else {
        0.0
    };

    Some(ClassificationResult::success(name, confidence))
}
