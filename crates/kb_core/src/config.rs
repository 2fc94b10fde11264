use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KbError, Result};

pub const DEFAULT_NLU_URL: &str = "http://127.0.0.1:5005/model/parse";
pub const DEFAULT_THRESHOLD: f32 = 0.45;
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUIRED_PASS_RATE: f32 = 0.85;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub nlu_url: String,
    pub threshold: f32,
    pub classifier_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            nlu_url: DEFAULT_NLU_URL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            classifier_timeout: DEFAULT_CLASSIFIER_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.nlu_url.trim().is_empty() {
            return Err(KbError::InvalidConfig("NLU url must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(KbError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.classifier_timeout.is_zero() {
            return Err(KbError::InvalidConfig(
                "classifier timeout must be > 0".to_string(),
            ));
        }
        if self.store_timeout.is_zero() {
            return Err(KbError::InvalidConfig("store timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ResolverConfig::default();
        assert_eq!(cfg.threshold, 0.45);
        assert_eq!(cfg.classifier_timeout, Duration::from_secs(10));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let cfg = ResolverConfig {
            threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(KbError::InvalidConfig(_))));

        let nan = ResolverConfig {
            threshold: f32::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let cfg = ResolverConfig {
            classifier_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
