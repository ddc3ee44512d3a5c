//! Negotiation configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::ConfigError;
use crate::{DEFAULT_BAND_SLACK, MAX_TRIES, MIN_POEM_CHARS, SAMPLE_QUOTA_MAX, SAMPLE_QUOTA_MIN};

/// Tunables of the negotiation protocol.
///
/// Missing fields in a config file fall back to the protocol defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Retry budget
    pub max_tries: usize,
    /// Lower bound of the sampler's random quota
    pub quota_min: usize,
    /// Upper bound of the sampler's random quota
    pub quota_max: usize,
    /// Relative slack of the transition band
    pub band_slack: f32,
    /// Minimum poem length in characters
    pub min_poem_chars: usize,
    /// Seed for reproducible runs; entropy when absent
    pub seed: Option<u64>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_tries: MAX_TRIES,
            quota_min: SAMPLE_QUOTA_MIN,
            quota_max: SAMPLE_QUOTA_MAX,
            band_slack: DEFAULT_BAND_SLACK,
            min_poem_chars: MIN_POEM_CHARS,
            seed: None,
        }
    }
}

impl NegotiationConfig {
    /// Load from a JSON file and validate
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the protocol cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tries == 0 {
            return Err(ConfigError::Invalid("max_tries must be at least 1".into()));
        }
        if self.quota_min == 0 {
            return Err(ConfigError::Invalid("quota_min must be at least 1".into()));
        }
        if self.quota_min > self.quota_max {
            return Err(ConfigError::Invalid(format!(
                "quota_min {} exceeds quota_max {}",
                self.quota_min, self.quota_max
            )));
        }
        if !self.band_slack.is_finite() || self.band_slack < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "band_slack must be a non-negative number, got {}",
                self.band_slack
            )));
        }
        if self.min_poem_chars == 0 {
            return Err(ConfigError::Invalid("min_poem_chars must be at least 1".into()));
        }
        Ok(())
    }
}
