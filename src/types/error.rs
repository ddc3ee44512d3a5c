//! Error taxonomy
//!
//! Skipping is not an error and never appears here: see `Negotiation::Skipped`.

use thiserror::Error;

use crate::types::ReasonCode;

/// Generic message shown to users for any failure that is not a skip
pub const GENERIC_FAILURE_MESSAGE: &str =
    "The glyph could not be created this time. Please try again later.";

/// Failures of the embedding gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("token {0:?} is not in the embedding vocabulary")]
    UnknownToken(char),

    #[error("cannot embed empty text")]
    EmptyText,

    #[error("vector has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector carries a non-finite component")]
    NonFinite,

    #[error("projection is degenerate: {0}")]
    Projection(String),

    #[error("vocabulary is invalid: {0}")]
    InvalidVocabulary(String),

    #[error("vocabulary file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("vocabulary file malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// Fatal outcomes of a negotiation call
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("invalid poem: {0}")]
    InvalidInput(String),

    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("embedding gateway failure: {0}")]
    Gateway(#[from] GatewayError),
}

impl NegotiationError {
    /// Reason code for logs and API payloads
    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::InvalidInput(_) => ReasonCode::R401_INVALID_INPUT,
            Self::DataIntegrity(_) => ReasonCode::R402_DATA_INTEGRITY,
            Self::Gateway(_) => ReasonCode::R403_GATEWAY_FAILURE,
        }
    }

    /// Message safe to show to a user. Details go to the log only.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(detail) => format!("The poem was rejected: {}", detail),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Failures reading or writing the glyph registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("registry record for {key:?} is malformed: {detail}")]
    MalformedRecord { key: String, detail: String },
}

impl RegistryError {
    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::Io(_) => ReasonCode::R501_REGISTRY_STORAGE,
            Self::Format(_) => ReasonCode::R502_REGISTRY_FORMAT,
            Self::MalformedRecord { .. } => ReasonCode::R503_RECORD_MALFORMED,
        }
    }
}

/// Failures loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file malformed: {0}")]
    Format(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn reason(&self) -> ReasonCode {
        ReasonCode::R504_CONFIG_INVALID
    }
}
