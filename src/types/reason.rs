//! Reason codes for negotiation decisions, transitions and failures

use serde::{Deserialize, Serialize};

/// Reason codes for every transition and decision of a negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R1xx: Masking
    // =========================================================================
    /// Negotiation opened on a validated poem
    R100_NEGOTIATION_STARTED,
    /// Sender masked one novel character
    R101_TARGET_MASKED,
    /// Every character of the poem is already known
    R102_NOTHING_NEW,

    // =========================================================================
    // R2xx: Guessing
    // =========================================================================
    /// Receiver's unaided first guess
    R201_NAIVE_GUESS,
    /// Candidate popped from the transition pool
    R202_CANDIDATE_PROBED,
    /// Transition pool ran dry before the retry budget
    R203_POOL_EXHAUSTED,
    /// Guess did not match the masked character
    R204_GUESS_WRONG,

    // =========================================================================
    // R3xx: Terminal states
    // =========================================================================
    /// Receiver guessed the masked character
    R301_CONVERGED,
    /// Sender revealed the masked character
    R302_REVEALED,

    // =========================================================================
    // R4xx: Negotiation failures
    // =========================================================================
    /// Poem failed shape validation
    R401_INVALID_INPUT,
    /// Revelation or reconstruction was unusable
    R402_DATA_INTEGRITY,
    /// Embedding or projection call failed
    R403_GATEWAY_FAILURE,

    // =========================================================================
    // R5xx: Registry and configuration
    // =========================================================================
    /// Registry file could not be read or written
    R501_REGISTRY_STORAGE,
    /// Registry file is not valid JSON
    R502_REGISTRY_FORMAT,
    /// Registry record could not be migrated
    R503_RECORD_MALFORMED,
    /// Configuration rejected
    R504_CONFIG_INVALID,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R100_NEGOTIATION_STARTED => "R100_NEGOTIATION_STARTED",
            Self::R101_TARGET_MASKED => "R101_TARGET_MASKED",
            Self::R102_NOTHING_NEW => "R102_NOTHING_NEW",
            Self::R201_NAIVE_GUESS => "R201_NAIVE_GUESS",
            Self::R202_CANDIDATE_PROBED => "R202_CANDIDATE_PROBED",
            Self::R203_POOL_EXHAUSTED => "R203_POOL_EXHAUSTED",
            Self::R204_GUESS_WRONG => "R204_GUESS_WRONG",
            Self::R301_CONVERGED => "R301_CONVERGED",
            Self::R302_REVEALED => "R302_REVEALED",
            Self::R401_INVALID_INPUT => "R401_INVALID_INPUT",
            Self::R402_DATA_INTEGRITY => "R402_DATA_INTEGRITY",
            Self::R403_GATEWAY_FAILURE => "R403_GATEWAY_FAILURE",
            Self::R501_REGISTRY_STORAGE => "R501_REGISTRY_STORAGE",
            Self::R502_REGISTRY_FORMAT => "R502_REGISTRY_FORMAT",
            Self::R503_RECORD_MALFORMED => "R503_RECORD_MALFORMED",
            Self::R504_CONFIG_INVALID => "R504_CONFIG_INVALID",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R100_NEGOTIATION_STARTED => "Negotiation started",
            Self::R101_TARGET_MASKED => "Novel character masked",
            Self::R102_NOTHING_NEW => "Nothing new to negotiate",
            Self::R201_NAIVE_GUESS => "Receiver guessed unaided",
            Self::R202_CANDIDATE_PROBED => "Transition candidate probed",
            Self::R203_POOL_EXHAUSTED => "Transition pool exhausted",
            Self::R204_GUESS_WRONG => "Guess was wrong",
            Self::R301_CONVERGED => "Receiver guessed correctly",
            Self::R302_REVEALED => "Answer revealed to receiver",
            Self::R401_INVALID_INPUT => "Poem rejected",
            Self::R402_DATA_INTEGRITY => "Negotiation data unusable",
            Self::R403_GATEWAY_FAILURE => "Embedding gateway failed",
            Self::R501_REGISTRY_STORAGE => "Registry storage failed",
            Self::R502_REGISTRY_FORMAT => "Registry format invalid",
            Self::R503_RECORD_MALFORMED => "Registry record malformed",
            Self::R504_CONFIG_INVALID => "Configuration invalid",
        }
    }

    /// Does this code end a negotiation with a glyph?
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::R301_CONVERGED | Self::R302_REVEALED)
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
