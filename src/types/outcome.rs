//! Negotiation results

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::types::{GlyphCode, NegotiationState, ReasonCode, SkipReason};

/// One attempt of the retry loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRecord {
    /// 1-based attempt index
    pub attempt: usize,
    /// Character placed in the masked slot
    pub character: char,
    /// Did it match the masked character?
    pub correct: bool,
}

/// One entry of the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub state: NegotiationState,
    pub reason: ReasonCode,
}

/// Terminal result of a negotiation that produced a glyph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationOutcome {
    /// When the outcome was sealed
    pub timestamp: DateTime<Utc>,
    /// Poem the negotiation ran on
    pub poem: String,
    /// The negotiated character
    pub target_character: char,
    /// Its character index in `poem` (the normalized input)
    pub target_position: usize,
    /// Code assigned to the character
    pub glyph: GlyphCode,
    /// Raw embedding vector the code was projected from
    pub vector: Vec<f32>,
    /// Characters tried, in order
    pub attempts: Vec<char>,
    /// Per-attempt record, same order as `attempts`
    pub history: Vec<GuessRecord>,
    /// Receiver found the character unaided
    pub success: bool,
    /// CONVERGED or REVEALED
    pub state: NegotiationState,
    /// Receiver's final reconstruction (informed when revealed)
    pub final_reconstruction: String,
    /// Audit trail of state transitions
    pub trail: Vec<TransitionRecord>,
    /// Hex SHA-256 over the outcome fields, empty until sealed
    pub digest: String,
}

impl NegotiationOutcome {
    /// Number of attempts made
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// The poem with each attempted character in the target slot
    pub fn guess_poems(&self) -> Vec<String> {
        self.attempts
            .iter()
            .map(|&c| {
                self.poem
                    .chars()
                    .enumerate()
                    .map(|(i, orig)| if i == self.target_position { c } else { orig })
                    .collect()
            })
            .collect()
    }

    /// Guess path for display, e.g. `书 → 花 → 奇`
    pub fn guess_path(&self) -> String {
        self.attempts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Terminal reason code
    pub fn reason(&self) -> ReasonCode {
        if self.success {
            ReasonCode::R301_CONVERGED
        } else {
            ReasonCode::R302_REVEALED
        }
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "char={} | pos={} | glyph={} | state={} | attempts={} | path={} | reason={}",
            self.target_character,
            self.target_position,
            self.glyph.key(),
            self.state,
            self.attempt_count(),
            self.guess_path(),
            self.reason().code()
        )
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let headline = format!(
            "{} {} → {} | state={} | attempts={}",
            self.state.emoji(),
            self.target_character,
            self.glyph,
            self.state,
            self.attempt_count()
        );
        format!(
            "{}\n  path: {}\n  poem: {}",
            headline.color(self.state.color()).bold(),
            self.guess_path(),
            self.final_reconstruction
        )
    }
}

/// Result of a negotiation call that did not fail
#[derive(Debug, Clone)]
pub enum Negotiation {
    /// A glyph was assigned
    Concluded(NegotiationOutcome),
    /// Nothing new to negotiate
    Skipped(SkipReason),
}

impl Negotiation {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// The outcome, if one was concluded
    pub fn outcome(&self) -> Option<&NegotiationOutcome> {
        match self {
            Self::Concluded(outcome) => Some(outcome),
            Self::Skipped(_) => None,
        }
    }

    /// Take the outcome, if one was concluded
    pub fn into_outcome(self) -> Option<NegotiationOutcome> {
        match self {
            Self::Concluded(outcome) => Some(outcome),
            Self::Skipped(_) => None,
        }
    }
}
