//! Negotiation state definitions

use colored::Color;
use serde::{Deserialize, Serialize};

/// States of one negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationState {
    /// Poem accepted, nothing masked yet
    Start,
    /// Sender is choosing the character to negotiate
    Masking,
    /// Receiver is on attempt `attempt` (1-based)
    Guessing { attempt: usize },
    /// Receiver guessed the character unaided
    Converged,
    /// Sender had to reveal the character
    Revealed,
    /// Nothing new in the poem
    Skipped,
}

impl NegotiationState {
    /// Is this a state the negotiation cannot leave?
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converged | Self::Revealed | Self::Skipped)
    }

    /// Terminal color for display
    pub fn color(&self) -> Color {
        match self {
            Self::Start | Self::Masking => Color::BrightBlack,
            Self::Guessing { .. } => Color::Yellow,
            Self::Converged => Color::Green,
            Self::Revealed => Color::Magenta,
            Self::Skipped => Color::Cyan,
        }
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Start => "⏳",
            Self::Masking => "🎭",
            Self::Guessing { .. } => "🔶",
            Self::Converged => "✅",
            Self::Revealed => "📜",
            Self::Skipped => "⏭",
        }
    }
}

impl std::fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Masking => write!(f, "MASKING"),
            Self::Guessing { attempt } => write!(f, "GUESSING({})", attempt),
            Self::Converged => write!(f, "CONVERGED"),
            Self::Revealed => write!(f, "REVEALED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(NegotiationState::Converged.is_terminal());
        assert!(NegotiationState::Revealed.is_terminal());
        assert!(NegotiationState::Skipped.is_terminal());
        assert!(!NegotiationState::Guessing { attempt: 5 }.is_terminal());
        assert!(!NegotiationState::Masking.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(NegotiationState::Guessing { attempt: 2 }.to_string(), "GUESSING(2)");
        assert_eq!(NegotiationState::Revealed.to_string(), "REVEALED");
    }
}
