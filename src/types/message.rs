//! Messages exchanged between Sender and Receiver

use serde::{Deserialize, Serialize};

use crate::types::{GlyphCode, NegotiationError};
use crate::SENTINEL;

/// Glyph code of a known character the Receiver may use as context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphHint {
    /// Character index in the poem
    pub position: usize,
    /// Code of the character at that position
    pub code: GlyphCode,
}

/// Poem with exactly one character replaced by the sentinel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkedMessage {
    /// Poem text with the sentinel in place
    pub text: String,
    /// Character index of the sentinel
    pub position: usize,
    /// Codes of every other known character
    pub hints: Vec<GlyphHint>,
}

impl MarkedMessage {
    /// Characters of the marked text
    pub fn chars(&self) -> Vec<char> {
        self.text.chars().collect()
    }

    /// Number of sentinels in the text (always 1 for a well-formed message)
    pub fn sentinel_count(&self) -> usize {
        self.text.chars().filter(|&c| c == SENTINEL).count()
    }

    /// Visible characters, i.e. everything but the sentinel
    pub fn visible(&self) -> impl Iterator<Item = char> + '_ {
        self.text.chars().filter(|&c| c != SENTINEL)
    }

    /// Put `candidate` into the masked slot
    pub fn fill(&self, candidate: char) -> Reconstruction {
        let poem = self
            .text
            .chars()
            .enumerate()
            .map(|(i, c)| if i == self.position { candidate } else { c })
            .collect();
        Reconstruction {
            poem,
            position: self.position,
            character: candidate,
        }
    }

    /// Text with hinted characters shown as their glyph keys, e.g. `[1-2-3]`
    pub fn render_with_hints(&self) -> String {
        let mut out = String::new();
        for (i, c) in self.text.chars().enumerate() {
            match self.hints.iter().find(|h| h.position == i) {
                Some(hint) => {
                    out.push('[');
                    out.push_str(&hint.code.key());
                    out.push(']');
                }
                None => out.push(c),
            }
        }
        out
    }
}

/// What the Sender keeps back: the true character and its vector
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedTarget {
    /// The masked character
    pub character: char,
    /// Its character index in the poem
    pub position: usize,
    /// Its raw embedding vector
    pub vector: Vec<f32>,
}

/// Why a negotiation was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every non-punctuation character is already in the registry or corrections
    AllCharactersKnown,
}

impl SkipReason {
    /// Friendly message for users
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AllCharactersKnown => {
                "Every character of this poem already has a glyph. Nothing new to create."
            }
        }
    }
}

/// Result of masking
#[derive(Debug, Clone)]
pub enum MaskOutcome {
    /// One character masked
    Marked {
        message: MarkedMessage,
        target: MaskedTarget,
    },
    /// Nothing to negotiate
    Skip(SkipReason),
}

/// Ground truth handed over by the Sender when revealing
#[derive(Debug, Clone, Default)]
pub struct Feedback {
    pub character: Option<char>,
    pub vector: Vec<f32>,
}

impl Feedback {
    /// Check the feedback carries a character and a usable vector
    pub fn verified(self, dimension: usize) -> Result<(char, Vec<f32>), NegotiationError> {
        let character = self.character.ok_or_else(|| {
            NegotiationError::DataIntegrity("revelation carries no target character".into())
        })?;
        if character == SENTINEL {
            return Err(NegotiationError::DataIntegrity(
                "revelation carries the sentinel instead of a character".into(),
            ));
        }
        if self.vector.is_empty() {
            return Err(NegotiationError::DataIntegrity(format!(
                "revelation for {:?} carries no vector",
                character
            )));
        }
        if self.vector.len() != dimension {
            return Err(NegotiationError::DataIntegrity(format!(
                "revelation vector for {:?} has dimension {}, expected {}",
                character,
                self.vector.len(),
                dimension
            )));
        }
        if self.vector.iter().any(|v| !v.is_finite()) {
            return Err(NegotiationError::DataIntegrity(format!(
                "revelation vector for {:?} is not finite",
                character
            )));
        }
        Ok((character, self.vector))
    }
}

/// A full poem as reconstructed by the Receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconstruction {
    /// Poem with the guessed character in the masked slot
    pub poem: String,
    /// Index of the masked slot
    pub position: usize,
    /// Character placed in the slot
    pub character: char,
}
