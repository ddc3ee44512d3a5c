//! Shared knowledge of one negotiation

use std::collections::BTreeMap;

use crate::types::{GlyphCode, NegotiationError};

/// Durable character → glyph mapping as seen by a negotiation
pub type KnownMapping = BTreeMap<char, GlyphCode>;

/// Knowledge both agents read during one negotiation.
///
/// Holds a copy of the durable mapping plus the corrections the controller
/// records when ground truth is confirmed or revealed. Agents only ever get
/// `&SharedKnowledge`; the controller is the single writer.
#[derive(Debug, Clone, Default)]
pub struct SharedKnowledge {
    known: KnownMapping,
    corrections: BTreeMap<char, Vec<f32>>,
}

impl SharedKnowledge {
    /// Start a negotiation from a copy of the durable mapping
    pub fn new(known: KnownMapping) -> Self {
        Self {
            known,
            corrections: BTreeMap::new(),
        }
    }

    /// Glyph of a character already in the durable mapping
    pub fn lookup_known(&self, character: char) -> Option<GlyphCode> {
        self.known.get(&character).copied()
    }

    /// Is the character known either durably or through a correction?
    pub fn is_known(&self, character: char) -> bool {
        self.known.contains_key(&character) || self.corrections.contains_key(&character)
    }

    /// Correction vector recorded for a character
    pub fn correction(&self, character: char) -> Option<&[f32]> {
        self.corrections.get(&character).map(Vec::as_slice)
    }

    /// All corrections, ordered by character
    pub fn corrections(&self) -> impl Iterator<Item = (char, &[f32])> {
        self.corrections.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    /// Number of corrections recorded so far
    pub fn correction_count(&self) -> usize {
        self.corrections.len()
    }

    /// Record ground truth for a character.
    ///
    /// Re-recording the identical vector is a no-op; a different vector for
    /// the same character would let the agents diverge and is refused.
    pub fn record_correction(
        &mut self,
        character: char,
        vector: Vec<f32>,
    ) -> Result<(), NegotiationError> {
        if vector.is_empty() {
            return Err(NegotiationError::DataIntegrity(format!(
                "empty correction vector for {:?}",
                character
            )));
        }
        match self.corrections.get(&character) {
            Some(existing) if *existing == vector => Ok(()),
            Some(_) => Err(NegotiationError::DataIntegrity(format!(
                "conflicting correction for {:?}",
                character
            ))),
            None => {
                self.corrections.insert(character, vector);
                Ok(())
            }
        }
    }

    /// Size of the durable view
    pub fn known_len(&self) -> usize {
        self.known.len()
    }
}
