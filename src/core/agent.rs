//! Sender and Receiver roles
//!
//! Both agents read the same `SharedKnowledge`; neither writes it.

use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::debug;

use crate::core::gateway::{cosine_distance, EmbeddingGateway};
use crate::core::poem::{differing_positions, is_punctuation};
use crate::types::{
    Feedback, GlyphHint, MarkedMessage, MaskOutcome, MaskedTarget, NegotiationError,
    Reconstruction, SharedKnowledge, SkipReason,
};
use crate::SENTINEL;

/// Role that holds the poem, masks one character and scores guesses
#[derive(Debug)]
pub struct Sender<'g, G: ?Sized> {
    gateway: &'g G,
}

impl<'g, G: EmbeddingGateway + ?Sized> Sender<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    /// Positions the Sender may mask: not punctuation, not known
    pub fn eligible_positions(poem: &str, knowledge: &SharedKnowledge) -> Vec<usize> {
        poem.chars()
            .enumerate()
            .filter(|(_, c)| !is_punctuation(*c) && !knowledge.is_known(*c))
            .map(|(i, _)| i)
            .collect()
    }

    /// Mask one eligible character chosen uniformly at random
    pub fn mask(
        &self,
        poem: &str,
        knowledge: &SharedKnowledge,
        rng: &mut dyn RngCore,
    ) -> Result<MaskOutcome, NegotiationError> {
        let eligible = Self::eligible_positions(poem, knowledge);
        let position = match eligible.choose(rng) {
            Some(&position) => position,
            None => return Ok(MaskOutcome::Skip(SkipReason::AllCharactersKnown)),
        };

        let mut text = String::with_capacity(poem.len());
        let mut hints = Vec::new();
        let mut character = SENTINEL;
        for (i, c) in poem.chars().enumerate() {
            if i == position {
                character = c;
                text.push(SENTINEL);
                continue;
            }
            text.push(c);
            if let Some(code) = knowledge.lookup_known(c) {
                hints.push(GlyphHint { position: i, code });
            } else if let Some(vector) = knowledge.correction(c) {
                hints.push(GlyphHint {
                    position: i,
                    code: self.gateway.project(vector)?,
                });
            }
        }

        let vector = self.gateway.embed_char(character)?;
        debug!(
            position,
            eligible = eligible.len(),
            hints = hints.len(),
            "sender masked one character"
        );

        Ok(MaskOutcome::Marked {
            message: MarkedMessage {
                text,
                position,
                hints,
            },
            target: MaskedTarget {
                character,
                position,
                vector,
            },
        })
    }

    /// Correct iff the candidate is the masked character itself
    pub fn score(&self, target: &MaskedTarget, candidate: char) -> bool {
        candidate == target.character
    }

    /// Ground truth for the Receiver once the budget is spent
    pub fn reveal(&self, target: &MaskedTarget) -> Feedback {
        Feedback {
            character: Some(target.character),
            vector: target.vector.clone(),
        }
    }
}

/// Role that reconstructs the poem from a marked message
#[derive(Debug)]
pub struct Receiver<'g, G: ?Sized> {
    gateway: &'g G,
}

impl<'g, G: EmbeddingGateway + ?Sized> Receiver<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    /// Fill the masked slot, or `None` when no candidate is left.
    ///
    /// A correction for a character outside the durable mapping is ground
    /// truth for this negotiation and is used as-is. Otherwise the guess is
    /// the vocabulary character nearest to the visible context, skipping
    /// punctuation, known characters and characters already visible. With
    /// no content characters in view, the first eligible vocabulary
    /// character stands in.
    pub fn guess(
        &self,
        message: &MarkedMessage,
        knowledge: &SharedKnowledge,
    ) -> Result<Option<Reconstruction>, NegotiationError> {
        let informed = knowledge
            .corrections()
            .map(|(c, _)| c)
            .find(|c| knowledge.lookup_known(*c).is_none());
        if let Some(character) = informed {
            debug!(%character, "receiver uses revealed character");
            return Ok(Some(message.fill(character)));
        }

        let visible: Vec<char> = message.visible().collect();
        let candidates: Vec<char> = self
            .gateway
            .vocabulary()
            .iter()
            .copied()
            .filter(|c| !is_punctuation(*c) && !knowledge.is_known(*c) && !visible.contains(c))
            .collect();
        let first = match candidates.first() {
            Some(&c) => c,
            None => {
                debug!("receiver has no vocabulary character left");
                return Ok(None);
            }
        };

        let context: String = visible.iter().filter(|c| !is_punctuation(**c)).collect();
        if context.is_empty() {
            debug!(character = %first, "receiver placeholder guess");
            return Ok(Some(message.fill(first)));
        }
        let context_vector = self.gateway.embed(&context)?;

        let mut best = (first, f32::INFINITY);
        for c in candidates {
            let distance = cosine_distance(&self.gateway.embed_char(c)?, &context_vector);
            if distance < best.1 {
                best = (c, distance);
            }
        }
        debug!(character = %best.0, distance = best.1, "receiver naive guess");
        Ok(Some(message.fill(best.0)))
    }
}

/// A reconstruction may only touch the masked slot
pub fn verify_reconstruction(
    message: &MarkedMessage,
    reconstruction: &Reconstruction,
) -> Result<(), NegotiationError> {
    if reconstruction.character == SENTINEL {
        return Err(NegotiationError::DataIntegrity(
            "reconstruction left the masked slot empty".into(),
        ));
    }
    let changed = differing_positions(&message.text, &reconstruction.poem);
    if changed != [message.position] {
        return Err(NegotiationError::DataIntegrity(format!(
            "reconstruction changed positions {:?}, expected only {}",
            changed, message.position
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
