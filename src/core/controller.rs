//! Negotiation controller: bounded guess/feedback loop
//!
//! START → MASKING → GUESSING(1..max_tries) → CONVERGED | REVEALED
//!
//! Attempt 1 is the Receiver's own guess. If it is wrong the sampler is
//! asked once for a transition list and every later attempt pops the next
//! entry. Exhausting the list or the budget ends in a revelation followed
//! by exactly one informed Receiver call.

use chrono::Utc;
use rand::RngCore;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::core::agent::{verify_reconstruction, Receiver, Sender};
use crate::core::gateway::EmbeddingGateway;
use crate::core::poem;
use crate::core::provenance;
use crate::core::sampler::{CandidateSource, TransitionSampler};
use crate::types::{
    GuessRecord, KnownMapping, MaskOutcome, Negotiation, NegotiationConfig, NegotiationError,
    NegotiationOutcome, NegotiationState, ReasonCode, SharedKnowledge, TransitionRecord,
};

/// Drives one negotiation per `negotiate` call
#[derive(Debug)]
pub struct NegotiationController<'g, G: ?Sized, S = TransitionSampler> {
    gateway: &'g G,
    sampler: S,
    max_tries: usize,
    min_poem_chars: usize,
}

impl<'g, G: EmbeddingGateway + ?Sized> NegotiationController<'g, G, TransitionSampler> {
    /// Controller with the band/quota sampler described by `config`
    pub fn new(gateway: &'g G, config: &NegotiationConfig) -> Self {
        Self::with_sampler(gateway, TransitionSampler::from_config(config), config)
    }
}

impl<'g, G: EmbeddingGateway + ?Sized, S: CandidateSource> NegotiationController<'g, G, S> {
    /// Controller with a custom candidate source
    pub fn with_sampler(gateway: &'g G, sampler: S, config: &NegotiationConfig) -> Self {
        Self {
            gateway,
            sampler,
            max_tries: config.max_tries.max(1),
            min_poem_chars: config.min_poem_chars,
        }
    }

    pub fn max_tries(&self) -> usize {
        self.max_tries
    }

    /// Run one negotiation over `poem`.
    ///
    /// `known` is copied into a fresh `SharedKnowledge`; the caller's mapping
    /// is never touched. Merging the outcome is the caller's job.
    ///
    /// The poem is normalized (trimmed, ASCII punctuation widened) first.
    /// `target_position` indexes `outcome.poem`, not the raw input.
    pub fn negotiate(
        &self,
        poem: &str,
        known: &KnownMapping,
        rng: &mut dyn RngCore,
    ) -> Result<Negotiation, NegotiationError> {
        let poem = poem::normalize(poem);
        if let Err(e) = poem::validate(&poem, self.min_poem_chars) {
            warn!(reason = %e.reason(), error = %e, "poem rejected");
            return Err(e);
        }

        let mut trail = vec![TransitionRecord {
            state: NegotiationState::Start,
            reason: ReasonCode::R100_NEGOTIATION_STARTED,
        }];
        let mut knowledge = SharedKnowledge::new(known.clone());
        let sender = Sender::new(self.gateway);
        let receiver = Receiver::new(self.gateway);

        // MASKING
        let (message, target) = match sender.mask(&poem, &knowledge, rng)? {
            MaskOutcome::Marked { message, target } => (message, target),
            MaskOutcome::Skip(reason) => {
                info!(
                    reason = %ReasonCode::R102_NOTHING_NEW,
                    known = knowledge.known_len(),
                    "every character already has a glyph"
                );
                return Ok(Negotiation::Skipped(reason));
            }
        };
        trail.push(TransitionRecord {
            state: NegotiationState::Masking,
            reason: ReasonCode::R101_TARGET_MASKED,
        });
        info!(
            reason = %ReasonCode::R101_TARGET_MASKED,
            position = target.position,
            hints = message.hints.len(),
            "target masked"
        );

        // GUESSING
        let mut queue: VecDeque<char> = VecDeque::new();
        let mut attempts = Vec::with_capacity(self.max_tries);
        let mut history = Vec::with_capacity(self.max_tries);
        let mut converged = false;

        for attempt in 1..=self.max_tries {
            let state = NegotiationState::Guessing { attempt };
            let next = if attempt == 1 {
                match receiver.guess(&message, &knowledge)? {
                    Some(reconstruction) => {
                        verify_reconstruction(&message, &reconstruction)?;
                        Some((reconstruction.character, ReasonCode::R201_NAIVE_GUESS))
                    }
                    None => None,
                }
            } else {
                queue
                    .pop_front()
                    .map(|candidate| (candidate, ReasonCode::R202_CANDIDATE_PROBED))
            };
            let (character, reason) = match next {
                Some(next) => next,
                None => {
                    warn!(
                        reason = %ReasonCode::R203_POOL_EXHAUSTED,
                        attempt,
                        "no candidate left before the retry budget"
                    );
                    trail.push(TransitionRecord {
                        state,
                        reason: ReasonCode::R203_POOL_EXHAUSTED,
                    });
                    break;
                }
            };
            trail.push(TransitionRecord { state, reason });

            let correct = sender.score(&target, character);
            attempts.push(character);
            history.push(GuessRecord {
                attempt,
                character,
                correct,
            });
            debug!(attempt, %character, correct, reason = %reason, "attempt scored");

            if correct {
                converged = true;
                break;
            }
            trail.push(TransitionRecord {
                state,
                reason: ReasonCode::R204_GUESS_WRONG,
            });

            if attempt == 1 && self.max_tries > 1 {
                queue = self
                    .sampler
                    .build_candidates(self.gateway, character, &target, &knowledge, rng)?
                    .into_iter()
                    .collect();
                debug!(candidates = queue.len(), "transition candidates drawn");
            }
        }

        // CONVERGED | REVEALED
        let (state, final_reconstruction) = if converged {
            knowledge.record_correction(target.character, target.vector.clone())?;
            (NegotiationState::Converged, message.fill(target.character).poem)
        } else {
            let (character, vector) = sender.reveal(&target).verified(self.gateway.dimension())?;
            knowledge.record_correction(character, vector)?;
            let informed = receiver.guess(&message, &knowledge)?.ok_or_else(|| {
                NegotiationError::DataIntegrity("receiver ignored the revelation".into())
            })?;
            verify_reconstruction(&message, &informed)?;
            if informed.character != target.character {
                return Err(NegotiationError::DataIntegrity(format!(
                    "informed reconstruction placed {:?}, revealed {:?}",
                    informed.character, target.character
                )));
            }
            (NegotiationState::Revealed, informed.poem)
        };

        let glyph = self.gateway.project(&target.vector)?;
        let reason = if converged {
            ReasonCode::R301_CONVERGED
        } else {
            ReasonCode::R302_REVEALED
        };
        trail.push(TransitionRecord { state, reason });
        info!(
            reason = %reason,
            glyph = %glyph.key(),
            attempts = attempts.len(),
            "negotiation concluded"
        );

        let mut outcome = NegotiationOutcome {
            timestamp: Utc::now(),
            poem,
            target_character: target.character,
            target_position: target.position,
            glyph,
            vector: target.vector,
            attempts,
            history,
            success: converged,
            state,
            final_reconstruction,
            trail,
            digest: String::new(),
        };
        provenance::seal(&mut outcome);
        Ok(Negotiation::Concluded(outcome))
    }
}

// =============================================================================
// TESTS
// =============================================================================
