//! Transition candidate sampler
//!
//! After a wrong first guess the Receiver stops trusting its own heuristic
//! and works through a randomized list of "transition" characters: those
//! roughly as far from the target as the wrong guess was, or closer.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use tracing::debug;

use crate::core::gateway::{cosine_distance, EmbeddingGateway};
use crate::core::poem::is_punctuation;
use crate::types::{MaskedTarget, NegotiationConfig, NegotiationError, SharedKnowledge};
use crate::{DEFAULT_BAND_SLACK, SAMPLE_QUOTA_MAX, SAMPLE_QUOTA_MIN};

/// Produces the ordered retry list after a wrong first guess
pub trait CandidateSource {
    /// Ordered candidates for attempts 2.., without repetition
    fn build_candidates<G: EmbeddingGateway + ?Sized>(
        &self,
        gateway: &G,
        first_wrong: char,
        target: &MaskedTarget,
        knowledge: &SharedKnowledge,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<char>, NegotiationError>;
}

impl<T: CandidateSource> CandidateSource for &T {
    fn build_candidates<G: EmbeddingGateway + ?Sized>(
        &self,
        gateway: &G,
        first_wrong: char,
        target: &MaskedTarget,
        knowledge: &SharedKnowledge,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<char>, NegotiationError> {
        (**self).build_candidates(gateway, first_wrong, target, knowledge, rng)
    }
}

/// Distance band around the wrong-guess/target distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandRule {
    /// Relative slack above the reference distance
    pub slack: f32,
}

impl BandRule {
    /// Upper distance bound for a given reference distance
    pub fn limit(&self, reference: f32) -> f32 {
        reference * (1.0 + self.slack)
    }

    pub fn admits(&self, distance: f32, reference: f32) -> bool {
        distance <= self.limit(reference)
    }
}

impl Default for BandRule {
    fn default() -> Self {
        Self {
            slack: DEFAULT_BAND_SLACK,
        }
    }
}

/// Band filter plus random quota subsampling
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSampler {
    pub band: BandRule,
    pub quota_min: usize,
    pub quota_max: usize,
}

impl Default for TransitionSampler {
    fn default() -> Self {
        Self {
            band: BandRule::default(),
            quota_min: SAMPLE_QUOTA_MIN,
            quota_max: SAMPLE_QUOTA_MAX,
        }
    }
}

impl TransitionSampler {
    pub fn from_config(config: &NegotiationConfig) -> Self {
        Self {
            band: BandRule {
                slack: config.band_slack,
            },
            quota_min: config.quota_min,
            quota_max: config.quota_max,
        }
    }

    /// Vocabulary characters inside the band, in vocabulary order.
    ///
    /// The wrong guess and characters that already have a glyph or a
    /// correction are never part of the pool. Characters visible elsewhere
    /// in the poem stay, the masked one may repeat.
    pub fn transition_pool<G: EmbeddingGateway + ?Sized>(
        &self,
        gateway: &G,
        first_wrong: char,
        target: &MaskedTarget,
        knowledge: &SharedKnowledge,
    ) -> Result<Vec<char>, NegotiationError> {
        let wrong_vector = gateway.embed_char(first_wrong)?;
        let reference = cosine_distance(&wrong_vector, &target.vector);

        let mut pool = Vec::new();
        for &c in gateway.vocabulary() {
            if c == first_wrong || is_punctuation(c) || knowledge.is_known(c) {
                continue;
            }
            let distance = cosine_distance(&gateway.embed_char(c)?, &target.vector);
            if self.band.admits(distance, reference) {
                pool.push(c);
            }
        }
        debug!(
            wrong = %first_wrong,
            reference,
            pool = pool.len(),
            "transition pool built"
        );
        Ok(pool)
    }
}

impl CandidateSource for TransitionSampler {
    fn build_candidates<G: EmbeddingGateway + ?Sized>(
        &self,
        gateway: &G,
        first_wrong: char,
        target: &MaskedTarget,
        knowledge: &SharedKnowledge,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<char>, NegotiationError> {
        let pool = self.transition_pool(gateway, first_wrong, target, knowledge)?;
        if pool.is_empty() {
            return Ok(Vec::new());
        }
        let quota = rng
            .gen_range(self.quota_min..=self.quota_max.max(self.quota_min))
            .min(pool.len());
        Ok(pool.choose_multiple(rng, quota).copied().collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
