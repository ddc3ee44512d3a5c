//! Outcome provenance
//!
//! A concluded negotiation is sealed with a SHA-256 digest over everything
//! that determined the assigned glyph. The digest travels into the registry
//! record, so any later edit of the outcome is detectable.

use sha2::{Digest, Sha256};

use crate::types::NegotiationOutcome;

/// Digest version byte, bumped when the hashed layout changes
const DIGEST_VERSION: u8 = 1;

/// Hash the outcome fields (deterministic)
pub fn outcome_digest(outcome: &NegotiationOutcome) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([DIGEST_VERSION]);

    hasher.update(outcome.poem.as_bytes());
    hasher.update([0u8]); // Separator

    let mut buf = [0u8; 4];
    hasher.update(outcome.target_character.encode_utf8(&mut buf).as_bytes());
    hasher.update([0u8]);
    hasher.update((outcome.target_position as u64).to_le_bytes());

    hasher.update(outcome.glyph.components());

    hasher.update((outcome.vector.len() as u64).to_le_bytes());
    for v in &outcome.vector {
        hasher.update(v.to_le_bytes());
    }

    hasher.update((outcome.attempts.len() as u64).to_le_bytes());
    for c in &outcome.attempts {
        hasher.update(c.encode_utf8(&mut buf).as_bytes());
        hasher.update([0u8]);
    }

    hasher.update([outcome.success as u8]);

    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Fill in `outcome.digest`
pub fn seal(outcome: &mut NegotiationOutcome) {
    outcome.digest = to_hex(&outcome_digest(outcome));
}

/// Does the stored digest still match the outcome?
pub fn verify_outcome(outcome: &NegotiationOutcome) -> bool {
    !outcome.digest.is_empty() && outcome.digest == to_hex(&outcome_digest(outcome))
}

/// Lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// TESTS
// =============================================================================
