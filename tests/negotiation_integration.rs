//! Integration tests for the negotiation protocol
//!
//! Covers masking, the bounded retry loop, revelation and projection

use nvshu::core::{
    verify_outcome, CandidateSource, EmbeddingGateway, NegotiationController, TableGateway,
};
use nvshu::types::{
    GatewayError, GlyphCode, KnownMapping, MaskedTarget, Negotiation, NegotiationConfig,
    NegotiationError, NegotiationOutcome, NegotiationState, ReasonCode, SharedKnowledge,
};
use nvshu::{DEFAULT_POEM, GLYPH_LEVELS, MAX_TRIES};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::cell::Cell;
use std::collections::BTreeMap;

/// Candidate source replaying a fixed list and counting calls
struct Scripted {
    list: Vec<char>,
    calls: Cell<usize>,
}

impl Scripted {
    fn new(list: &str) -> Self {
        Self {
            list: list.chars().collect(),
            calls: Cell::new(0),
        }
    }
}

impl CandidateSource for Scripted {
    fn build_candidates<G: EmbeddingGateway + ?Sized>(
        &self,
        _gateway: &G,
        _first_wrong: char,
        _target: &MaskedTarget,
        _knowledge: &SharedKnowledge,
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<char>, NegotiationError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.list.clone())
    }
}

/// Poem characters share one direction; 花 sits right next to them and 奇
/// is orthogonal, so the naive guess is always 花.
fn scenario_gateway() -> TableGateway {
    let mut vectors = BTreeMap::new();
    for c in "江永女书闺中秘语稀".chars() {
        vectors.insert(c, vec![1.0, 0.0, 0.0, 0.0]);
    }
    vectors.insert('花', vec![1.0, 0.1, 0.0, 0.0]);
    vectors.insert('奇', vec![0.0, 0.0, 1.0, 0.0]);
    vectors.insert('月', vec![0.0, 1.0, 0.0, 0.0]);
    vectors.insert('风', vec![0.0, 0.0, 0.0, 1.0]);
    vectors.insert('云', vec![0.0, 1.0, 1.0, 0.0]);
    vectors.insert('雨', vec![0.0, 1.0, 0.0, 1.0]);
    TableGateway::new(vectors, GLYPH_LEVELS).unwrap()
}

/// Scenario table whose vector for 奇 is replaced by a broken one
struct BrokenTargetGateway {
    inner: TableGateway,
    target_vector: Vec<f32>,
}

impl EmbeddingGateway for BrokenTargetGateway {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, GatewayError> {
        if text == "奇" {
            return Ok(self.target_vector.clone());
        }
        self.inner.embed(text)
    }

    fn project(&self, vector: &[f32]) -> Result<GlyphCode, GatewayError> {
        self.inner.project(vector)
    }

    fn vocabulary(&self) -> &[char] {
        self.inner.vocabulary()
    }
}

/// Everything but 奇 already has a glyph
fn known_all_but_target() -> KnownMapping {
    "江永女书闺中秘语稀"
        .chars()
        .enumerate()
        .map(|(i, c)| (c, GlyphCode::new([i as u8, 0, 0]).unwrap()))
        .collect()
}

fn concluded(result: Result<Negotiation, NegotiationError>) -> NegotiationOutcome {
    match result.unwrap() {
        Negotiation::Concluded(outcome) => outcome,
        Negotiation::Skipped(reason) => panic!("unexpected skip: {:?}", reason),
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_five_wrong_attempts_then_reveal() {
    let gateway = scenario_gateway();
    let sampler = Scripted::new("月风云雨");
    let controller =
        NegotiationController::with_sampler(&gateway, sampler, &NegotiationConfig::default());
    let mut rng = StdRng::seed_from_u64(1);

    let outcome = concluded(controller.negotiate(DEFAULT_POEM, &known_all_but_target(), &mut rng));

    assert!(!outcome.success);
    assert_eq!(outcome.state, NegotiationState::Revealed);
    assert_eq!(outcome.target_character, '奇');
    assert_eq!(outcome.target_position, 4);
    assert_eq!(
        outcome.target_position,
        DEFAULT_POEM.chars().position(|c| c == '奇').unwrap()
    );
    assert_eq!(outcome.attempts, vec!['花', '月', '风', '云', '雨']);
    assert_eq!(outcome.history.len(), 5);
    assert!(outcome.history.iter().all(|h| !h.correct));
    assert_eq!(
        outcome.glyph,
        gateway.project(&gateway.embed("奇").unwrap()).unwrap()
    );
    assert_eq!(outcome.vector, gateway.embed_char('奇').unwrap());
    assert_eq!(outcome.final_reconstruction, DEFAULT_POEM);
    assert_eq!(outcome.trail.last().unwrap().reason, ReasonCode::R302_REVEALED);
    assert!(verify_outcome(&outcome));
}

#[test]
fn test_first_sampled_candidate_converges() {
    let gateway = scenario_gateway();
    let sampler = Scripted::new("奇月风");
    let controller =
        NegotiationController::with_sampler(&gateway, sampler, &NegotiationConfig::default());
    let mut rng = StdRng::seed_from_u64(2);

    let outcome = concluded(controller.negotiate(DEFAULT_POEM, &known_all_but_target(), &mut rng));

    assert!(outcome.success);
    assert_eq!(outcome.state, NegotiationState::Converged);
    assert_eq!(outcome.attempts, vec!['花', '奇']);
    assert_eq!(outcome.history.len(), 2);
    assert!(!outcome.history[0].correct);
    assert!(outcome.history[1].correct);
    assert_eq!(outcome.final_reconstruction, DEFAULT_POEM);
    assert_eq!(outcome.trail.last().unwrap().reason, ReasonCode::R301_CONVERGED);
}

#[test]
fn test_sampler_called_once_after_wrong_first_guess() {
    let gateway = scenario_gateway();
    let source = Scripted::new("月风云雨");
    let controller =
        NegotiationController::with_sampler(&gateway, &source, &NegotiationConfig::default());
    let mut rng = StdRng::seed_from_u64(3);

    let outcome = concluded(controller.negotiate(DEFAULT_POEM, &known_all_but_target(), &mut rng));
    assert_eq!(outcome.attempts.len(), MAX_TRIES);
    assert_eq!(source.calls.get(), 1);
}

#[test]
fn test_short_pool_reveals_before_budget() {
    let gateway = scenario_gateway();
    let sampler = Scripted::new("月");
    let controller =
        NegotiationController::with_sampler(&gateway, sampler, &NegotiationConfig::default());
    let mut rng = StdRng::seed_from_u64(4);

    let outcome = concluded(controller.negotiate(DEFAULT_POEM, &known_all_but_target(), &mut rng));

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, vec!['花', '月']);
    assert!(outcome
        .trail
        .iter()
        .any(|t| t.reason == ReasonCode::R203_POOL_EXHAUSTED));
    assert_eq!(outcome.final_reconstruction, DEFAULT_POEM);
}

#[test]
fn test_budget_of_one_never_samples() {
    let gateway = scenario_gateway();
    let source = Scripted::new("奇");
    let config = NegotiationConfig {
        max_tries: 1,
        ..Default::default()
    };
    let controller = NegotiationController::with_sampler(&gateway, &source, &config);
    let mut rng = StdRng::seed_from_u64(5);

    let outcome = concluded(controller.negotiate(DEFAULT_POEM, &known_all_but_target(), &mut rng));
    assert_eq!(outcome.attempts, vec!['花']);
    assert!(!outcome.success);
    assert_eq!(source.calls.get(), 0);
}

// =============================================================================
// DATA INTEGRITY
// =============================================================================

#[test]
fn test_empty_target_vector_fails_on_convergence() {
    let gateway = BrokenTargetGateway {
        inner: scenario_gateway(),
        target_vector: Vec::new(),
    };
    let controller = NegotiationController::with_sampler(
        &gateway,
        Scripted::new("奇"),
        &NegotiationConfig::default(),
    );
    let mut rng = StdRng::seed_from_u64(1);

    let err = controller
        .negotiate(DEFAULT_POEM, &known_all_but_target(), &mut rng)
        .unwrap_err();
    assert!(matches!(err, NegotiationError::DataIntegrity(_)), "{:?}", err);
    assert_eq!(err.reason(), ReasonCode::R402_DATA_INTEGRITY);
    assert_eq!(err.user_message(), nvshu::types::GENERIC_FAILURE_MESSAGE);
}

#[test]
fn test_wrong_dimension_vector_fails_on_revelation() {
    let gateway = BrokenTargetGateway {
        inner: scenario_gateway(),
        target_vector: vec![0.0, 1.0],
    };
    let source = Scripted::new("月风");
    let controller =
        NegotiationController::with_sampler(&gateway, &source, &NegotiationConfig::default());
    let mut rng = StdRng::seed_from_u64(2);

    let err = controller
        .negotiate(DEFAULT_POEM, &known_all_but_target(), &mut rng)
        .unwrap_err();
    assert!(matches!(err, NegotiationError::DataIntegrity(_)), "{:?}", err);
    assert_eq!(source.calls.get(), 1);
}

// =============================================================================
// PROPERTIES
// =============================================================================

#[test]
fn test_masked_character_is_novel() {
    let gateway = TableGateway::demo(13).unwrap();
    let controller = NegotiationController::new(&gateway, &NegotiationConfig::default());
    let mut known = KnownMapping::new();
    known.insert('江', GlyphCode::new([1, 1, 1]).unwrap());
    known.insert('稀', GlyphCode::new([2, 2, 2]).unwrap());

    for seed in 0..25 {
        let mut rng = StdRng::seed_from_u64(seed);
        let outcome = concluded(controller.negotiate(DEFAULT_POEM, &known, &mut rng));
        assert!(!known.contains_key(&outcome.target_character));
        assert!(!"，。".contains(outcome.target_character));
        assert!(outcome.history.len() <= MAX_TRIES);
        if outcome.success {
            let first_correct = outcome.history.iter().position(|h| h.correct).unwrap();
            assert_eq!(first_correct, outcome.history.len() - 1);
        } else {
            assert!(outcome.final_reconstruction.contains(outcome.target_character));
        }
    }
}

#[test]
fn test_all_known_is_skipped() {
    let gateway = TableGateway::demo(13).unwrap();
    let controller = NegotiationController::new(&gateway, &NegotiationConfig::default());
    let mut known = known_all_but_target();
    known.insert('奇', GlyphCode::new([9, 9, 9]).unwrap());
    let mut rng = StdRng::seed_from_u64(0);

    let result = controller.negotiate(DEFAULT_POEM, &known, &mut rng).unwrap();
    assert!(result.is_skipped());
    assert!(result.outcome().is_none());
}

#[test]
fn test_invalid_input_errors() {
    let gateway = TableGateway::demo(13).unwrap();
    let controller = NegotiationController::new(&gateway, &NegotiationConfig::default());
    let mut rng = StdRng::seed_from_u64(0);

    for poem in ["", "   ", "江永女", "江永*书奇"] {
        let err = controller
            .negotiate(poem, &KnownMapping::new(), &mut rng)
            .unwrap_err();
        assert!(
            matches!(err, NegotiationError::InvalidInput(_)),
            "{:?} should be rejected",
            poem
        );
    }
}

#[test]
fn test_unknown_character_is_gateway_failure() {
    let gateway = scenario_gateway();
    let controller = NegotiationController::new(&gateway, &NegotiationConfig::default());
    let mut rng = StdRng::seed_from_u64(0);

    let err = controller
        .negotiate("山高水长远", &KnownMapping::new(), &mut rng)
        .unwrap_err();
    assert_eq!(err.reason(), ReasonCode::R403_GATEWAY_FAILURE);
    assert_eq!(err.user_message(), nvshu::types::GENERIC_FAILURE_MESSAGE);
}

#[test]
fn test_projection_is_deterministic() {
    let gateway = scenario_gateway();
    let v = gateway.embed_char('奇').unwrap();
    let code = gateway.project(&v).unwrap();
    for _ in 0..5 {
        assert_eq!(gateway.project(&v).unwrap(), code);
    }
}

#[test]
fn test_caller_mapping_untouched() {
    let gateway = scenario_gateway();
    let controller = NegotiationController::with_sampler(
        &gateway,
        Scripted::new("奇"),
        &NegotiationConfig::default(),
    );
    let known = known_all_but_target();
    let before = known.clone();
    let mut rng = StdRng::seed_from_u64(6);
    concluded(controller.negotiate(DEFAULT_POEM, &known, &mut rng));
    assert_eq!(known, before);
}
