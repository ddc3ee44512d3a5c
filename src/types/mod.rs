//! Core types for glyph negotiation

mod config;
mod error;
mod glyph;
mod knowledge;
mod message;
mod outcome;
mod reason;
mod record;
mod state;

pub use config::NegotiationConfig;
pub use error::{ConfigError, GatewayError, NegotiationError, RegistryError, GENERIC_FAILURE_MESSAGE};
pub use glyph::{GlyphCode, ParseGlyphError};
pub use knowledge::{KnownMapping, SharedKnowledge};
pub use message::{Feedback, GlyphHint, MarkedMessage, MaskOutcome, MaskedTarget, Reconstruction, SkipReason};
pub use outcome::{GuessRecord, Negotiation, NegotiationOutcome, TransitionRecord};
pub use reason::ReasonCode;
pub use record::{GlyphRecord, MergeStatus};
pub use state::NegotiationState;
