//! Core modules for glyph negotiation

pub mod agent;
pub mod api;
pub mod controller;
pub mod gateway;
pub mod poem;
pub mod provenance;
pub mod registry;
pub mod sampler;
pub mod telemetry;

pub use agent::{verify_reconstruction, Receiver, Sender};
pub use api::{create_router, run_server, AppState, SharedGateway};
pub use controller::NegotiationController;
pub use gateway::{cosine_distance, EmbeddingGateway, LinearProjector, TableGateway, VocabularyFile};
pub use provenance::{outcome_digest, seal, verify_outcome};
pub use registry::{GlyphRegistry, HintedPoem};
pub use sampler::{BandRule, CandidateSource, TransitionSampler};
pub use telemetry::{init_tracing, LogOptions};
