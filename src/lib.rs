//! nvshu: glyph negotiation engine
//!
//! Two agents (Sender and Receiver) negotiate which novel glyph code gets
//! assigned to one unmapped character of a poem:
//! poem → mask → guess/retry loop → converge or reveal → project → registry

pub mod core;
pub mod types;

// =============================================================================
// PROTOCOL LIMITS
// =============================================================================

/// Retry budget of one negotiation
pub const MAX_TRIES: usize = 5;

/// Lower bound of the random candidate quota drawn by the sampler
pub const SAMPLE_QUOTA_MIN: usize = 1000;

/// Upper bound of the random candidate quota drawn by the sampler
pub const SAMPLE_QUOTA_MAX: usize = 4000;

/// Relative slack on the wrong-guess/target distance band.
/// 0.05 admits characters up to 5% farther than the first wrong guess.
pub const DEFAULT_BAND_SLACK: f32 = 0.05;

/// Minimum number of characters a poem must carry
pub const MIN_POEM_CHARS: usize = 5;

/// Characters per line of a five-character couplet
pub const COUPLET_LINE_CHARS: usize = 5;

// =============================================================================
// GLYPHS
// =============================================================================

/// Components of a glyph code
pub const GLYPH_DIM: usize = 3;

/// Quantization levels per glyph component (components lie in 0..GLYPH_LEVELS)
pub const GLYPH_LEVELS: u8 = 20;

/// Marker that replaces the negotiated character in a marked message
pub const SENTINEL: char = '*';

/// Registry file format version written by this crate
pub const REGISTRY_VERSION: u16 = 2;

/// Poem used when nothing else is supplied
pub const DEFAULT_POEM: &str = "江永女书奇，闺中秘语稀。";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "0.1.0";
