//! Registry records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GlyphCode;

/// Durable entry of the glyph registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRecord {
    /// Assigned glyph code, immutable once written
    pub code: GlyphCode,
    /// Free-text translation (may be empty)
    #[serde(default)]
    pub translation: String,
    /// When the code was assigned; absent for migrated legacy entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    /// Digest of the negotiation outcome that produced the code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl GlyphRecord {
    /// Fresh record for a code assigned now
    pub fn new(code: GlyphCode, translation: impl Into<String>) -> Self {
        Self {
            code,
            translation: translation.into(),
            assigned_at: Some(Utc::now()),
            provenance: None,
        }
    }

    /// Record migrated from an older file, without timestamp
    pub fn migrated(code: GlyphCode, translation: impl Into<String>) -> Self {
        Self {
            code,
            translation: translation.into(),
            assigned_at: None,
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, digest: impl Into<String>) -> Self {
        self.provenance = Some(digest.into());
        self
    }
}

/// What an insert into the registry did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// New character appended
    Appended,
    /// Character existed; only its translation changed
    TranslationUpdated,
    /// Character existed with the same translation
    Unchanged,
}
