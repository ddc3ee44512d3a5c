//! Durable glyph registry
//!
//! JSON file `{"version": 2, "records": {"奇": {...}}}`. Older files are
//! migrated on read: an unversioned top-level map whose values are either a
//! bare code list (`[14, 0, 16]`) or a `{char_3dim, char_translate}` dict.
//! Writes always produce the current layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::poem::is_punctuation;
use crate::types::{
    GlyphCode, GlyphRecord, KnownMapping, MergeStatus, NegotiationOutcome, RegistryError,
};
use crate::REGISTRY_VERSION;

/// On-disk layout of the current version
#[derive(Debug, Serialize)]
struct RegistryFile<'a> {
    version: u16,
    records: &'a BTreeMap<char, GlyphRecord>,
}

/// Any record shape ever written
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Current(GlyphRecord),
    LegacyDict {
        char_3dim: Vec<f64>,
        #[serde(default)]
        char_translate: Option<String>,
    },
    LegacyList(Vec<f64>),
}

/// Poem with known characters rendered as their codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintedPoem {
    /// e.g. `[1-2-3]永女书奇，闺中秘语稀。`
    pub text: String,
    /// Character positions that were replaced
    pub replaced: Vec<usize>,
}

/// Character → glyph registry, append-only per character
#[derive(Debug, Clone, Default)]
pub struct GlyphRegistry {
    records: BTreeMap<char, GlyphRecord>,
    migrated: usize,
}

impl GlyphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry file, migrating legacy shapes
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let registry = Self::from_json(&json)?;
        info!(
            path = %path.as_ref().display(),
            records = registry.len(),
            migrated = registry.migrated,
            "registry loaded"
        );
        Ok(registry)
    }

    /// Load, or start empty when the file does not exist yet
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            debug!(path = %path.as_ref().display(), "no registry file, starting empty");
            Ok(Self::new())
        }
    }

    /// Parse a registry document of any supported version
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let root: Value = serde_json::from_str(json)?;
        let map = match root {
            Value::Object(mut map) => {
                let versioned = map.get("version").map_or(false, Value::is_number)
                    && map.get("records").map_or(false, Value::is_object);
                if versioned {
                    match map.remove("records") {
                        Some(Value::Object(records)) => records,
                        _ => serde_json::Map::new(),
                    }
                } else {
                    map
                }
            }
            other => {
                return Err(RegistryError::MalformedRecord {
                    key: String::new(),
                    detail: format!("expected a JSON object at the top level, got {}", kind(&other)),
                })
            }
        };

        let mut registry = Self::new();
        for (key, value) in map {
            let character = single_char(&key)?;
            let (record, legacy) = parse_record(&key, value)?;
            if legacy {
                registry.migrated += 1;
            }
            registry.records.insert(character, record);
        }
        if registry.migrated > 0 {
            warn!(
                migrated = registry.migrated,
                "legacy registry records migrated; next save writes version {}", REGISTRY_VERSION
            );
        }
        Ok(registry)
    }

    /// Serialize in the current layout
    pub fn to_json(&self) -> Result<String, RegistryError> {
        let file = RegistryFile {
            version: REGISTRY_VERSION,
            records: &self.records,
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Write to `path` via a temporary file and rename
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = self.to_json()?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), records = self.len(), "registry saved");
        Ok(())
    }

    pub fn lookup(&self, character: char) -> Option<&GlyphRecord> {
        self.records.get(&character)
    }

    pub fn contains(&self, character: char) -> bool {
        self.records.contains_key(&character)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that came from a legacy shape on load
    pub fn migrated_count(&self) -> usize {
        self.migrated
    }

    /// All records, ordered by character
    pub fn records(&self) -> impl Iterator<Item = (char, &GlyphRecord)> {
        self.records.iter().map(|(c, r)| (*c, r))
    }

    /// Character → code view handed to a negotiation
    pub fn known_mapping(&self) -> KnownMapping {
        self.records.iter().map(|(c, r)| (*c, r.code)).collect()
    }

    /// Add a record.
    ///
    /// An existing character keeps its code; only a non-empty, different
    /// translation replaces the stored one.
    pub fn insert(&mut self, character: char, record: GlyphRecord) -> MergeStatus {
        match self.records.get_mut(&character) {
            None => {
                self.records.insert(character, record);
                MergeStatus::Appended
            }
            Some(existing) => {
                if existing.code != record.code {
                    warn!(
                        %character,
                        kept = %existing.code.key(),
                        offered = %record.code.key(),
                        "registry code is immutable, offered code ignored"
                    );
                }
                if !record.translation.is_empty() && record.translation != existing.translation {
                    existing.translation = record.translation;
                    MergeStatus::TranslationUpdated
                } else {
                    MergeStatus::Unchanged
                }
            }
        }
    }

    /// Merge a concluded negotiation
    pub fn merge_outcome(&mut self, outcome: &NegotiationOutcome, translation: &str) -> MergeStatus {
        let mut record = GlyphRecord::new(outcome.glyph, translation);
        if !outcome.digest.is_empty() {
            record = record.with_provenance(outcome.digest.clone());
        }
        let status = self.insert(outcome.target_character, record);
        info!(
            character = %outcome.target_character,
            glyph = %outcome.glyph.key(),
            status = ?status,
            "outcome merged into registry"
        );
        status
    }

    /// Records whose character or translation contains `term` (case-insensitive)
    pub fn search(&self, term: &str) -> Vec<(char, &GlyphRecord)> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        self.records
            .iter()
            .filter(|(c, r)| {
                term.contains(**c) || r.translation.to_lowercase().contains(&term)
            })
            .map(|(c, r)| (*c, r))
            .collect()
    }

    /// Render known characters of a poem as `[a-b-c]` codes
    pub fn render_hints(&self, poem: &str) -> HintedPoem {
        let mut text = String::new();
        let mut replaced = Vec::new();
        for (i, c) in poem.chars().enumerate() {
            match self.records.get(&c).filter(|_| !is_punctuation(c)) {
                Some(record) => {
                    text.push('[');
                    text.push_str(&record.code.key());
                    text.push(']');
                    replaced.push(i);
                }
                None => text.push(c),
            }
        }
        HintedPoem { text, replaced }
    }
}

fn single_char(key: &str) -> Result<char, RegistryError> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(RegistryError::MalformedRecord {
            key: key.to_string(),
            detail: "key must be exactly one character".into(),
        }),
    }
}

/// Parse one record; the flag is true when a legacy shape was migrated
fn parse_record(key: &str, value: Value) -> Result<(GlyphRecord, bool), RegistryError> {
    let malformed = |detail: String| RegistryError::MalformedRecord {
        key: key.to_string(),
        detail,
    };
    let stored: StoredRecord = serde_json::from_value(value)
        .map_err(|_| malformed("unrecognized record shape".into()))?;
    match stored {
        StoredRecord::Current(record) => Ok((record, false)),
        StoredRecord::LegacyDict {
            char_3dim,
            char_translate,
        } => {
            let code = legacy_code(&char_3dim).ok_or_else(|| {
                malformed(format!("char_3dim {:?} is not a valid glyph code", char_3dim))
            })?;
            Ok((GlyphRecord::migrated(code, char_translate.unwrap_or_default()), true))
        }
        StoredRecord::LegacyList(values) => {
            let code = legacy_code(&values).ok_or_else(|| {
                malformed(format!("{:?} is not a valid glyph code", values))
            })?;
            Ok((GlyphRecord::migrated(code, ""), true))
        }
    }
}

fn legacy_code(values: &[f64]) -> Option<GlyphCode> {
    GlyphCode::from_numbers(values)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn code(a: u8, b: u8, c: u8) -> GlyphCode {
        GlyphCode::new([a, b, c]).unwrap()
    }

    #[test]
    fn test_migrates_legacy_shapes() {
        let json = r#"{
            "江": [14, 0, 16],
            "永": {"char_3dim": [1.0, 2.0, 3.0], "char_translate": "eternal"},
            "女": {"char_3dim": [4, 5, 6], "char_translate": null}
        }"#;
        let registry = GlyphRegistry::from_json(json).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.migrated_count(), 3);
        assert_eq!(registry.lookup('江').unwrap().code, code(14, 0, 16));
        assert_eq!(registry.lookup('永').unwrap().translation, "eternal");
        assert_eq!(registry.lookup('女').unwrap().translation, "");
    }

    #[test]
    fn test_current_layout_roundtrip_is_not_migration() {
        let mut registry = GlyphRegistry::new();
        registry.insert('奇', GlyphRecord::new(code(1, 2, 3), "strange"));
        let json = registry.to_json().unwrap();
        assert!(json.contains("\"version\": 2"));

        let restored = GlyphRegistry::from_json(&json).unwrap();
        assert_eq!(restored.migrated_count(), 0);
        assert_eq!(restored.lookup('奇'), registry.lookup('奇'));
    }

    #[test]
    fn test_malformed_records_rejected() {
        let bad_key = r#"{"江永": [1, 2, 3]}"#;
        assert!(matches!(
            GlyphRegistry::from_json(bad_key),
            Err(RegistryError::MalformedRecord { .. })
        ));

        let bad_code = r#"{"江": [1, 2, 300]}"#;
        let err = GlyphRegistry::from_json(bad_code).unwrap_err();
        assert_eq!(err.reason(), crate::types::ReasonCode::R503_RECORD_MALFORMED);

        let fractional = r#"{"江": [1.5, 2, 3]}"#;
        assert!(GlyphRegistry::from_json(fractional).is_err());

        assert!(matches!(
            GlyphRegistry::from_json("not json"),
            Err(RegistryError::Format(_))
        ));
        assert!(GlyphRegistry::from_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_insert_is_append_only() {
        let mut registry = GlyphRegistry::new();
        assert_eq!(
            registry.insert('奇', GlyphRecord::new(code(1, 2, 3), "")),
            MergeStatus::Appended
        );
        assert_eq!(
            registry.insert('奇', GlyphRecord::new(code(9, 9, 9), "")),
            MergeStatus::Unchanged
        );
        assert_eq!(registry.lookup('奇').unwrap().code, code(1, 2, 3));
        assert_eq!(
            registry.insert('奇', GlyphRecord::new(code(9, 9, 9), "strange")),
            MergeStatus::TranslationUpdated
        );
        assert_eq!(registry.lookup('奇').unwrap().code, code(1, 2, 3));
        assert_eq!(registry.lookup('奇').unwrap().translation, "strange");
    }

    #[test]
    fn test_search() {
        let mut registry = GlyphRegistry::new();
        registry.insert('奇', GlyphRecord::new(code(1, 2, 3), "Strange"));
        registry.insert('江', GlyphRecord::new(code(4, 5, 6), "river"));

        let hits: Vec<char> = registry.search("奇").into_iter().map(|(c, _)| c).collect();
        assert_eq!(hits, vec!['奇']);
        let hits: Vec<char> = registry.search("STRAN").into_iter().map(|(c, _)| c).collect();
        assert_eq!(hits, vec!['奇']);
        assert!(registry.search("  ").is_empty());
        assert!(registry.search("mountain").is_empty());
    }

    #[test]
    fn test_render_hints() {
        let mut registry = GlyphRegistry::new();
        registry.insert('江', GlyphRecord::new(code(1, 2, 3), ""));
        registry.insert('稀', GlyphRecord::new(code(4, 5, 6), ""));
        let hinted = registry.render_hints("江永女书奇，闺中秘语稀。");
        assert_eq!(hinted.text, "[1-2-3]永女书奇，闺中秘语[4-5-6]。");
        assert_eq!(hinted.replaced, vec![0, 10]);
    }

    #[test]
    fn test_known_mapping() {
        let mut registry = GlyphRegistry::new();
        registry.insert('江', GlyphRecord::new(code(1, 2, 3), ""));
        let known = registry.known_mapping();
        assert_eq!(known.get(&'江'), Some(&code(1, 2, 3)));
        assert_eq!(known.len(), 1);
    }
}
