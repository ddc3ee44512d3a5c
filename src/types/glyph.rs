//! Glyph codes: the discrete identity of a generated symbol

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{GLYPH_DIM, GLYPH_LEVELS};

/// Three small integers naming a generated glyph.
///
/// Two characters with identical codes render identically. Codes are only
/// produced by a gateway projection or read back from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "[u8; 3]", into = "[u8; 3]")]
pub struct GlyphCode([u8; GLYPH_DIM]);

impl GlyphCode {
    /// Create a code, rejecting components outside 0..GLYPH_LEVELS
    pub fn new(components: [u8; GLYPH_DIM]) -> Option<Self> {
        if components.iter().all(|&c| c < GLYPH_LEVELS) {
            Some(Self(components))
        } else {
            None
        }
    }

    /// Build a code from loosely typed numbers (legacy registry lists)
    pub fn from_numbers(values: &[f64]) -> Option<Self> {
        if values.len() != GLYPH_DIM {
            return None;
        }
        let mut components = [0u8; GLYPH_DIM];
        for (slot, &value) in components.iter_mut().zip(values) {
            if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
                return None;
            }
            if value >= GLYPH_LEVELS as f64 {
                return None;
            }
            *slot = value as u8;
        }
        Some(Self(components))
    }

    /// The raw components
    pub fn components(&self) -> [u8; GLYPH_DIM] {
        self.0
    }

    /// Stable key used in file names and display, e.g. `14-0-16`
    pub fn key(&self) -> String {
        self.0
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for GlyphCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

impl TryFrom<[u8; GLYPH_DIM]> for GlyphCode {
    type Error = ParseGlyphError;

    fn try_from(components: [u8; GLYPH_DIM]) -> Result<Self, Self::Error> {
        Self::new(components).ok_or_else(|| ParseGlyphError(format!("{:?}", components)))
    }
}

impl From<GlyphCode> for [u8; GLYPH_DIM] {
    fn from(code: GlyphCode) -> Self {
        code.0
    }
}

/// Error parsing a glyph key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid glyph key {0:?}, expected three small components joined by '-'")]
pub struct ParseGlyphError(pub String);

impl FromStr for GlyphCode {
    type Err = ParseGlyphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.len() != GLYPH_DIM {
            return Err(ParseGlyphError(s.to_string()));
        }
        let mut components = [0u8; GLYPH_DIM];
        for (slot, part) in components.iter_mut().zip(parts) {
            *slot = part
                .trim()
                .parse::<u8>()
                .map_err(|_| ParseGlyphError(s.to_string()))?;
        }
        Self::new(components).ok_or_else(|| ParseGlyphError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range() {
        assert!(GlyphCode::new([14, 0, 16]).is_some());
        assert!(GlyphCode::new([GLYPH_LEVELS, 0, 0]).is_none());
    }

    #[test]
    fn test_key_and_parse() {
        let code = GlyphCode::new([14, 0, 16]).unwrap();
        assert_eq!(code.key(), "14-0-16");
        assert_eq!("14-0-16".parse::<GlyphCode>().unwrap(), code);
        assert!("14-0".parse::<GlyphCode>().is_err());
        assert!("a-b-c".parse::<GlyphCode>().is_err());
    }

    #[test]
    fn test_from_numbers() {
        assert_eq!(
            GlyphCode::from_numbers(&[3.0, 7.0, 1.0]),
            GlyphCode::new([3, 7, 1])
        );
        assert!(GlyphCode::from_numbers(&[3.5, 7.0, 1.0]).is_none());
        assert!(GlyphCode::from_numbers(&[3.0, 7.0]).is_none());
        assert!(GlyphCode::from_numbers(&[-1.0, 7.0, 1.0]).is_none());
    }

    #[test]
    fn test_serializes_as_array() {
        let code = GlyphCode::new([1, 2, 3]).unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "[1,2,3]");
        assert!(serde_json::from_str::<GlyphCode>("[1,2,99]").is_err());
    }
}
