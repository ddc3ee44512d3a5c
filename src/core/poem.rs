//! Poem utilities: punctuation, normalization, validation, substitution

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::NegotiationError;
use crate::{COUPLET_LINE_CHARS, SENTINEL};

lazy_static! {
    /// Unicode punctuation plus whitespace (line breaks count as punctuation)
    static ref RE_PUNCTUATION: Regex = Regex::new(r"^[\p{P}\s]$").unwrap();

    /// Line separators of a couplet: full-width stops and line breaks
    static ref RE_LINE_BREAK: Regex = Regex::new(r"[，。！？；\n]+").unwrap();
}

/// ASCII punctuation and its full-width counterpart
const FULL_WIDTH: &[(char, char)] = &[
    (',', '，'),
    ('.', '。'),
    ('!', '！'),
    ('?', '？'),
    (';', '；'),
    (':', '：'),
];

/// Is this character punctuation or whitespace?
pub fn is_punctuation(c: char) -> bool {
    let mut buf = [0u8; 4];
    RE_PUNCTUATION.is_match(c.encode_utf8(&mut buf))
}

/// Trim the poem and map ASCII punctuation to full-width
pub fn normalize(poem: &str) -> String {
    poem.trim()
        .chars()
        .map(|c| {
            FULL_WIDTH
                .iter()
                .find(|(ascii, _)| *ascii == c)
                .map(|(_, full)| *full)
                .unwrap_or(c)
        })
        .collect()
}

/// Reject poems the protocol cannot negotiate on
pub fn validate(poem: &str, min_chars: usize) -> Result<(), NegotiationError> {
    let count = poem.chars().count();
    if count == 0 {
        return Err(NegotiationError::InvalidInput("poem is empty".into()));
    }
    if count < min_chars {
        return Err(NegotiationError::InvalidInput(format!(
            "poem has {} characters, at least {} required",
            count, min_chars
        )));
    }
    if poem.contains(SENTINEL) {
        return Err(NegotiationError::InvalidInput(format!(
            "poem contains the reserved marker {:?}",
            SENTINEL
        )));
    }
    Ok(())
}

/// Lines of the poem, split on full-width stops and line breaks
pub fn lines(poem: &str) -> Vec<&str> {
    RE_LINE_BREAK
        .split(poem)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Exactly two lines of five non-punctuation characters each?
pub fn is_five_character_couplet(poem: &str) -> bool {
    let lines = lines(poem);
    lines.len() == 2
        && lines.iter().all(|line| {
            line.chars().filter(|&c| !is_punctuation(c)).count() == COUPLET_LINE_CHARS
        })
}

/// Cut every line to five characters and rebuild a `，` / `。` couplet.
///
/// Lines beyond the second are dropped.
pub fn ensure_five_chars(poem: &str) -> String {
    let lines: Vec<String> = lines(poem)
        .into_iter()
        .take(2)
        .map(|line| {
            line.chars()
                .filter(|&c| !is_punctuation(c))
                .take(COUPLET_LINE_CHARS)
                .collect()
        })
        .collect();
    match lines.as_slice() {
        [] => String::new(),
        [only] => format!("{}。", only),
        [first, second, ..] => format!("{}，{}。", first, second),
    }
}

/// Replace the character at `position`; `None` if out of range
pub fn substitute(poem: &str, position: usize, replacement: char) -> Option<String> {
    if position >= poem.chars().count() {
        return None;
    }
    Some(
        poem.chars()
            .enumerate()
            .map(|(i, c)| if i == position { replacement } else { c })
            .collect(),
    )
}

/// Character positions where two texts differ.
///
/// A length difference counts every surplus position as differing.
pub fn differing_positions(a: &str, b: &str) -> Vec<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    (0..longest)
        .filter(|&i| a.get(i) != b.get(i))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
