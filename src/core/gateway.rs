//! Embedding gateway: text → vector, vector → glyph code
//!
//! The negotiation only ever talks to `EmbeddingGateway`. `TableGateway` is
//! the in-process implementation over a character vector table, with a
//! `LinearProjector` fitted by PCA when the table ships no projection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::poem::is_punctuation;
use crate::types::{GatewayError, GlyphCode};
use crate::{GLYPH_DIM, GLYPH_LEVELS};

/// Power iterations per principal component
const POWER_ITERATIONS: usize = 200;

/// Norm below which a component is considered degenerate
const DEGENERATE_NORM: f64 = 1e-9;

/// Characters of the built-in demo vocabulary
pub const DEMO_CHARACTERS: &str = "江永女书奇闺中秘语稀\
    春夏秋冬风花雪月山水云雨天地日星河海湖江川林木草叶竹松梅兰菊桃柳\
    人心情思梦爱恨愁喜悲乐歌诗词文字言语声音光影色香美好远近高低长短\
    东西南北前后左右上下内外来去行走飞舞歌唱笑哭看听说想念望归离别\
    红黄蓝绿白黑青紫金银玉石火土家国城村门窗楼台桥路船车马鸟鱼虫\
    母姐妹儿孙朋友客主君臣老少新旧早晚朝夕年岁时春宵夜晓明暗清浊\
    一二三四五六七八九十百千万";

/// Source of vectors and glyph codes for the negotiation
pub trait EmbeddingGateway {
    /// Length of every vector this gateway produces
    fn dimension(&self) -> usize;

    /// Embed a text. Punctuation is ignored.
    fn embed(&self, text: &str) -> Result<Vec<f32>, GatewayError>;

    /// Embed a single character
    fn embed_char(&self, character: char) -> Result<Vec<f32>, GatewayError> {
        let mut buf = [0u8; 4];
        self.embed(character.encode_utf8(&mut buf))
    }

    /// Project a raw vector onto a glyph code. Deterministic.
    fn project(&self, vector: &[f32]) -> Result<GlyphCode, GatewayError>;

    /// Candidate characters, sorted, punctuation-free
    fn vocabulary(&self) -> &[char];
}

/// Cosine distance in `[0, 2]`; a zero vector is at distance 1 from anything
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return 1.0;
    }
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    (1.0 - similarity) as f32
}

// =============================================================================
// PROJECTION
// =============================================================================

/// Linear projection onto three axes, each quantized into `levels` steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProjector {
    /// Centre subtracted before projecting; empty means zero
    #[serde(default)]
    pub mean: Vec<f32>,
    /// One axis per glyph component
    pub axes: Vec<Vec<f32>>,
    /// `[low, high]` score range per axis, mapped onto `0..levels`
    pub ranges: Vec<[f32; 2]>,
    /// Quantization steps per component
    pub levels: u8,
}

impl LinearProjector {
    /// Fit by PCA over the given rows.
    ///
    /// Components come from power iteration with deflation; a degenerate
    /// component falls back to the first standard axis orthogonal to the
    /// ones already chosen.
    pub fn fit(rows: &[&[f32]], levels: u8) -> Result<Self, GatewayError> {
        let dimension = match rows.first() {
            Some(row) => row.len(),
            None => return Err(GatewayError::Projection("no vectors to fit".into())),
        };
        if dimension == 0 {
            return Err(GatewayError::Projection("vectors have dimension 0".into()));
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0f64; dimension];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row.iter()) {
                *m += *x as f64 / n;
            }
        }

        let mut centered: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| row.iter().zip(&mean).map(|(x, m)| *x as f64 - m).collect())
            .collect();

        let mut axes: Vec<Vec<f64>> = Vec::with_capacity(GLYPH_DIM);
        for k in 0..GLYPH_DIM {
            let axis = match principal_component(&centered, dimension, k) {
                Some(axis) => axis,
                None => fallback_axis(&axes, dimension),
            };
            for row in centered.iter_mut() {
                let score = dot64(row, &axis);
                for (x, a) in row.iter_mut().zip(&axis) {
                    *x -= score * a;
                }
            }
            axes.push(axis);
        }

        let mean: Vec<f32> = mean.iter().map(|m| *m as f32).collect();
        let axes: Vec<Vec<f32>> = axes
            .iter()
            .map(|axis| axis.iter().map(|a| *a as f32).collect())
            .collect();

        let mut ranges = vec![[f32::INFINITY, f32::NEG_INFINITY]; GLYPH_DIM];
        for row in rows {
            for (k, axis) in axes.iter().enumerate() {
                let score = centered_dot(row, &mean, axis);
                ranges[k][0] = ranges[k][0].min(score);
                ranges[k][1] = ranges[k][1].max(score);
            }
        }

        let projector = Self {
            mean,
            axes,
            ranges,
            levels,
        };
        projector.validate(dimension)?;
        Ok(projector)
    }

    /// Check shape and values against a vector dimension
    pub fn validate(&self, dimension: usize) -> Result<(), GatewayError> {
        if self.levels == 0 || self.levels > GLYPH_LEVELS {
            return Err(GatewayError::Projection(format!(
                "levels must lie in 1..={}, got {}",
                GLYPH_LEVELS, self.levels
            )));
        }
        if self.axes.len() != GLYPH_DIM || self.ranges.len() != GLYPH_DIM {
            return Err(GatewayError::Projection(format!(
                "expected {} axes and ranges, got {} and {}",
                GLYPH_DIM,
                self.axes.len(),
                self.ranges.len()
            )));
        }
        if !self.mean.is_empty() && self.mean.len() != dimension {
            return Err(GatewayError::DimensionMismatch {
                expected: dimension,
                actual: self.mean.len(),
            });
        }
        for axis in &self.axes {
            if axis.len() != dimension {
                return Err(GatewayError::DimensionMismatch {
                    expected: dimension,
                    actual: axis.len(),
                });
            }
        }
        let all_finite = self
            .axes
            .iter()
            .flatten()
            .chain(self.mean.iter())
            .chain(self.ranges.iter().flatten())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(GatewayError::NonFinite);
        }
        Ok(())
    }

    /// Quantize a vector onto a glyph code
    pub fn project(&self, vector: &[f32]) -> Result<GlyphCode, GatewayError> {
        let top = (self.levels - 1) as f32;
        let mut components = [0u8; GLYPH_DIM];
        for (k, axis) in self.axes.iter().enumerate() {
            let score = centered_dot(vector, &self.mean, axis);
            let [low, high] = self.ranges[k];
            let span = high - low;
            let t = if span > f32::EPSILON {
                ((score - low) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            components[k] = (t * top).round() as u8;
        }
        GlyphCode::new(components)
            .ok_or_else(|| GatewayError::Projection(format!("components {:?} out of range", components)))
    }
}

fn dot64(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn centered_dot(vector: &[f32], mean: &[f32], axis: &[f32]) -> f32 {
    vector
        .iter()
        .enumerate()
        .map(|(i, x)| (x - mean.get(i).copied().unwrap_or(0.0)) * axis[i])
        .sum()
}

fn normalized(mut v: Vec<f64>) -> Option<Vec<f64>> {
    let norm = dot64(&v, &v).sqrt();
    if norm < DEGENERATE_NORM {
        return None;
    }
    v.iter_mut().for_each(|x| *x /= norm);
    Some(v)
}

/// Leading eigenvector of `XᵀX` by power iteration
fn principal_component(rows: &[Vec<f64>], dimension: usize, k: usize) -> Option<Vec<f64>> {
    // Deterministic start that is not orthogonal to typical data
    let start = (0..dimension)
        .map(|i| if i == k % dimension { 1.0 } else { 1.0 / (i + 2) as f64 })
        .collect();
    let mut v = normalized(start)?;
    for _ in 0..POWER_ITERATIONS {
        let mut w = vec![0.0f64; dimension];
        for row in rows {
            let score = dot64(row, &v);
            for (wi, xi) in w.iter_mut().zip(row) {
                *wi += score * xi;
            }
        }
        v = normalized(w)?;
    }
    // Fix the sign: largest component positive
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if pivot < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
    Some(v)
}

/// First standard axis orthogonal to `chosen`, or zero when none is left
fn fallback_axis(chosen: &[Vec<f64>], dimension: usize) -> Vec<f64> {
    for j in 0..dimension {
        let mut e = vec![0.0f64; dimension];
        e[j] = 1.0;
        for axis in chosen {
            let overlap = dot64(&e, axis);
            for (x, a) in e.iter_mut().zip(axis) {
                *x -= overlap * a;
            }
        }
        if let Some(axis) = normalized(e) {
            return axis;
        }
    }
    vec![0.0; dimension]
}

// =============================================================================
// TABLE GATEWAY
// =============================================================================

/// On-disk vocabulary file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyFile {
    pub dimension: usize,
    #[serde(default = "default_levels")]
    pub levels: u8,
    /// Single-character keys → vectors
    pub vectors: BTreeMap<String, Vec<f32>>,
    /// Explicit projection; fitted by PCA when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<LinearProjector>,
}

fn default_levels() -> u8 {
    GLYPH_LEVELS
}

/// Gateway over an in-memory character vector table
#[derive(Debug, Clone)]
pub struct TableGateway {
    dimension: usize,
    vectors: BTreeMap<char, Vec<f32>>,
    vocabulary: Vec<char>,
    projector: LinearProjector,
}

impl TableGateway {
    /// Build from a table, fitting the projection over its vocabulary
    pub fn new(vectors: BTreeMap<char, Vec<f32>>, levels: u8) -> Result<Self, GatewayError> {
        let dimension = check_table(&vectors)?;
        let rows: Vec<&[f32]> = vectors
            .iter()
            .filter(|(c, _)| !is_punctuation(**c))
            .map(|(_, v)| v.as_slice())
            .collect();
        let projector = LinearProjector::fit(&rows, levels)?;
        Ok(Self::assemble(dimension, vectors, projector))
    }

    /// Build from a table and an explicit projection
    pub fn with_projector(
        vectors: BTreeMap<char, Vec<f32>>,
        projector: LinearProjector,
    ) -> Result<Self, GatewayError> {
        let dimension = check_table(&vectors)?;
        projector.validate(dimension)?;
        Ok(Self::assemble(dimension, vectors, projector))
    }

    /// Load a vocabulary JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse a vocabulary JSON document
    pub fn from_json(json: &str) -> Result<Self, GatewayError> {
        let file: VocabularyFile = serde_json::from_str(json)?;
        let mut vectors = BTreeMap::new();
        for (key, vector) in file.vectors {
            let mut chars = key.chars();
            let character = match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(GatewayError::InvalidVocabulary(format!(
                        "key {:?} is not a single character",
                        key
                    )))
                }
            };
            if vector.len() != file.dimension {
                return Err(GatewayError::DimensionMismatch {
                    expected: file.dimension,
                    actual: vector.len(),
                });
            }
            vectors.insert(character, vector);
        }
        match file.projection {
            Some(projector) => Self::with_projector(vectors, projector),
            None => Self::new(vectors, file.levels),
        }
    }

    /// Seeded random table for demos and tests
    pub fn synthetic(
        characters: impl IntoIterator<Item = char>,
        dimension: usize,
        seed: u64,
    ) -> Result<Self, GatewayError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut vectors = BTreeMap::new();
        for c in characters {
            if is_punctuation(c) || vectors.contains_key(&c) {
                continue;
            }
            let v: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            vectors.insert(c, v);
        }
        Self::new(vectors, GLYPH_LEVELS)
    }

    /// Built-in demo vocabulary
    pub fn demo(seed: u64) -> Result<Self, GatewayError> {
        Self::synthetic(DEMO_CHARACTERS.chars().filter(|c| !c.is_whitespace()), 16, seed)
    }

    fn assemble(
        dimension: usize,
        vectors: BTreeMap<char, Vec<f32>>,
        projector: LinearProjector,
    ) -> Self {
        let vocabulary = vectors.keys().copied().filter(|c| !is_punctuation(*c)).collect();
        Self {
            dimension,
            vectors,
            vocabulary,
            projector,
        }
    }

    pub fn projector(&self) -> &LinearProjector {
        &self.projector
    }

    pub fn contains(&self, character: char) -> bool {
        self.vectors.contains_key(&character)
    }
}

/// Common dimension of a non-empty table with finite vectors
fn check_table(vectors: &BTreeMap<char, Vec<f32>>) -> Result<usize, GatewayError> {
    let dimension = match vectors.values().next() {
        Some(v) => v.len(),
        None => return Err(GatewayError::InvalidVocabulary("vocabulary is empty".into())),
    };
    if dimension == 0 {
        return Err(GatewayError::InvalidVocabulary("vectors have dimension 0".into()));
    }
    for v in vectors.values() {
        if v.len() != dimension {
            return Err(GatewayError::DimensionMismatch {
                expected: dimension,
                actual: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(GatewayError::NonFinite);
        }
    }
    Ok(dimension)
}

impl EmbeddingGateway for TableGateway {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, GatewayError> {
        let mut sum = vec![0.0f32; self.dimension];
        let mut count = 0usize;
        for c in text.chars().filter(|c| !is_punctuation(*c)) {
            let v = self.vectors.get(&c).ok_or(GatewayError::UnknownToken(c))?;
            for (s, x) in sum.iter_mut().zip(v) {
                *s += x;
            }
            count += 1;
        }
        if count == 0 {
            return Err(GatewayError::EmptyText);
        }
        sum.iter_mut().for_each(|s| *s /= count as f32);
        Ok(sum)
    }

    fn embed_char(&self, character: char) -> Result<Vec<f32>, GatewayError> {
        self.vectors
            .get(&character)
            .cloned()
            .ok_or(GatewayError::UnknownToken(character))
    }

    fn project(&self, vector: &[f32]) -> Result<GlyphCode, GatewayError> {
        if vector.len() != self.dimension {
            return Err(GatewayError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(GatewayError::NonFinite);
        }
        self.projector.project(vector)
    }

    fn vocabulary(&self) -> &[char] {
        &self.vocabulary
    }
}

// =============================================================================
// TESTS
// =============================================================================
