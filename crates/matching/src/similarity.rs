//! Title similarity scoring.
//!
//! Two modes: a lexical longest-common-subsequence ratio that always works,
//! and an optional semantic mode backed by a pluggable embedding provider.
//! When no backend is installed, or a backend call fails, scoring silently
//! degrades to lexical so matching never goes dark in production.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::debug;

/// Provides sentence embeddings for semantic similarity.
///
/// The engine never ships a model; deployments can plug in an external
/// service or a local encoder behind this trait.
pub trait EmbeddingBackend: Send + Sync {
    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Any error makes the caller fall back to lexical similarity.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Lexical similarity: `2 * lcs(a, b) / (|a| + |b|)`, in [0, 1].
///
/// Symmetric by construction; identical strings score 1.0.
#[must_use]
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    // Classic two-row LCS table.
    let mut prev = vec![0usize; b_chars.len() + 1];
    let mut curr = vec![0usize; b_chars.len() + 1];
    for &ca in &a_chars {
        for (j, &cb) in b_chars.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b_chars.len()];

    #[allow(clippy::cast_precision_loss)]
    let ratio = 2.0 * lcs as f64 / (a_chars.len() + b_chars.len()) as f64;
    ratio
}

fn cosine(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Similarity scorer with an optional semantic backend and a process-local,
/// read-through embedding cache.
///
/// Safe to share across threads; the cache is only ever appended to.
#[derive(Clone, Default)]
pub struct SimilarityScorer {
    backend: Option<Arc<dyn EmbeddingBackend>>,
    cache: Arc<RwLock<HashMap<String, Arc<Vec<f32>>>>>,
}

impl SimilarityScorer {
    /// Creates a lexical-only scorer.
    #[must_use]
    pub fn lexical() -> Self {
        Self::default()
    }

    /// Creates a scorer that prefers the given semantic backend.
    #[must_use]
    pub fn with_backend(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend: Some(backend),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns true when a semantic backend is installed.
    #[must_use]
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    fn embedding(&self, backend: &Arc<dyn EmbeddingBackend>, text: &str) -> Result<Arc<Vec<f32>>> {
        if let Some(cached) = self.cache.read().get(text) {
            return Ok(Arc::clone(cached));
        }
        let embedded = Arc::new(backend.embed(text)?);
        self.cache
            .write()
            .entry(text.to_string())
            .or_insert_with(|| Arc::clone(&embedded));
        Ok(embedded)
    }

    /// Scores two texts in [0, 1].
    ///
    /// Semantic scoring is attempted when a backend is installed; any
    /// backend failure degrades to the lexical ratio without surfacing an
    /// error.
    #[must_use]
    pub fn score(&self, a: &str, b: &str) -> f64 {
        if let Some(backend) = &self.backend {
            match (self.embedding(backend, a), self.embedding(backend, b)) {
                (Ok(ea), Ok(eb)) => {
                    if let Some(sim) = cosine(&ea, &eb) {
                        // Cosine of sentence embeddings lands in [-1, 1];
                        // clamp into the score range.
                        return sim.clamp(0.0, 1.0);
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    debug!(error = %e, "embedding backend failed, falling back to lexical");
                }
            }
        }
        lexical_similarity(a, b)
    }
}

impl std::fmt::Debug for SimilarityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityScorer")
            .field("semantic", &self.backend.is_some())
            .field("cached_embeddings", &self.cache.read().len())
            .finish()
    }
}
