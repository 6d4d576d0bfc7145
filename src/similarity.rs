// src/similarity.rs
//! Text-similarity backends used to match row labels to canonical metrics.

use crate::llm::OllamaClient;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("embedding request failed: {0}")]
    Backend(#[from] crate::error::AppError),

    #[error("embedding for '{0}' is empty or has zero norm")]
    DegenerateEmbedding(String),

    #[error("embedding sizes differ ({0} vs {1})")]
    DimensionMismatch(usize, usize),
}

/// Scores how close two pieces of text are, from 0.0 (unrelated) to 1.0.
#[async_trait]
pub trait TextSimilarityScorer: Send + Sync {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError>;
}

// ---------------------------------------------------------------------------
// Lexical (default, offline)
// ---------------------------------------------------------------------------

/// Normalized Levenshtein similarity, taking the best of the whole label and
/// every run of words in it as long as the other side.
///
/// "Total Revenue" therefore scores 1.0 against "revenue".
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalScorer;

#[async_trait]
impl TextSimilarityScorer for LexicalScorer {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        Ok(lexical_similarity(a, b))
    }
}

pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let a_words: Vec<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let b_words: Vec<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let (long, short) = if a_words.len() >= b_words.len() {
        (&a_words, &b_words)
    } else {
        (&b_words, &a_words)
    };
    let target = short.join(" ");

    let whole = ratio(&long.join(" "), &target);
    long.windows(short.len())
        .map(|w| ratio(&w.join(" "), &target))
        .fold(whole, f64::max)
}

fn ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

// ---------------------------------------------------------------------------
// Ollama embeddings
// ---------------------------------------------------------------------------

/// Cosine similarity of embeddings served by the local Ollama instance.
/// Embeddings are cached per text for the lifetime of the scorer.
pub struct OllamaEmbeddingScorer {
    client: OllamaClient,
    model: String,
    cache: Mutex<HashMap<String, Vec<f64>>>,
}

impl OllamaEmbeddingScorer {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn embedding(&self, text: &str) -> Result<Vec<f64>, SimilarityError> {
        if let Some(hit) = self.cache.lock().await.get(text) {
            return Ok(hit.clone());
        }
        let embedding = self.client.embed(&self.model, text).await?;
        debug!(text = %text, dims = embedding.len(), "Fetched embedding");
        self.cache
            .lock()
            .await
            .insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }
}

#[async_trait]
impl TextSimilarityScorer for OllamaEmbeddingScorer {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        let ea = self.embedding(a).await?;
        let eb = self.embedding(b).await?;
        cosine(&ea, &eb, a, b)
    }
}

fn cosine(a: &[f64], b: &[f64], a_text: &str, b_text: &str) -> Result<f64, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch(a.len(), b.len()));
    }
    let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 {
        return Err(SimilarityError::DegenerateEmbedding(a_text.to_string()));
    }
    if nb == 0.0 {
        return Err(SimilarityError::DegenerateEmbedding(b_text.to_string()));
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Ok((dot / (na * nb)).clamp(0.0, 1.0))
}

// ---------------------------------------------------------------------------
// Test stub
// ---------------------------------------------------------------------------

/// Deterministic scorer: 1.0 on case-insensitive equality, 0.9 when one
/// contains the other, 0.0 otherwise.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringScorer;

#[cfg(test)]
#[async_trait]
impl TextSimilarityScorer for SubstringScorer {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
        Ok(if a.is_empty() || b.is_empty() {
            0.0
        } else if a == b {
            1.0
        } else if a.contains(&b) || b.contains(&a) {
            0.9
        } else {
            0.0
        })
    }
}
