//! Embedding generation.
//!
//! The hashing embedder is the baseline: every token is hashed with SHA-256,
//! folded into one of `dimensions` buckets with a +1/-1 sign, and the result
//! is L2-normalized. It needs no model and is bit-for-bit reproducible.
//!
//! An [`EmbeddingProvider`] may be plugged in on top. Whenever it fails the
//! embedder falls back to the hashing path, so callers never see provider
//! errors.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Default embedding dimensions
pub const DEFAULT_DIMENSIONS: usize = 384;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9']+").expect("valid regex"));

/// Error type for embedding providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("Provider initialization failed: {0}")]
    InitFailed(String),
}

/// An external source of embeddings.
pub trait EmbeddingProvider: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Text embedder with a fixed output dimension.
#[derive(Clone)]
pub struct Embedder {
    dimensions: usize,
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl Embedder {
    /// Create an embedder that only uses the hashing path.
    pub fn hashing(dimensions: usize) -> Self {
        Self {
            dimensions,
            provider: None,
        }
    }

    /// Attach an external provider, tried before the hashing path.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// Embed a single text.
    ///
    /// Empty or whitespace-only input yields the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f64> {
        let text = text.trim();
        if text.is_empty() {
            return vec![0.0; self.dimensions];
        }

        match &self.provider {
            Some(provider) => {
                let result = self.embed_with(provider.as_ref(), text);
                or_hashed(result, provider.name(), text, self.dimensions)
            }
            None => hash_embed(text, self.dimensions),
        }
    }

    /// Embed many texts in parallel, preserving input order.
    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f64>> {
        use rayon::prelude::*;

        texts.par_iter().map(|text| self.embed(text)).collect()
    }

    fn embed_with(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
    ) -> Result<Vec<f64>, ProviderError> {
        let vector = provider.embed(text)?;
        if vector.len() != self.dimensions {
            return Err(ProviderError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        Ok(vector.into_iter().map(f64::from).collect())
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("dimensions", &self.dimensions)
            .field("provider", &self.provider_name())
            .finish()
    }
}

/// Resolve a provider result, replacing any failure with the hashing embedding.
pub fn or_hashed(
    result: Result<Vec<f64>, ProviderError>,
    provider: &str,
    text: &str,
    dimensions: usize,
) -> Vec<f64> {
    result.unwrap_or_else(|e| {
        log::warn!("provider={provider} outcome=fallback err={e}");
        hash_embed(text, dimensions)
    })
}

/// Split text into lower-cased tokens of ASCII letters, digits and apostrophes.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Deterministic hashing embedding.
///
/// The SHA-256 digest is read as a big-endian integer `h`; the bucket is
/// `h mod dimensions` and bit 8 of `h` chooses the sign (clear is +1).
pub fn hash_embed(text: &str, dimensions: usize) -> Vec<f64> {
    let mut vector = vec![0.0f64; dimensions];
    if dimensions == 0 {
        return vector;
    }

    for token in tokenize(text) {
        let digest = Sha256::digest(token.as_bytes());
        let (bucket, sign) = bucket_and_sign(&digest, dimensions);
        vector[bucket] += sign;
    }

    normalize(&mut vector);
    vector
}

fn bucket_and_sign(digest: &[u8], dimensions: usize) -> (usize, f64) {
    let modulus = dimensions as u64;
    let bucket = digest
        .iter()
        .fold(0u64, |acc, &byte| (acc * 256 + u64::from(byte)) % modulus);

    // bit 8 of the big-endian integer is the low bit of the second-to-last byte
    let sign_bit = digest[digest.len() - 2] & 1;
    let sign = if sign_bit == 0 { 1.0 } else { -1.0 };

    (bucket as usize, sign)
}

/// Divide by the L2 norm in place. A zero vector is left untouched.
pub fn normalize(vector: &mut [f64]) {
    let norm = l2_norm(vector);
    let norm = if norm == 0.0 { 1.0 } else { norm };
    for x in vector.iter_mut() {
        *x /= norm;
    }
}

pub fn l2_norm(vector: &[f64]) -> f64 {
    vector.iter().map(|x| x * x).sum::<f64>().sqrt()
}
