//! Deterministic feature-hashing embedder.
//!
//! Text is split into lowercase words and character trigrams, image bytes
//! are folded into a histogram, and both land in the same bucket space. The
//! result is stable across runs and needs no model, which makes it the
//! offline default. It carries no real semantic signal.

use async_trait::async_trait;
use live_semantic_types::{Embedding, Filter, Frame};

use crate::engine::EmbeddingProvider;
use crate::error::{EmbedError, EmbedResult};

const TRIGRAM_WEIGHT: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: Self::DEFAULT_DIMENSIONS,
        }
    }
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 64;

    pub fn new(dimensions: usize) -> EmbedResult<Self> {
        if dimensions == 0 {
            return Err(EmbedError::configuration(
                "hashing embedder needs at least one dimension",
            ));
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut buckets = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            buckets[self.bucket(word.as_bytes())] += 1.0;

            let padded: Vec<char> = format!(" {word} ").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                buckets[self.bucket(trigram.as_bytes())] += TRIGRAM_WEIGHT;
            }
        }
        normalize(buckets)
    }

    pub fn embed_bytes(&self, data: &[u8]) -> Embedding {
        let mut buckets = vec![0.0f32; self.dimensions];
        for &byte in data {
            buckets[usize::from(byte) % self.dimensions] += 1.0;
        }
        normalize(buckets)
    }

    fn bucket(&self, token: &[u8]) -> usize {
        (fnv1a(token) % self.dimensions as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &'static str {
        "hashing"
    }

    async fn encode_text(&self, filter: &mut Filter) -> EmbedResult<()> {
        let embedding = self.embed_text(filter.text());
        filter.resolve(embedding)?;
        Ok(())
    }

    async fn encode_image(&self, frame: &Frame) -> EmbedResult<Embedding> {
        Ok(self.embed_bytes(frame.image_data()))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

fn normalize(mut values: Vec<f32>) -> Embedding {
    let norm = values
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value = (f64::from(*value) / norm) as f32;
        }
    }
    values
}
