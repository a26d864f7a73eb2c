use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use live_semantic_types::{Embedding, Filter, Frame};

use crate::error::{EmbedError, EmbedResult};

pub type DynEmbeddingProvider = Arc<dyn EmbeddingProvider>;

/// Common interface for all embedding providers.
///
/// Text and image embeddings must live in the same space and keep one fixed
/// dimensionality for the lifetime of the provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn warm_up(&self) -> EmbedResult<()> {
        Ok(())
    }

    /// Resolves the filter's embedding from its text.
    async fn encode_text(&self, filter: &mut Filter) -> EmbedResult<()>;

    async fn encode_image(&self, frame: &Frame) -> EmbedResult<Embedding>;
}

/// Pins the dimensionality of the first embedding seen and rejects later
/// embeddings of a different length.
#[derive(Debug, Default)]
pub(crate) struct DimensionLock {
    dimensions: AtomicUsize,
}

impl DimensionLock {
    pub(crate) fn check(&self, embedding: &[f32]) -> EmbedResult<()> {
        let actual = embedding.len();
        if actual == 0 {
            return Err(EmbedError::EmptyEmbedding);
        }
        match self
            .dimensions
            .compare_exchange(0, actual, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(expected) if expected == actual => Ok(()),
            Err(expected) => Err(EmbedError::DimensionMismatch { expected, actual }),
        }
    }

    pub(crate) fn dimensions(&self) -> Option<usize> {
        match self.dimensions.load(Ordering::Acquire) {
            0 => None,
            value => Some(value),
        }
    }
}
