use live_semantic_alert::AlertError;
use live_semantic_embed::EmbedError;
use live_semantic_source::SourceError;
use thiserror::Error;

use crate::settings::ConfigError;

/// Failures that end a run. Per-frame problems never show up here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to resolve filter embedding: {0}")]
    FilterEmbedding(#[source] EmbedError),

    #[error("video source failed: {0}")]
    Source(#[from] SourceError),

    #[error("too many consecutive embedding failures ({count})")]
    TooManyFailures { count: u32 },
}

/// Failures while wiring collaborators, before a run starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("video source: {0}")]
    Source(#[from] SourceError),

    #[error("embedding provider: {0}")]
    Embed(#[from] EmbedError),

    #[error("alert sink: {0}")]
    Alert(#[from] AlertError),
}
