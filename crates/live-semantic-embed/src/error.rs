use live_semantic_types::ModelError;
use thiserror::Error;

pub type EmbedResult<T> = Result<T, EmbedError>;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("backend error: {message}")]
    Backend { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("provider returned an empty embedding")]
    EmptyEmbedding,

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl EmbedError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
