mod backends;
mod config;
mod engine;
mod error;

#[cfg(feature = "provider-hashing")]
pub use backends::hashing::HashingEmbedder;
#[cfg(feature = "provider-http")]
pub use backends::http::HttpEmbedder;
pub use config::{EmbedderConfig, ProviderKind};
pub use engine::{DynEmbeddingProvider, EmbeddingProvider};
pub use error::{EmbedError, EmbedResult};
