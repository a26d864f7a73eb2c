use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::DynEmbeddingProvider;
use crate::error::{EmbedError, EmbedResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Hashing,
    Http,
}

impl FromStr for ProviderKind {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hashing" | "hash" => Ok(ProviderKind::Hashing),
            "http" => Ok(ProviderKind::Http),
            other => Err(EmbedError::configuration(format!(
                "unknown embedding provider '{other}'"
            ))),
        }
    }
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Hashing => "hashing",
            ProviderKind::Http => "http",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub kind: ProviderKind,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub dimensions: Option<NonZeroUsize>,
    pub timeout: Option<Duration>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Hashing,
            endpoint: None,
            model: None,
            dimensions: None,
            timeout: None,
        }
    }
}

impl EmbedderConfig {
    pub fn create_provider(&self) -> EmbedResult<DynEmbeddingProvider> {
        match self.kind {
            ProviderKind::Hashing => self.build_hashing(),
            ProviderKind::Http => self.build_http(),
        }
    }

    #[cfg(feature = "provider-hashing")]
    fn build_hashing(&self) -> EmbedResult<DynEmbeddingProvider> {
        use crate::backends::hashing::HashingEmbedder;

        let dimensions = self
            .dimensions
            .map(NonZeroUsize::get)
            .unwrap_or(HashingEmbedder::DEFAULT_DIMENSIONS);
        Ok(Arc::new(HashingEmbedder::new(dimensions)?))
    }

    #[cfg(not(feature = "provider-hashing"))]
    fn build_hashing(&self) -> EmbedResult<DynEmbeddingProvider> {
        Err(EmbedError::configuration(
            "hashing provider is not compiled into this build",
        ))
    }

    #[cfg(feature = "provider-http")]
    fn build_http(&self) -> EmbedResult<DynEmbeddingProvider> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            EmbedError::configuration("http embedding provider requires an endpoint")
        })?;
        let embedder =
            crate::backends::http::HttpEmbedder::new(endpoint, self.model.clone(), self.timeout)?;
        Ok(Arc::new(embedder))
    }

    #[cfg(not(feature = "provider-http"))]
    fn build_http(&self) -> EmbedResult<DynEmbeddingProvider> {
        Err(EmbedError::configuration(
            "http provider is not compiled into this build",
        ))
    }
}
