use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::DynVideoSource;
use crate::error::{SourceError, SourceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    ImageDir,
}

impl FromStr for Backend {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "image-dir" | "image_dir" | "images" => Ok(Backend::ImageDir),
            other => Err(SourceError::configuration(format!(
                "unknown source backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mock => "mock",
            Backend::ImageDir => "image-dir",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compiled_backends() -> Vec<Backend> {
    let mut backends = Vec::new();
    #[cfg(feature = "backend-mock")]
    {
        backends.push(Backend::Mock);
    }
    #[cfg(feature = "backend-image-dir")]
    {
        backends.push(Backend::ImageDir);
    }
    backends
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    pub input: Option<PathBuf>,
    pub channel_capacity: Option<NonZeroUsize>,
    pub frame_interval: Option<Duration>,
    pub frame_count: Option<usize>,
}

impl Default for Configuration {
    fn default() -> Self {
        let backend = compiled_backends()
            .into_iter()
            .next()
            .unwrap_or(Backend::Mock);
        Self {
            backend,
            input: None,
            channel_capacity: None,
            frame_interval: None,
            frame_count: None,
        }
    }
}

impl Configuration {
    pub fn from_env() -> SourceResult<Self> {
        let mut config = Configuration::default();
        if let Ok(backend) = env::var("LIVESEM_SOURCE") {
            config.backend = Backend::from_str(&backend)?;
        }
        if let Ok(path) = env::var("LIVESEM_INPUT") {
            config.input = Some(PathBuf::from(path));
        }
        if let Ok(capacity) = env::var("LIVESEM_CHANNEL_CAPACITY") {
            let parsed: usize = capacity.parse().map_err(|_| {
                SourceError::configuration(format!(
                    "failed to parse LIVESEM_CHANNEL_CAPACITY='{capacity}' as a positive integer"
                ))
            })?;
            let Some(value) = NonZeroUsize::new(parsed) else {
                return Err(SourceError::configuration(
                    "LIVESEM_CHANNEL_CAPACITY must be greater than zero",
                ));
            };
            config.channel_capacity = Some(value);
        }
        Ok(config)
    }

    pub fn available_backends() -> Vec<Backend> {
        compiled_backends()
    }

    pub fn create_source(&self) -> SourceResult<DynVideoSource> {
        match self.backend {
            Backend::Mock => {
                #[cfg(feature = "backend-mock")]
                {
                    crate::backends::mock::boxed_mock(self)
                }
                #[cfg(not(feature = "backend-mock"))]
                {
                    Err(SourceError::unsupported("mock"))
                }
            }
            Backend::ImageDir => {
                #[cfg(feature = "backend-image-dir")]
                {
                    crate::backends::image_dir::boxed_image_dir(self)
                }
                #[cfg(not(feature = "backend-image-dir"))]
                {
                    Err(SourceError::unsupported("image-dir"))
                }
            }
        }
    }
}
