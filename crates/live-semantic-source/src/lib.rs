pub mod backends;
pub mod config;
pub mod core;
mod error;

pub use config::{Backend, Configuration};
pub use crate::core::{
    DynVideoSource, FrameStream, StreamSource, VideoSource, spawn_stream_from_channel,
};
pub use error::{SourceError, SourceResult};
