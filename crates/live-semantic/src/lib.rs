//! Real-time semantic matching of video frames against a text filter.
//!
//! [`MatchingPipeline`] pulls frames from a video source, embeds them, scores
//! them against the filter embedding with [`cosine_similarity`], and hands
//! matches to an alert sink.

pub mod backend;
pub mod cli;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod settings;
pub mod similarity;

pub use error::{PipelineError, SetupError};
pub use pipeline::{
    MatchingPipeline, Outcome, PipelineConfig, ProgressCallback, RunReport, RunStats, RunSummary,
};
pub use similarity::cosine_similarity;
