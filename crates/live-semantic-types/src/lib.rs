//! Shared domain models for the live-semantic workspace.
//!
//! This crate holds the small data structures passed between the video
//! source, embedding, alert, and pipeline crates. Keep it free of runtime and
//! backend dependencies so every crate can depend on it cheaply.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Threshold used when a request does not carry one.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

pub type Embedding = Vec<f32>;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("filter '{text}' already has an embedding")]
    AlreadyResolved { text: String },

    #[error("confidence {confidence} does not exceed threshold {threshold}")]
    BelowThreshold { confidence: f32, threshold: f32 },
}

/// A user-defined semantic query.
///
/// The text never changes after construction. The embedding starts out empty
/// and can be resolved exactly once.
#[derive(Clone, PartialEq)]
pub struct Filter {
    text: String,
    embedding: Option<Embedding>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("text", &self.text)
            .field("dimensions", &self.embedding.as_ref().map(Vec::len))
            .finish()
    }
}

impl Filter {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            embedding: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn is_resolved(&self) -> bool {
        self.embedding.is_some()
    }

    pub fn resolve(&mut self, embedding: Embedding) -> ModelResult<()> {
        if self.embedding.is_some() {
            return Err(ModelError::AlreadyResolved {
                text: self.text.clone(),
            });
        }
        self.embedding = Some(embedding);
        Ok(())
    }
}

/// One sampled unit of video.
#[derive(Clone)]
pub struct Frame {
    frame_number: u64,
    timestamp: SystemTime,
    image_data: Arc<[u8]>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("frame_number", &self.frame_number)
            .field("timestamp_ms", &self.timestamp_millis())
            .field("bytes", &self.image_data.len())
            .finish()
    }
}

impl Frame {
    pub fn new(frame_number: u64, timestamp: SystemTime, image_data: Vec<u8>) -> Self {
        Self {
            frame_number,
            timestamp,
            image_data: Arc::from(image_data.into_boxed_slice()),
        }
    }

    pub fn from_shared(frame_number: u64, timestamp: SystemTime, image_data: Arc<[u8]>) -> Self {
        Self {
            frame_number,
            timestamp,
            image_data,
        }
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Milliseconds since the Unix epoch, saturating at zero for clocks set
    /// before 1970.
    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0)
    }

    pub fn image_data(&self) -> &[u8] {
        &self.image_data
    }

    pub fn shared_image_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.image_data)
    }
}

/// Produced when a frame's similarity to a filter exceeds the threshold.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    matched_frame: Frame,
    matched_filter: Arc<Filter>,
    confidence: f32,
}

impl MatchEvent {
    /// Builds the event only when `confidence` strictly exceeds `threshold`.
    pub fn above_threshold(
        matched_frame: Frame,
        matched_filter: Arc<Filter>,
        confidence: f32,
        threshold: f32,
    ) -> ModelResult<Self> {
        // NaN on either side never matches.
        if confidence.partial_cmp(&threshold) != Some(Ordering::Greater) {
            return Err(ModelError::BelowThreshold {
                confidence,
                threshold,
            });
        }
        Ok(Self {
            matched_frame,
            matched_filter,
            confidence,
        })
    }

    pub fn matched_frame(&self) -> &Frame {
        &self.matched_frame
    }

    pub fn matched_filter(&self) -> &Filter {
        &self.matched_filter
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn into_frame(self) -> Frame {
        self.matched_frame
    }
}

/// Input of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub filter: String,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
}

impl AnalysisRequest {
    pub fn new(filter: impl Into<String>, similarity_threshold: f32) -> Self {
        Self {
            filter: filter.into(),
            similarity_threshold,
        }
    }
}

fn default_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}
