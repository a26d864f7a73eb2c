use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use live_semantic_types::MatchEvent;
use serde::{Deserialize, Serialize};

/// Wire form of a match event, shared by the JSON-lines and webhook sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub filter: String,
    pub frame_number: u64,
    pub timestamp_ms: u64,
    pub confidence: f32,
    pub image_bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl AlertPayload {
    pub fn from_event(event: &MatchEvent, include_image: bool) -> Self {
        let frame = event.matched_frame();
        Self {
            filter: event.matched_filter().text().to_string(),
            frame_number: frame.frame_number(),
            timestamp_ms: frame.timestamp_millis(),
            confidence: event.confidence(),
            image_bytes: frame.image_data().len(),
            image: include_image.then(|| STANDARD.encode(frame.image_data())),
        }
    }
}
