use std::path::{Path, PathBuf};

use async_trait::async_trait;
use live_semantic_types::MatchEvent;

use crate::error::AlertResult;
use crate::sink::AlertSink;

/// Writes the bytes of every matched frame into a directory as
/// `frame_<number>.<ext>`.
#[derive(Debug, Clone)]
pub struct FrameDumpSink {
    directory: PathBuf,
}

impl FrameDumpSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn frame_path(&self, frame_number: u64, data: &[u8]) -> PathBuf {
        self.directory
            .join(format!("frame_{frame_number:08}.{}", sniff_extension(data)))
    }
}

#[async_trait]
impl AlertSink for FrameDumpSink {
    fn name(&self) -> &'static str {
        "dump"
    }

    async fn alert(&self, event: MatchEvent) -> AlertResult<()> {
        let frame = event.matched_frame();
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.frame_path(frame.frame_number(), frame.image_data());
        tokio::fs::write(&path, frame.image_data()).await?;
        tracing::debug!(path = %path.display(), "dumped matched frame");
        Ok(())
    }
}

fn sniff_extension(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "webp"
    } else if data.starts_with(b"BM") {
        "bmp"
    } else {
        "bin"
    }
}
