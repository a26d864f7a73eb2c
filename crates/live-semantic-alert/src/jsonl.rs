use std::path::{Path, PathBuf};

use async_trait::async_trait;
use live_semantic_types::MatchEvent;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::AlertResult;
use crate::payload::AlertPayload;
use crate::sink::AlertSink;

/// Appends one JSON object per match to a file. The file is opened on the
/// first alert and kept open afterwards.
pub struct JsonLinesSink {
    path: PathBuf,
    include_image: bool,
    file: Mutex<Option<File>>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>, include_image: bool) -> Self {
        Self {
            path: path.into(),
            include_image,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> AlertResult<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }
}

#[async_trait]
impl AlertSink for JsonLinesSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn alert(&self, event: MatchEvent) -> AlertResult<()> {
        let payload = AlertPayload::from_event(&event, self.include_image);
        let mut line = serde_json::to_vec(&payload)?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        let file = match guard.take() {
            Some(file) => file,
            None => self.open().await?,
        };
        let file = guard.insert(file);
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
