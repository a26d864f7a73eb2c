use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::Sender;

use live_semantic_types::Frame;

use crate::config::Configuration;
use crate::core::{DynVideoSource, StreamSource, spawn_stream_from_channel};
use crate::error::{SourceError, SourceResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

/// Treats a directory of still images as a stream, one file per frame in
/// file-name order. File contents are passed through untouched.
#[derive(Debug, Clone)]
pub struct ImageDirProvider {
    files: Vec<PathBuf>,
    frame_interval: Duration,
    channel_capacity: usize,
}

impl ImageDirProvider {
    const DEFAULT_CHANNEL_CAPACITY: usize = 8;

    pub fn open(
        dir: &Path,
        frame_interval: Duration,
        channel_capacity: usize,
    ) -> SourceResult<Self> {
        if !dir.is_dir() {
            return Err(SourceError::configuration(format!(
                "image directory '{}' does not exist or is not a directory",
                dir.display()
            )));
        }
        let files = list_images(dir)?;
        tracing::debug!(
            dir = %dir.display(),
            files = files.len(),
            "opening image directory source"
        );
        Ok(Self {
            files,
            frame_interval,
            channel_capacity: channel_capacity.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn emit_frames(&self, tx: Sender<SourceResult<Frame>>) {
        for (index, path) in self.files.iter().enumerate() {
            if tx.is_closed() {
                break;
            }
            let item = fs::read(path)
                .map(|bytes| Frame::new(index as u64, SystemTime::now(), bytes))
                .map_err(|err| {
                    SourceError::backend_failure(
                        "image-dir",
                        format!("failed to read '{}': {err}", path.display()),
                    )
                });
            let failed = item.is_err();
            if tx.blocking_send(item).is_err() || failed {
                break;
            }
            if !self.frame_interval.is_zero() {
                thread::sleep(self.frame_interval);
            }
        }
    }

    pub fn into_source(self) -> DynVideoSource {
        let capacity = self.channel_capacity;
        let stream = spawn_stream_from_channel(capacity, move |tx| self.emit_frames(tx));
        Box::new(StreamSource::new("image-dir", stream))
    }
}

fn list_images(dir: &Path) -> SourceResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_image_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn boxed_image_dir(config: &Configuration) -> SourceResult<DynVideoSource> {
    let dir = config.input.as_deref().ok_or_else(|| {
        SourceError::configuration("image-dir source requires an input directory (LIVESEM_INPUT)")
    })?;
    let provider = ImageDirProvider::open(
        dir,
        config.frame_interval.unwrap_or(Duration::ZERO),
        config
            .channel_capacity
            .map(|n| n.get())
            .unwrap_or(ImageDirProvider::DEFAULT_CHANNEL_CAPACITY),
    )?;
    Ok(provider.into_source())
}
