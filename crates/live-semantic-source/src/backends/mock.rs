use std::thread;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::Sender;

use live_semantic_types::Frame;

use crate::config::Configuration;
use crate::core::{DynVideoSource, StreamSource, spawn_stream_from_channel};
use crate::error::SourceResult;

/// Emits synthetic frames: a `width` x `height` byte grid whose rows shift
/// with the frame index, so consecutive frames differ slightly.
#[derive(Debug, Clone)]
pub struct MockProvider {
    width: usize,
    height: usize,
    frame_count: usize,
    frame_interval: Duration,
    channel_capacity: usize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
            frame_count: Self::DEFAULT_FRAME_COUNT,
            frame_interval: Self::DEFAULT_FRAME_INTERVAL,
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl MockProvider {
    const DEFAULT_CHANNEL_CAPACITY: usize = 8;
    const DEFAULT_FRAME_COUNT: usize = 30;
    const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

    pub fn new(
        width: usize,
        height: usize,
        frame_count: usize,
        frame_interval: Duration,
        channel_capacity: usize,
    ) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frame_count,
            frame_interval,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn from_config(config: &Configuration) -> Self {
        let defaults = Self::default();
        Self::new(
            defaults.width,
            defaults.height,
            config.frame_count.unwrap_or(defaults.frame_count),
            config.frame_interval.unwrap_or(defaults.frame_interval),
            config
                .channel_capacity
                .map(|n| n.get())
                .unwrap_or(defaults.channel_capacity),
        )
    }

    fn generate_frame(&self, index: usize) -> Frame {
        let mut buffer = vec![0u8; self.width * self.height];
        for (row, chunk) in buffer.chunks_mut(self.width).enumerate() {
            let value = ((row + index) % 256) as u8;
            chunk.fill(value);
        }
        Frame::new(index as u64, SystemTime::now(), buffer)
    }

    fn emit_frames(&self, tx: Sender<SourceResult<Frame>>) {
        for index in 0..self.frame_count {
            if tx.is_closed() {
                break;
            }
            if tx.blocking_send(Ok(self.generate_frame(index))).is_err() {
                break;
            }
            if !self.frame_interval.is_zero() {
                thread::sleep(self.frame_interval);
            }
        }
    }

    pub fn into_source(self) -> DynVideoSource {
        let capacity = self.channel_capacity;
        tracing::debug!(
            frames = self.frame_count,
            interval_ms = self.frame_interval.as_millis() as u64,
            "opening mock video source"
        );
        let stream = spawn_stream_from_channel(capacity, move |tx| self.emit_frames(tx));
        Box::new(StreamSource::new("mock", stream))
    }
}

pub fn boxed_mock(config: &Configuration) -> SourceResult<DynVideoSource> {
    Ok(MockProvider::from_config(config).into_source())
}
