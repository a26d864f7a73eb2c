use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use futures_util::stream::unfold;
use tokio::sync::mpsc::{self, Sender};

use live_semantic_types::Frame;

use crate::error::{SourceError, SourceResult};

pub type FrameStream = Pin<Box<dyn Stream<Item = SourceResult<Frame>> + Send>>;

pub type DynVideoSource = Box<dyn VideoSource>;

/// Pull-based access to an ordered sequence of frames.
#[async_trait]
pub trait VideoSource: Send {
    fn name(&self) -> &'static str;

    /// Reads the next frame. `Ok(None)` marks a clean end of stream; any
    /// `Err` means the stream is broken.
    async fn next_frame(&mut self) -> SourceResult<Option<Frame>>;

    /// Releases the underlying resources. A closed source reads as exhausted.
    async fn close(&mut self) -> SourceResult<()> {
        Ok(())
    }
}

/// Adapts a [`FrameStream`] into a [`VideoSource`] and enforces strictly
/// increasing frame numbers.
pub struct StreamSource {
    name: &'static str,
    stream: Option<FrameStream>,
    last_frame_number: Option<u64>,
}

impl StreamSource {
    pub fn new(name: &'static str, stream: FrameStream) -> Self {
        Self {
            name,
            stream: Some(stream),
            last_frame_number: None,
        }
    }

    fn check_order(&mut self, frame: &Frame) -> SourceResult<()> {
        let current = frame.frame_number();
        if let Some(previous) = self.last_frame_number {
            if current <= previous {
                return Err(SourceError::OutOfOrder { previous, current });
            }
        }
        self.last_frame_number = Some(current);
        Ok(())
    }
}

#[async_trait]
impl VideoSource for StreamSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn next_frame(&mut self) -> SourceResult<Option<Frame>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(frame)) => {
                self.check_order(&frame)?;
                Ok(Some(frame))
            }
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> SourceResult<()> {
        if self.stream.take().is_some() {
            tracing::debug!(source = self.name, "video source closed");
        }
        Ok(())
    }
}

/// Runs a blocking frame producer on the blocking pool and exposes its output
/// as a stream. The producer should stop once `tx` reports the receiver gone.
pub fn spawn_stream_from_channel(
    capacity: usize,
    task: impl FnOnce(Sender<SourceResult<Frame>>) + Send + 'static,
) -> FrameStream {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::task::spawn_blocking(move || task(tx));
    let stream = unfold(rx, |mut receiver| async {
        receiver.recv().await.map(|item| (item, receiver))
    });
    Box::pin(stream)
}
