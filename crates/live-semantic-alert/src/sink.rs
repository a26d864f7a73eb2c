use std::sync::Arc;

use async_trait::async_trait;
use live_semantic_types::MatchEvent;
use tokio::sync::mpsc;

use crate::error::{AlertError, AlertResult};

pub type DynAlertSink = Arc<dyn AlertSink>;

/// Delivers match events. Retries, queuing, and delivery guarantees are the
/// sink's own business; callers only see success or failure.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn alert(&self, event: MatchEvent) -> AlertResult<()>;
}

/// Emits one structured log event per match.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn alert(&self, event: MatchEvent) -> AlertResult<()> {
        let frame = event.matched_frame();
        tracing::info!(
            filter = event.matched_filter().text(),
            frame_number = frame.frame_number(),
            timestamp_ms = frame.timestamp_millis(),
            confidence = event.confidence(),
            "match detected"
        );
        Ok(())
    }
}

/// Hands events to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<MatchEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MatchEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn from_sender(sender: mpsc::Sender<MatchEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AlertSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn alert(&self, event: MatchEvent) -> AlertResult<()> {
        self.sender.send(event).await.map_err(|_| AlertError::Closed)
    }
}

/// Delivers every event to each inner sink in order. All sinks are tried
/// even when an earlier one fails.
pub struct FanoutSink {
    sinks: Vec<DynAlertSink>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<DynAlertSink>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AlertSink for FanoutSink {
    fn name(&self) -> &'static str {
        "fanout"
    }

    async fn alert(&self, event: MatchEvent) -> AlertResult<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(err) = sink.alert(event.clone()).await {
                tracing::warn!(sink = sink.name(), error = %err, "alert sink failed");
                failures.push(format!("{}: {err}", sink.name()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AlertError::Partial {
                failed: failures.len(),
                total: self.sinks.len(),
                message: failures.join("; "),
            })
        }
    }
}
