mod config;
mod dump;
mod error;
mod jsonl;
mod payload;
mod sink;
#[cfg(feature = "sink-webhook")]
mod webhook;

pub use config::{SinkConfig, SinkKind, create_sinks};
pub use dump::FrameDumpSink;
pub use error::{AlertError, AlertResult};
pub use jsonl::JsonLinesSink;
pub use payload::AlertPayload;
pub use sink::{AlertSink, ChannelSink, DynAlertSink, FanoutSink, LogSink};
#[cfg(feature = "sink-webhook")]
pub use webhook::WebhookSink;
