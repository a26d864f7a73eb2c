use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::dump::FrameDumpSink;
use crate::error::{AlertError, AlertResult};
use crate::jsonl::JsonLinesSink;
use crate::sink::{DynAlertSink, FanoutSink, LogSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Log,
    JsonLines,
    Webhook,
    Dump,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Log => "log",
            SinkKind::JsonLines => "jsonl",
            SinkKind::Webhook => "webhook",
            SinkKind::Dump => "dump",
        }
    }

    fn requires_target(&self) -> bool {
        !matches!(self, SinkKind::Log)
    }
}

impl FromStr for SinkKind {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" | "stderr" => Ok(SinkKind::Log),
            "jsonl" | "json-lines" | "json_lines" => Ok(SinkKind::JsonLines),
            "webhook" | "http" => Ok(SinkKind::Webhook),
            "dump" | "frames" => Ok(SinkKind::Dump),
            other => Err(AlertError::configuration(format!(
                "unknown alert sink '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured alert destination, written on the command line as
/// `kind` or `kind=target`.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub target: Option<String>,
    pub include_image: bool,
    pub timeout: Option<Duration>,
}

impl SinkConfig {
    pub fn new(kind: SinkKind, target: Option<String>) -> Self {
        Self {
            kind,
            target,
            include_image: false,
            timeout: None,
        }
    }

    pub fn log() -> Self {
        Self::new(SinkKind::Log, None)
    }

    pub fn create_sink(&self) -> AlertResult<DynAlertSink> {
        let target = self.target.as_deref();
        if self.kind.requires_target() && target.is_none() {
            return Err(AlertError::configuration(format!(
                "alert sink '{}' requires a target",
                self.kind
            )));
        }
        match (self.kind, target) {
            (SinkKind::Log, _) => Ok(Arc::new(LogSink)),
            (SinkKind::JsonLines, Some(path)) => Ok(Arc::new(JsonLinesSink::new(
                PathBuf::from(path),
                self.include_image,
            ))),
            (SinkKind::Dump, Some(dir)) => Ok(Arc::new(FrameDumpSink::new(PathBuf::from(dir)))),
            (SinkKind::Webhook, Some(url)) => self.build_webhook(url),
            (_, None) => Err(AlertError::configuration("alert sink target missing")),
        }
    }

    #[cfg(feature = "sink-webhook")]
    fn build_webhook(&self, url: &str) -> AlertResult<DynAlertSink> {
        let sink = crate::webhook::WebhookSink::new(url, self.include_image, self.timeout)?;
        Ok(Arc::new(sink))
    }

    #[cfg(not(feature = "sink-webhook"))]
    fn build_webhook(&self, _url: &str) -> AlertResult<DynAlertSink> {
        Err(AlertError::configuration(
            "webhook sink is not compiled into this build",
        ))
    }
}

impl FromStr for SinkConfig {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, target) = match s.split_once('=') {
            Some((kind, target)) => (kind, Some(target.trim())),
            None => (s, None),
        };
        let kind = SinkKind::from_str(kind)?;
        let target = target.filter(|value| !value.is_empty()).map(str::to_string);
        Ok(SinkConfig::new(kind, target))
    }
}

impl fmt::Display for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}={target}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Builds a single sink from a list of configurations, wrapping them in a
/// [`FanoutSink`] when there is more than one. An empty list yields a
/// [`LogSink`].
pub fn create_sinks(configs: &[SinkConfig]) -> AlertResult<DynAlertSink> {
    match configs {
        [] => Ok(Arc::new(LogSink)),
        [single] => single.create_sink(),
        many => {
            let sinks = many
                .iter()
                .map(SinkConfig::create_sink)
                .collect::<AlertResult<Vec<_>>>()?;
            Ok(Arc::new(FanoutSink::new(sinks)))
        }
    }
}
