use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use live_semantic_alert::DynAlertSink;
use live_semantic_embed::{DynEmbeddingProvider, EmbedError};
use live_semantic_source::DynVideoSource;
use live_semantic_types::{AnalysisRequest, Filter, Frame, MatchEvent};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::similarity::cosine_similarity;

pub type ProgressCallback = Arc<dyn Fn(&RunStats) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Number of back-to-back frame embedding failures that ends the run.
    /// `None` keeps skipping frames forever.
    pub max_consecutive_embed_failures: Option<NonZeroU32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub frames_read: u64,
    pub frames_scored: u64,
    pub frames_skipped: u64,
    pub matches: u64,
    pub alerts_failed: u64,
    pub consecutive_embed_failures: u32,
    pub best_score: Option<f32>,
}

impl RunStats {
    fn record_score(&mut self, score: f32) {
        self.frames_scored += 1;
        self.consecutive_embed_failures = 0;
        self.best_score = Some(match self.best_score {
            Some(best) if best >= score => best,
            _ => score,
        });
    }

    fn record_skip(&mut self) {
        self.frames_skipped += 1;
        self.consecutive_embed_failures = self.consecutive_embed_failures.saturating_add(1);
    }
}

#[derive(Debug)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(PipelineError),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Failed(err) => write!(f, "failed: {err}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: Outcome,
    pub stats: RunStats,
    pub elapsed: Duration,
}

impl RunReport {
    /// Completed and cancelled runs both count as success.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            success: self.is_success(),
            outcome: self.outcome.as_str().to_string(),
            error: self.outcome.error().map(ToString::to_string),
            stats: Some(self.stats.clone()),
            elapsed_ms: self.elapsed.as_millis().min(u128::from(u64::MAX)) as u64,
        }
    }
}

/// JSON shape printed by the binary with `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub success: bool,
    pub outcome: String,
    pub error: Option<String>,
    pub stats: Option<RunStats>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn setup_failure(error: &dyn std::error::Error) -> Self {
        Self {
            success: false,
            outcome: "failed".to_string(),
            error: Some(error.to_string()),
            stats: None,
            elapsed_ms: 0,
        }
    }
}

enum RunState {
    Running,
    Finished(Outcome),
}

/// Drives one filter against one video source until the stream ends, the
/// run is cancelled, or a fatal error occurs.
pub struct MatchingPipeline {
    source: DynVideoSource,
    embedder: DynEmbeddingProvider,
    sink: DynAlertSink,
    config: PipelineConfig,
    progress: Option<ProgressCallback>,
}

impl MatchingPipeline {
    pub fn new(
        source: DynVideoSource,
        embedder: DynEmbeddingProvider,
        sink: DynAlertSink,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            embedder,
            sink,
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run(mut self, request: AnalysisRequest, cancel: CancellationToken) -> RunReport {
        let started = Instant::now();
        let mut stats = RunStats::default();
        let outcome = self.drive(request, &cancel, &mut stats).await;

        if let Err(err) = self.source.close().await {
            tracing::warn!(source = self.source.name(), error = %err, "failed to close video source");
        }

        let elapsed = started.elapsed();
        match &outcome {
            Outcome::Failed(err) => tracing::error!(
                frames_read = stats.frames_read,
                matches = stats.matches,
                error = %err,
                "analysis failed"
            ),
            other => tracing::info!(
                outcome = other.as_str(),
                frames_read = stats.frames_read,
                matches = stats.matches,
                elapsed_ms = elapsed.as_millis() as u64,
                "analysis finished"
            ),
        }

        RunReport {
            outcome,
            stats,
            elapsed,
        }
    }

    async fn drive(
        &mut self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
        stats: &mut RunStats,
    ) -> Outcome {
        if cancel.is_cancelled() {
            tracing::info!("cancellation requested before start");
            return Outcome::Cancelled;
        }

        let filter = match self.resolve_filter(request.filter).await {
            Ok(filter) => Arc::new(filter),
            Err(err) => return Outcome::Failed(PipelineError::FilterEmbedding(err)),
        };
        tracing::info!(
            filter = filter.text(),
            threshold = request.similarity_threshold,
            source = self.source.name(),
            embedder = self.embedder.name(),
            sink = self.sink.name(),
            "analysis started"
        );

        let mut state = RunState::Running;
        loop {
            state = match state {
                RunState::Running => {
                    self.step(&filter, request.similarity_threshold, cancel, stats)
                        .await
                }
                RunState::Finished(outcome) => return outcome,
            };
        }
    }

    async fn resolve_filter(&self, text: String) -> Result<Filter, EmbedError> {
        let mut filter = Filter::new(text);
        self.embedder.encode_text(&mut filter).await?;
        match filter.embedding() {
            Some(embedding) if !embedding.is_empty() => Ok(filter),
            Some(_) => Err(EmbedError::EmptyEmbedding),
            None => Err(EmbedError::backend(format!(
                "provider '{}' did not resolve the filter embedding",
                self.embedder.name()
            ))),
        }
    }

    async fn step(
        &mut self,
        filter: &Arc<Filter>,
        threshold: f32,
        cancel: &CancellationToken,
        stats: &mut RunStats,
    ) -> RunState {
        if cancel.is_cancelled() {
            return RunState::Finished(Outcome::Cancelled);
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RunState::Finished(Outcome::Cancelled),
            next = self.source.next_frame() => next,
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => return RunState::Finished(Outcome::Completed),
            Err(err) => return RunState::Finished(Outcome::Failed(PipelineError::Source(err))),
        };
        stats.frames_read += 1;

        let state = self.process_frame(frame, filter, threshold, stats).await;
        if let Some(progress) = &self.progress {
            progress(stats);
        }
        state
    }

    async fn process_frame(
        &self,
        frame: Frame,
        filter: &Arc<Filter>,
        threshold: f32,
        stats: &mut RunStats,
    ) -> RunState {
        let frame_number = frame.frame_number();
        let embedding = match self.embedder.encode_image(&frame).await {
            Ok(embedding) => embedding,
            Err(err) => {
                stats.record_skip();
                tracing::warn!(frame_number, error = %err, "frame embedding failed; skipping frame");
                return self.check_escalation(stats);
            }
        };

        let score = cosine_similarity(filter.embedding().unwrap_or_default(), &embedding);
        stats.record_score(score);
        tracing::debug!(frame_number, score, "frame scored");

        let Ok(event) = MatchEvent::above_threshold(frame, Arc::clone(filter), score, threshold)
        else {
            return RunState::Running;
        };
        stats.matches += 1;
        if let Err(err) = self.sink.alert(event).await {
            stats.alerts_failed += 1;
            tracing::warn!(
                frame_number,
                confidence = score,
                sink = self.sink.name(),
                error = %err,
                "alert delivery failed"
            );
        }
        RunState::Running
    }

    fn check_escalation(&self, stats: &RunStats) -> RunState {
        match self.config.max_consecutive_embed_failures {
            Some(limit) if stats.consecutive_embed_failures >= limit.get() => {
                RunState::Finished(Outcome::Failed(PipelineError::TooManyFailures {
                    count: stats.consecutive_embed_failures,
                }))
            }
            _ => RunState::Running,
        }
    }
}
