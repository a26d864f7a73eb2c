use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use live_semantic::{MatchingPipeline, Outcome, PipelineConfig, PipelineError, RunStats};
use live_semantic_alert::{AlertError, AlertResult, AlertSink, ChannelSink, DynAlertSink};
use live_semantic_embed::{EmbedError, EmbedResult, EmbedderConfig, EmbeddingProvider};
use live_semantic_source::{Backend, Configuration, SourceError, SourceResult, VideoSource};
use live_semantic_types::{AnalysisRequest, Embedding, Filter, Frame, MatchEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const FILTER: [f32; 2] = [1.0, 0.0];
const MATCHING: [f32; 2] = [1.0, 0.0];
const UNRELATED: [f32; 2] = [0.0, 1.0];

fn frame(number: u64) -> Frame {
    Frame::new(number, SystemTime::now(), vec![number as u8; 4])
}

#[derive(Default)]
struct SourceProbe {
    reads: AtomicUsize,
    closed: AtomicBool,
}

struct ScriptedSource {
    script: VecDeque<SourceResult<Frame>>,
    probe: Arc<SourceProbe>,
    fail_close: bool,
}

impl ScriptedSource {
    fn new(script: Vec<SourceResult<Frame>>) -> (Box<Self>, Arc<SourceProbe>) {
        let probe = Arc::new(SourceProbe::default());
        let source = Box::new(Self {
            script: script.into(),
            probe: Arc::clone(&probe),
            fail_close: false,
        });
        (source, probe)
    }

    fn frames(numbers: impl IntoIterator<Item = u64>) -> (Box<Self>, Arc<SourceProbe>) {
        Self::new(numbers.into_iter().map(|n| Ok(frame(n))).collect())
    }

    fn failing_close(mut self: Box<Self>) -> Box<Self> {
        self.fail_close = true;
        self
    }
}

#[async_trait]
impl VideoSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn next_frame(&mut self) -> SourceResult<Option<Frame>> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().transpose()
    }

    async fn close(&mut self) -> SourceResult<()> {
        self.probe.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(SourceError::backend_failure("scripted", "handle already released"));
        }
        Ok(())
    }
}

/// Never yields a frame, like a live feed that has gone quiet.
struct StalledSource {
    probe: Arc<SourceProbe>,
}

#[async_trait]
impl VideoSource for StalledSource {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn next_frame(&mut self) -> SourceResult<Option<Frame>> {
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn close(&mut self) -> SourceResult<()> {
        self.probe.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

enum TextReply {
    Resolve(Embedding),
    Fail,
    LeaveUnresolved,
}

/// Returns a fixed embedding per frame number; frames without an entry fail.
struct ScriptedEmbedder {
    text: TextReply,
    images: HashMap<u64, Embedding>,
    text_calls: AtomicUsize,
}

impl ScriptedEmbedder {
    fn new(images: impl IntoIterator<Item = (u64, [f32; 2])>) -> Arc<Self> {
        Arc::new(Self {
            text: TextReply::Resolve(FILTER.to_vec()),
            images: images
                .into_iter()
                .map(|(number, embedding)| (number, embedding.to_vec()))
                .collect(),
            text_calls: AtomicUsize::new(0),
        })
    }

    fn with_text(text: TextReply) -> Arc<Self> {
        Arc::new(Self {
            text,
            images: HashMap::new(),
            text_calls: AtomicUsize::new(0),
        })
    }

    fn failing_text() -> Arc<Self> {
        Self::with_text(TextReply::Fail)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn encode_text(&self, filter: &mut Filter) -> EmbedResult<()> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            TextReply::Resolve(embedding) => filter.resolve(embedding.clone())?,
            TextReply::Fail => return Err(EmbedError::backend("text model offline")),
            TextReply::LeaveUnresolved => {}
        }
        Ok(())
    }

    async fn encode_image(&self, frame: &Frame) -> EmbedResult<Embedding> {
        self.images
            .get(&frame.frame_number())
            .cloned()
            .ok_or_else(|| {
                EmbedError::backend(format!("no embedding for frame {}", frame.frame_number()))
            })
    }
}

#[derive(Default)]
struct FailingSink {
    attempts: AtomicUsize,
}

#[async_trait]
impl AlertSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn alert(&self, _event: MatchEvent) -> AlertResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AlertError::delivery("pager unreachable"))
    }
}

/// Cancels the run as soon as the first alert arrives.
struct CancellingSink {
    cancel: CancellationToken,
    alerts: AtomicUsize,
}

#[async_trait]
impl AlertSink for CancellingSink {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn alert(&self, _event: MatchEvent) -> AlertResult<()> {
        self.alerts.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
        Ok(())
    }
}

fn channel_sink() -> (DynAlertSink, mpsc::Receiver<MatchEvent>) {
    let (sink, receiver) = ChannelSink::new(16);
    (Arc::new(sink), receiver)
}

fn drain(receiver: &mut mpsc::Receiver<MatchEvent>) -> Vec<MatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn request() -> AnalysisRequest {
    AnalysisRequest::new("a person walking", 0.5)
}

#[tokio::test]
async fn only_the_matching_frame_raises_an_alert() {
    let (source, probe) = ScriptedSource::frames([1, 2, 3]);
    let embedder = ScriptedEmbedder::new([(1, UNRELATED), (2, MATCHING), (3, UNRELATED)]);
    let (sink, mut receiver) = channel_sink();

    let report = MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
        .run(request(), CancellationToken::new())
        .await;

    assert!(matches!(report.outcome, Outcome::Completed));
    let events = drain(&mut receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].matched_frame().frame_number(), 2);
    assert_eq!(events[0].matched_filter().text(), "a person walking");
    assert!((events[0].confidence() - 1.0).abs() < 1e-6);
    assert_eq!(report.stats.frames_read, 3);
    assert_eq!(report.stats.frames_scored, 3);
    assert_eq!(report.stats.matches, 1);
    assert!(probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn embedding_failure_skips_only_that_frame() {
    let (source, _probe) = ScriptedSource::frames([1, 2, 3]);
    let embedder = ScriptedEmbedder::new([(1, UNRELATED), (3, UNRELATED)]);
    let (sink, mut receiver) = channel_sink();

    let report = MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
        .run(request(), CancellationToken::new())
        .await;

    assert!(matches!(report.outcome, Outcome::Completed));
    assert!(drain(&mut receiver).is_empty());
    assert_eq!(report.stats.frames_read, 3);
    assert_eq!(report.stats.frames_scored, 2);
    assert_eq!(report.stats.frames_skipped, 1);
}

#[tokio::test]
async fn cancellation_before_start_reads_nothing() {
    let (source, probe) = ScriptedSource::frames([1, 2, 3]);
    let embedder = ScriptedEmbedder::new([(1, MATCHING), (2, MATCHING), (3, MATCHING)]);
    let (sink, mut receiver) = channel_sink();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = MatchingPipeline::new(
        source,
        Arc::clone(&embedder) as _,
        sink,
        PipelineConfig::default(),
    )
    .run(request(), cancel)
    .await;

    assert!(matches!(report.outcome, Outcome::Cancelled));
    assert!(report.is_success());
    assert_eq!(probe.reads.load(Ordering::SeqCst), 0);
    assert_eq!(embedder.text_calls.load(Ordering::SeqCst), 0);
    assert!(drain(&mut receiver).is_empty());
}

#[tokio::test]
async fn cancellation_mid_run_stops_before_the_next_read() {
    let (source, probe) = ScriptedSource::frames([1, 2, 3]);
    let embedder = ScriptedEmbedder::new([(1, MATCHING), (2, MATCHING), (3, MATCHING)]);
    let cancel = CancellationToken::new();
    let sink = Arc::new(CancellingSink {
        cancel: cancel.clone(),
        alerts: AtomicUsize::new(0),
    });

    let report = MatchingPipeline::new(
        source,
        embedder,
        Arc::clone(&sink) as _,
        PipelineConfig::default(),
    )
    .run(request(), cancel)
    .await;

    assert!(matches!(report.outcome, Outcome::Cancelled));
    assert_eq!(probe.reads.load(Ordering::SeqCst), 1);
    assert_eq!(sink.alerts.load(Ordering::SeqCst), 1);
    assert!(probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn read_error_fails_the_run_immediately() {
    let (source, probe) = ScriptedSource::new(vec![
        Ok(frame(1)),
        Err(SourceError::backend_failure("scripted", "disk unplugged")),
        Ok(frame(3)),
    ]);
    let embedder = ScriptedEmbedder::new([(1, UNRELATED), (3, MATCHING)]);
    let (sink, mut receiver) = channel_sink();

    let report = MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
        .run(request(), CancellationToken::new())
        .await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed(PipelineError::Source(SourceError::BackendFailure { .. }))
    ));
    assert!(!report.is_success());
    assert_eq!(probe.reads.load(Ordering::SeqCst), 2);
    assert_eq!(report.stats.frames_read, 1);
    assert!(drain(&mut receiver).is_empty());
    assert!(probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn alert_failures_do_not_stop_the_run() {
    let (source, _probe) = ScriptedSource::frames([1, 2, 3]);
    let embedder = ScriptedEmbedder::new([(1, UNRELATED), (2, MATCHING), (3, MATCHING)]);
    let sink = Arc::new(FailingSink::default());

    let report = MatchingPipeline::new(
        source,
        embedder,
        Arc::clone(&sink) as _,
        PipelineConfig::default(),
    )
    .run(request(), CancellationToken::new())
    .await;

    assert!(matches!(report.outcome, Outcome::Completed));
    assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(report.stats.matches, 2);
    assert_eq!(report.stats.alerts_failed, 2);
    assert_eq!(report.stats.frames_scored, 3);
}

#[tokio::test]
async fn filter_embedding_failure_fails_before_reading() {
    let (source, probe) = ScriptedSource::frames([1, 2]);
    let (sink, _receiver) = channel_sink();

    let report = MatchingPipeline::new(
        source,
        ScriptedEmbedder::failing_text(),
        sink,
        PipelineConfig::default(),
    )
    .run(request(), CancellationToken::new())
    .await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed(PipelineError::FilterEmbedding(_))
    ));
    assert_eq!(probe.reads.load(Ordering::SeqCst), 0);
    assert_eq!(report.stats.frames_read, 0);
}

#[tokio::test]
async fn empty_filter_embedding_fails_before_reading() {
    let (source, probe) = ScriptedSource::frames([1, 2]);
    let (sink, _receiver) = channel_sink();

    let report = MatchingPipeline::new(
        source,
        ScriptedEmbedder::with_text(TextReply::Resolve(Vec::new())),
        sink,
        PipelineConfig::default(),
    )
    .run(request(), CancellationToken::new())
    .await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed(PipelineError::FilterEmbedding(EmbedError::EmptyEmbedding))
    ));
    assert_eq!(probe.reads.load(Ordering::SeqCst), 0);
    assert_eq!(report.stats.frames_read, 0);
    assert!(probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unresolved_filter_fails_before_reading() {
    let (source, probe) = ScriptedSource::frames([1, 2]);
    let embedder = ScriptedEmbedder::with_text(TextReply::LeaveUnresolved);
    let (sink, _receiver) = channel_sink();

    let report = MatchingPipeline::new(
        source,
        Arc::clone(&embedder) as _,
        sink,
        PipelineConfig::default(),
    )
    .run(request(), CancellationToken::new())
    .await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed(PipelineError::FilterEmbedding(EmbedError::Backend { .. }))
    ));
    assert_eq!(embedder.text_calls.load(Ordering::SeqCst), 1);
    assert_eq!(probe.reads.load(Ordering::SeqCst), 0);
    assert_eq!(report.stats.frames_read, 0);
}

#[tokio::test]
async fn cancellation_ends_a_stalled_read() {
    let probe = Arc::new(SourceProbe::default());
    let source = Box::new(StalledSource {
        probe: Arc::clone(&probe),
    });
    let embedder = ScriptedEmbedder::new([]);
    let (sink, _receiver) = channel_sink();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
            .run(request(), cancel),
    )
    .await
    .expect("run should stop once cancelled");

    assert!(matches!(report.outcome, Outcome::Cancelled));
    assert!(report.is_success());
    assert_eq!(probe.reads.load(Ordering::SeqCst), 1);
    assert_eq!(report.stats.frames_read, 0);
    assert!(probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn close_failure_keeps_the_outcome() {
    let (source, probe) = ScriptedSource::frames([1, 2]);
    let embedder = ScriptedEmbedder::new([(1, MATCHING), (2, MATCHING)]);
    let (sink, mut receiver) = channel_sink();

    let report = MatchingPipeline::new(
        source.failing_close(),
        embedder,
        sink,
        PipelineConfig::default(),
    )
    .run(request(), CancellationToken::new())
    .await;

    assert!(matches!(report.outcome, Outcome::Completed));
    assert!(report.is_success());
    assert!(probe.closed.load(Ordering::SeqCst));
    assert_eq!(report.stats.frames_read, 2);
    assert_eq!(report.stats.frames_scored, 2);
    assert_eq!(report.stats.matches, 2);
    assert_eq!(drain(&mut receiver).len(), 2);
}

#[tokio::test]
async fn consecutive_embedding_failures_escalate_when_limited() {
    let (source, probe) = ScriptedSource::frames([1, 2, 3, 4, 5]);
    let embedder = ScriptedEmbedder::new([]);
    let (sink, _receiver) = channel_sink();
    let config = PipelineConfig {
        max_consecutive_embed_failures: NonZeroU32::new(2),
    };

    let report = MatchingPipeline::new(source, embedder, sink, config)
        .run(request(), CancellationToken::new())
        .await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed(PipelineError::TooManyFailures { count: 2 })
    ));
    assert_eq!(probe.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unlimited_failures_run_to_completion() {
    let (source, _probe) = ScriptedSource::frames([1, 2, 3, 4, 5]);
    let embedder = ScriptedEmbedder::new([]);
    let (sink, _receiver) = channel_sink();

    let report = MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
        .run(request(), CancellationToken::new())
        .await;

    assert!(matches!(report.outcome, Outcome::Completed));
    assert_eq!(report.stats.frames_skipped, 5);
}

#[tokio::test]
async fn threshold_is_a_strict_bound() {
    let (source, _probe) = ScriptedSource::frames([1]);
    let embedder = ScriptedEmbedder::new([(1, MATCHING)]);
    let (sink, mut receiver) = channel_sink();

    let report = MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
        .run(AnalysisRequest::new("exact", 1.0), CancellationToken::new())
        .await;

    assert!(matches!(report.outcome, Outcome::Completed));
    assert!(drain(&mut receiver).is_empty());
    assert_eq!(report.stats.best_score, Some(1.0));
}

#[tokio::test]
async fn progress_is_reported_per_frame() {
    let (source, _probe) = ScriptedSource::frames([1, 2, 3]);
    let embedder = ScriptedEmbedder::new([(1, UNRELATED), (3, MATCHING)]);
    let (sink, _receiver) = channel_sink();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
        .with_progress(Arc::new(move |stats: &RunStats| {
            if let Ok(mut seen) = recorder.lock() {
                seen.push(stats.frames_read);
            }
        }))
        .run(request(), CancellationToken::new())
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn bundled_collaborators_run_end_to_end() {
    let source = Configuration {
        backend: Backend::Mock,
        frame_count: Some(5),
        frame_interval: Some(Duration::ZERO),
        ..Configuration::default()
    }
    .create_source()
    .unwrap();
    let embedder = EmbedderConfig::default().create_provider().unwrap();
    let (sink, mut receiver) = channel_sink();

    let report = MatchingPipeline::new(source, embedder, sink, PipelineConfig::default())
        .run(
            AnalysisRequest::new("a person walking", -0.5),
            CancellationToken::new(),
        )
        .await;

    assert!(matches!(report.outcome, Outcome::Completed));
    let numbers: Vec<u64> = drain(&mut receiver)
        .iter()
        .map(|event| event.matched_frame().frame_number())
        .collect();
    assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
}
