use std::time::Instant;

use live_semantic_alert::{SinkConfig, create_sinks};
use live_semantic_embed::EmbedderConfig;
use live_semantic_source::{Backend, Configuration, SourceError};
use live_semantic_types::AnalysisRequest;
use tokio_util::sync::CancellationToken;

use crate::error::SetupError;
use crate::pipeline::{MatchingPipeline, PipelineConfig, ProgressCallback, RunReport};
use crate::settings::EffectiveSettings;

/// Everything needed to wire collaborators and start one run.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub source: Configuration,
    pub embedder: EmbedderConfig,
    pub alerts: Vec<SinkConfig>,
    pub pipeline: PipelineConfig,
    pub request: AnalysisRequest,
}

impl From<EffectiveSettings> for ExecutionPlan {
    fn from(settings: EffectiveSettings) -> Self {
        Self {
            source: settings.source,
            embedder: settings.embedder,
            alerts: settings.alerts,
            pipeline: settings.pipeline,
            request: settings.request,
        }
    }
}

pub async fn run(
    plan: ExecutionPlan,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<RunReport, SetupError> {
    let ExecutionPlan {
        source,
        embedder,
        alerts,
        pipeline,
        request,
    } = plan;

    let available = Configuration::available_backends();
    if available.is_empty() {
        return Err(SourceError::configuration(
            "no video source available; rebuild with a source feature such as \"source-mock\"",
        )
        .into());
    }
    if !available.contains(&source.backend) {
        return Err(SourceError::unsupported(source.backend.as_str()).into());
    }

    let provider_started = Instant::now();
    let provider = embedder.create_provider()?;
    provider.warm_up().await?;
    tracing::info!(
        provider = provider.name(),
        elapsed = ?provider_started.elapsed(),
        "initialized embedding provider"
    );

    let sink = create_sinks(&alerts)?;
    tracing::debug!(sink = sink.name(), count = alerts.len(), "initialized alert sinks");

    let source_started = Instant::now();
    let video = source.create_source()?;
    tracing::info!(
        source = source.backend.as_str(),
        elapsed = ?source_started.elapsed(),
        "initialized video source"
    );

    let mut matching = MatchingPipeline::new(video, provider, sink, pipeline);
    if let Some(progress) = progress {
        matching = matching.with_progress(progress);
    }
    Ok(matching.run(request, cancel).await)
}

pub fn display_available_sources() {
    let names: Vec<&'static str> = Configuration::available_backends()
        .iter()
        .map(Backend::as_str)
        .collect();
    if names.is_empty() {
        println!("available sources: (none compiled)");
    } else {
        println!("available sources: {}", names.join(", "));
    }
}
