use std::env;
use std::fmt;
use std::fs;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use live_semantic_alert::{SinkConfig, SinkKind};
use live_semantic_embed::{EmbedderConfig, ProviderKind};
use live_semantic_source::{Backend, Configuration, SourceError};
use live_semantic_types::{AnalysisRequest, DEFAULT_SIMILARITY_THRESHOLD};
use serde::Deserialize;

use crate::cli::{CliArgs, CliSources};
use crate::pipeline::PipelineConfig;

const PROJECT_CONFIG_FILE: &str = "live-semantic.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    filter: Option<String>,
    threshold: Option<f32>,
    source: Option<SourceFileConfig>,
    embedder: Option<EmbedderFileConfig>,
    alerts: Option<Vec<AlertFileConfig>>,
    pipeline: Option<PipelineFileConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
struct SourceFileConfig {
    backend: Option<String>,
    input: Option<String>,
    channel_capacity: Option<usize>,
    frame_count: Option<usize>,
    frame_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
struct EmbedderFileConfig {
    kind: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    dimensions: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
struct AlertFileConfig {
    kind: Option<String>,
    target: Option<String>,
    include_image: Option<bool>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
struct PipelineFileConfig {
    max_consecutive_embed_failures: Option<u32>,
}

/// Settings after merging command line, config file, environment, and
/// defaults.
#[derive(Debug)]
pub struct EffectiveSettings {
    pub request: AnalysisRequest,
    pub source: Configuration,
    pub embedder: EmbedderConfig,
    pub alerts: Vec<SinkConfig>,
    pub pipeline: PipelineConfig,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    Missing {
        field: &'static str,
    },
    NotFound {
        path: PathBuf,
    },
    Environment {
        source: SourceError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::Missing { field } => {
                write!(
                    f,
                    "'{}' must be set on the command line or in the config file",
                    field
                )
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
            ConfigError::Environment { source } => {
                write!(f, "invalid environment configuration: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Environment { source } => Some(source),
            ConfigError::InvalidValue { .. }
            | ConfigError::Missing { .. }
            | ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    let base_source =
        Configuration::from_env().map_err(|source| ConfigError::Environment { source })?;
    merge(cli, sources, file, config_path, base_source)
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = expand_pathbuf(path.to_path_buf());
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        return read_config(path);
    }

    let candidates = [project_config_path(), default_config_path()];
    for path in candidates.into_iter().flatten() {
        if path.exists() {
            return read_config(path);
        }
    }
    Ok((FileConfig::default(), None))
}

fn read_config(path: PathBuf) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok((config, Some(path)))
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
    base_source: Configuration,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

    let FileConfig {
        filter: file_filter,
        threshold: file_threshold,
        source: file_source,
        embedder: file_embedder,
        alerts: file_alerts,
        pipeline: file_pipeline,
    } = file;
    let file_source = file_source.unwrap_or_default();
    let file_embedder = file_embedder.unwrap_or_default();
    let file_pipeline = file_pipeline.unwrap_or_default();

    // Empty filter text is a valid query and is kept as given.
    let filter = cli
        .filter
        .clone()
        .or(file_filter)
        .ok_or(ConfigError::Missing { field: "filter" })?;

    let mut threshold = cli.threshold;
    if !sources.threshold_from_cli {
        threshold = file_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
    }
    if threshold.is_nan() {
        return Err(ConfigError::InvalidValue {
            path: config_path,
            field: "threshold",
            value: threshold.to_string(),
        });
    }

    let source = merge_source(
        cli,
        file_source,
        base_source,
        config_path.as_ref(),
        config_dir.as_deref(),
    )?;
    let embedder = merge_embedder(cli, file_embedder, config_path.as_ref())?;
    let alerts = merge_alerts(
        cli,
        sources,
        file_alerts,
        config_path.as_ref(),
        config_dir.as_deref(),
    )?;

    let max_failures = cli
        .max_consecutive_failures
        .or(file_pipeline.max_consecutive_embed_failures);
    let max_consecutive_embed_failures = match max_failures {
        None => None,
        Some(value) => Some(NonZeroU32::new(value).ok_or_else(|| ConfigError::InvalidValue {
            path: config_path.clone(),
            field: "pipeline.max_consecutive_embed_failures",
            value: value.to_string(),
        })?),
    };

    Ok(EffectiveSettings {
        request: AnalysisRequest::new(filter, threshold),
        source,
        embedder,
        alerts,
        pipeline: PipelineConfig {
            max_consecutive_embed_failures,
        },
        config_path,
    })
}

fn merge_source(
    cli: &CliArgs,
    file: SourceFileConfig,
    mut config: Configuration,
    config_path: Option<&PathBuf>,
    config_dir: Option<&Path>,
) -> Result<Configuration, ConfigError> {
    if let Some(value) = normalize_string(cli.source.clone()) {
        config.backend = parse_backend(&value, None)?;
    } else if let Some(value) = normalize_string(file.backend) {
        config.backend = parse_backend(&value, config_path)?;
    }

    if let Some(input) = cli.input.clone() {
        config.input = Some(expand_pathbuf(input));
    } else if let Some(path) = normalize_string(file.input)
        .and_then(|value| resolve_path_from_config(value, config_dir))
    {
        config.input = Some(path);
    }

    let cli_capacity = cli
        .channel_capacity
        .map(|value| usize::try_from(value).unwrap_or(usize::MAX));
    if let Some(value) = cli_capacity.or(file.channel_capacity) {
        let Some(capacity) = NonZeroUsize::new(value) else {
            return Err(ConfigError::InvalidValue {
                path: config_path.cloned(),
                field: "source.channel_capacity",
                value: value.to_string(),
            });
        };
        config.channel_capacity = Some(capacity);
    }

    let cli_count = cli
        .frame_count
        .map(|value| usize::try_from(value).unwrap_or(usize::MAX));
    if let Some(count) = cli_count.or(file.frame_count) {
        config.frame_count = Some(count);
    }
    if let Some(ms) = cli.frame_interval_ms.or(file.frame_interval_ms) {
        config.frame_interval = Some(Duration::from_millis(ms));
    }
    Ok(config)
}

fn merge_embedder(
    cli: &CliArgs,
    file: EmbedderFileConfig,
    config_path: Option<&PathBuf>,
) -> Result<EmbedderConfig, ConfigError> {
    let mut config = EmbedderConfig::default();

    if let Some(value) = normalize_string(cli.embedder.clone()) {
        config.kind = parse_provider(&value, None)?;
    } else if let Some(value) = normalize_string(file.kind) {
        config.kind = parse_provider(&value, config_path)?;
    }

    config.endpoint =
        normalize_string(cli.embed_endpoint.clone()).or_else(|| normalize_string(file.endpoint));
    config.model =
        normalize_string(cli.embed_model.clone()).or_else(|| normalize_string(file.model));

    if let Some(value) = file.dimensions {
        let Some(dimensions) = NonZeroUsize::new(value) else {
            return Err(ConfigError::InvalidValue {
                path: config_path.cloned(),
                field: "embedder.dimensions",
                value: value.to_string(),
            });
        };
        config.dimensions = Some(dimensions);
    }
    config.timeout = file.timeout_secs.map(Duration::from_secs);
    Ok(config)
}

fn merge_alerts(
    cli: &CliArgs,
    sources: &CliSources,
    file: Option<Vec<AlertFileConfig>>,
    config_path: Option<&PathBuf>,
    config_dir: Option<&Path>,
) -> Result<Vec<SinkConfig>, ConfigError> {
    let mut alerts = if sources.alerts_from_cli {
        cli.alerts
            .iter()
            .map(|value| alert_from_cli(value))
            .collect::<Result<Vec<_>, ConfigError>>()?
    } else {
        file.unwrap_or_default()
            .into_iter()
            .map(|entry| alert_from_file(entry, config_path, config_dir))
            .collect::<Result<Vec<_>, ConfigError>>()?
    };

    if alerts.is_empty() {
        alerts.push(SinkConfig::log());
    }
    if cli.alert_image {
        for alert in &mut alerts {
            alert.include_image = true;
        }
    }
    Ok(alerts)
}

fn alert_from_cli(value: &str) -> Result<SinkConfig, ConfigError> {
    let mut config = SinkConfig::from_str(value).map_err(|_| ConfigError::InvalidValue {
        path: None,
        field: "alert",
        value: value.to_string(),
    })?;
    if matches!(config.kind, SinkKind::JsonLines | SinkKind::Dump) {
        config.target = config.target.map(|target| {
            expand_pathbuf(PathBuf::from(target))
                .to_string_lossy()
                .into_owned()
        });
    }
    Ok(config)
}

fn alert_from_file(
    entry: AlertFileConfig,
    config_path: Option<&PathBuf>,
    config_dir: Option<&Path>,
) -> Result<SinkConfig, ConfigError> {
    let kind_value = normalize_string(entry.kind).ok_or(ConfigError::Missing {
        field: "alerts.kind",
    })?;
    let kind = SinkKind::from_str(&kind_value).map_err(|_| ConfigError::InvalidValue {
        path: config_path.cloned(),
        field: "alerts.kind",
        value: kind_value.clone(),
    })?;
    let target = normalize_string(entry.target).map(|value| match kind {
        SinkKind::JsonLines | SinkKind::Dump => resolve_path_from_config(value.clone(), config_dir)
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or(value),
        _ => value,
    });

    let mut config = SinkConfig::new(kind, target);
    config.include_image = entry.include_image.unwrap_or(false);
    config.timeout = entry.timeout_secs.map(Duration::from_secs);
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "live-semantic", "live-semantic")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir()
        .ok()
        .map(|dir| dir.join(PROJECT_CONFIG_FILE))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

fn parse_backend(value: &str, path: Option<&PathBuf>) -> Result<Backend, ConfigError> {
    Backend::from_str(value).map_err(|_| ConfigError::InvalidValue {
        path: path.cloned(),
        field: "source.backend",
        value: value.to_string(),
    })
}

fn parse_provider(value: &str, path: Option<&PathBuf>) -> Result<ProviderKind, ConfigError> {
    ProviderKind::from_str(value).map_err(|_| ConfigError::InvalidValue {
        path: path.cloned(),
        field: "embedder.kind",
        value: value.to_string(),
    })
}
