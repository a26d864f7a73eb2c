use std::ffi::OsString;
use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use live_semantic_types::DEFAULT_SIMILARITY_THRESHOLD;

/// Records which flags with defaults were given explicitly, so the config
/// file only fills in the rest.
#[derive(Debug, Default, Clone)]
pub struct CliSources {
    pub threshold_from_cli: bool,
    pub alerts_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            threshold_from_cli: value_from_cli(matches, "threshold"),
            alerts_from_cli: value_from_cli(matches, "alerts"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    match try_parse_from(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(err) => err.exit(),
    }
}

pub fn try_parse_from<I, T>(args: I) -> Result<(CliArgs, CliSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = CliArgs::command().try_get_matches_from(args)?;
    let args = CliArgs::from_arg_matches(&matches)?;
    let sources = CliSources::from_matches(&matches);
    Ok((args, sources))
}

#[derive(Debug, Parser)]
#[command(
    name = "live-semantic",
    about = "Watch a video stream and alert on frames matching a text description",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Natural-language description to match frames against
    #[arg(short = 'f', long = "filter", value_name = "TEXT")]
    pub filter: Option<String>,

    /// Similarity a frame must exceed to raise an alert
    #[arg(
        short = 't',
        long = "threshold",
        id = "threshold",
        default_value_t = DEFAULT_SIMILARITY_THRESHOLD,
        allow_negative_numbers = true
    )]
    pub threshold: f32,

    /// Video source backend (mock, image-dir)
    #[arg(short = 's', long = "source")]
    pub source: Option<String>,

    /// Input for the video source, such as a directory of images
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Number of frames the mock source generates
    #[arg(long = "frame-count", value_parser = clap::value_parser!(u64).range(1..))]
    pub frame_count: Option<u64>,

    /// Delay between frames in milliseconds
    #[arg(long = "frame-interval-ms", value_name = "MS")]
    pub frame_interval_ms: Option<u64>,

    /// Source frame queue capacity before applying backpressure
    #[arg(long = "channel-capacity", value_parser = clap::value_parser!(u64).range(1..))]
    pub channel_capacity: Option<u64>,

    /// Embedding provider (hashing, http)
    #[arg(short = 'e', long = "embedder")]
    pub embedder: Option<String>,

    /// Base URL of the embedding service used by the http provider
    #[arg(long = "embed-endpoint", value_name = "URL")]
    pub embed_endpoint: Option<String>,

    /// Model name sent to the embedding service
    #[arg(long = "embed-model", value_name = "NAME")]
    pub embed_model: Option<String>,

    /// Alert destination as KIND or KIND=TARGET (repeatable): log,
    /// jsonl=FILE, webhook=URL, dump=DIR
    #[arg(short = 'a', long = "alert", id = "alerts", value_name = "KIND[=TARGET]")]
    pub alerts: Vec<String>,

    /// Attach the base64-encoded frame to jsonl and webhook alerts
    #[arg(long = "alert-image")]
    pub alert_image: bool,

    /// Fail the run after this many frame embedding failures in a row
    #[arg(
        long = "max-consecutive-failures",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_consecutive_failures: Option<u32>,

    /// Override the configuration file path
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long = "json")]
    pub json: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Print the list of available video sources
    #[arg(long = "list-sources")]
    pub list_sources: bool,
}
