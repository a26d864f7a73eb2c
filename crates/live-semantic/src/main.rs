use std::process::ExitCode;

use live_semantic::backend::{self, ExecutionPlan};
use live_semantic::cli::parse_cli;
use live_semantic::progress::RunProgress;
use live_semantic::settings::resolve_settings;
use live_semantic::{RunReport, RunSummary, SetupError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let (cli, sources) = parse_cli();
    init_tracing(cli.verbose);

    if cli.list_sources {
        backend::display_available_sources();
        return ExitCode::SUCCESS;
    }

    let settings = match resolve_settings(&cli, &sources) {
        Ok(settings) => settings,
        Err(err) => return report_setup_failure(SetupError::from(err), cli.json),
    };
    if let Some(path) = settings.config_path.as_ref() {
        tracing::info!(path = %path.display(), "using config file");
    }
    let plan = ExecutionPlan::from(settings);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping analysis");
            signal_cancel.cancel();
        }
    });

    let progress = RunProgress::for_terminal(cli.json);
    let callback = progress.as_ref().map(RunProgress::callback);

    match backend::run(plan, cancel, callback).await {
        Ok(report) => {
            if let Some(progress) = progress.as_ref() {
                progress.finish(&report);
            }
            finish(&report, cli.json)
        }
        Err(err) => {
            if let Some(progress) = progress.as_ref() {
                progress.abandon();
            }
            report_setup_failure(err, cli.json)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn finish(report: &RunReport, json: bool) -> ExitCode {
    if json {
        print_summary(&report.summary());
    }
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report_setup_failure(err: SetupError, json: bool) -> ExitCode {
    tracing::error!(error = %err, "failed to start analysis");
    if json {
        print_summary(&RunSummary::setup_failure(&err));
    }
    ExitCode::from(2)
}

fn print_summary(summary: &RunSummary) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(error = %err, "failed to serialize run summary"),
    }
}
