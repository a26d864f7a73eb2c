use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::pipeline::{ProgressCallback, RunReport, RunStats};

pub fn run_spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan.bold} [{elapsed_precise}] frames {pos} • {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner())
    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}

/// Spinner on stderr showing frames read, matches, and the best score.
#[derive(Clone)]
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    /// Returns `None` when output is machine-readable or stderr is not a
    /// terminal.
    pub fn for_terminal(json_output: bool) -> Option<Self> {
        if json_output || !std::io::stderr().is_terminal() {
            return None;
        }
        Some(Self::with_target(ProgressDrawTarget::stderr()))
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(None, target);
        bar.set_style(run_spinner_style());
        bar.set_message(format_stats(&RunStats::default()));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Arc::new(move |stats: &RunStats| {
            bar.set_position(stats.frames_read);
            bar.set_message(format_stats(stats));
        })
    }

    pub fn finish(&self, report: &RunReport) {
        let message = format!("{} • {}", report.outcome, format_stats(&report.stats));
        if report.is_success() {
            self.bar.finish_with_message(message);
        } else {
            self.bar.abandon_with_message(message);
        }
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

fn format_stats(stats: &RunStats) -> String {
    let best = stats
        .best_score
        .map(|score| format!("{score:.3}"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "matches {} • skipped {} • best {}",
        stats.matches, stats.frames_skipped, best
    )
}
