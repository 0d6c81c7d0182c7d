//! # Terminal Output
//!
//! Formatting for what `kopier` prints: one line per repository, a run
//! summary and the change list of a local `apply`.
//!
//! Color and symbols follow the `--color=never|always|auto` flag. In auto
//! mode the usual environment conventions apply:
//! - `NO_COLOR` disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` disables colors
//! - `CLICOLOR_FORCE=1` forces colors even when stdout is not a TTY
//! - `TERM=dumb` disables colors

use std::env;

use console::style;

use crate::changes::{Change, ChangeKind};
use crate::fleet::{FleetReport, RepoOutcome, RepoReport};

/// Whether output may use colors and symbols
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the value of `--color` ("always", "never" or "auto").
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `symbol` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, symbol: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        symbol
    } else {
        plain
    }
}

/// One line describing how a repository's update ended.
pub fn report_line(config: &OutputConfig, report: &RepoReport) -> String {
    let color = config.use_color;
    let name = style(report.repository.to_string()).bold().force_styling(color);
    let elapsed = format!("{:.1}s", report.elapsed.as_secs_f64());

    match &report.outcome {
        RepoOutcome::Updated {
            changes,
            pull_request,
        } => format!(
            "{} {} {} ({} {}, {})",
            style(emoji(config, "✔", "[UPDATED]")).green().force_styling(color),
            name,
            pull_request,
            changes,
            plural(*changes, "change"),
            elapsed
        ),
        RepoOutcome::WouldUpdate { changes } => format!(
            "{} {} would be updated ({} {}, {})",
            style(emoji(config, "~", "[DRY-RUN]")).yellow().force_styling(color),
            name,
            changes,
            plural(*changes, "change"),
            elapsed
        ),
        RepoOutcome::Unchanged => format!(
            "{} {} does not need an update ({})",
            style(emoji(config, "=", "[UNCHANGED]")).dim().force_styling(color),
            name,
            elapsed
        ),
        RepoOutcome::Failed { reason } => format!(
            "{} {} {}",
            style(emoji(config, "✘", "[FAILED]")).red().force_styling(color),
            name,
            style(reason).red().force_styling(color)
        ),
    }
}

/// Closing summary of a run.
pub fn summary(config: &OutputConfig, report: &FleetReport) -> String {
    let color = config.use_color;
    let mut parts = vec![format!("{} updated", report.updated())];
    if report.would_update() > 0 {
        parts.push(format!("{} would update", report.would_update()));
    }
    parts.push(format!("{} unchanged", report.unchanged()));
    let failed = format!("{} failed", report.failed());
    parts.push(if report.has_failures() {
        style(failed).red().bold().force_styling(color).to_string()
    } else {
        failed
    });

    format!(
        "{} {}: {}",
        report.reports.len(),
        plural(report.reports.len(), "repository"),
        parts.join(", ")
    )
}

/// One line per change found by a local `apply`.
pub fn change_line(config: &OutputConfig, change: &Change) -> String {
    let color = config.use_color;
    let (marker, styled) = match change.kind {
        ChangeKind::Added => ("A", style("A").green()),
        ChangeKind::Modified => ("M", style("M").yellow()),
        ChangeKind::Deleted => ("D", style("D").red()),
    };
    let marker = if color {
        styled.force_styling(true).to_string()
    } else {
        marker.to_string()
    };
    format!("  {} {}", marker, change.path.display())
}

fn plural(count: usize, noun: &str) -> String {
    match (count, noun) {
        (1, _) => noun.to_string(),
        (_, "repository") => "repositories".to_string(),
        _ => format!("{}s", noun),
    }
}
