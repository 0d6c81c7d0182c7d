//! Sync command implementation
//!
//! Updates every repository listed in the fleet configuration:
//! 1. Load `config.yml` and apply command-line overrides
//! 2. Fan out one unit of work per repository (clone, overlay, detect,
//!    commit, push, pull request)
//! 3. Print one line per repository and a summary
//!
//! The command fails when any repository failed.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use kopier::config::{FleetConfig, FLEET_CONFIG_FILE};
use kopier::fleet::{self, FleetOptions, RepoReport};
use kopier::output::{self, OutputConfig};
use kopier::phases::orchestrator::SyncSettings;
use kopier::repository::SystemGit;
use kopier::review::GitHubClient;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to the fleet configuration
    #[arg(short, long, value_name = "PATH", default_value = FLEET_CONFIG_FILE, env = "KOPIER_CONFIG")]
    pub config: PathBuf,

    /// Templates root, overriding `templates` from the configuration
    #[arg(short, long, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Number of repositories updated in parallel
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<NonZeroUsize>,

    /// Per-repository timeout in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Detect changes without committing, pushing or opening pull requests
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Cancel the remaining repositories after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Suppress all output except failures
    #[arg(short, long)]
    pub quiet: bool,

    /// Access token for cloning, pushing and opening pull requests
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Execute the sync command
pub fn execute(args: SyncArgs, out: &OutputConfig) -> Result<()> {
    let mut config = FleetConfig::from_file(&args.config)?;
    if let Some(templates) = args.templates {
        config.templates = templates;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = Some(jobs.get());
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }

    let token = args.token.filter(|t| !t.trim().is_empty());
    if token.is_none() && !args.dry_run {
        bail!("No access token: set GITHUB_TOKEN or pass --token (or use --dry-run)");
    }

    let repos = config.repository_slugs()?;
    if repos.is_empty() {
        if !args.quiet {
            println!("No repositories configured in {}", args.config.display());
        }
        return Ok(());
    }

    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the Unix epoch")?;
    let settings = SyncSettings {
        templates_root: config.templates.clone(),
        branch: config.branch_name(started.as_secs()),
        commit_message: config.commit_message.clone(),
        author: config.author.clone(),
        pull_request: config.pull_request.clone(),
        dry_run: args.dry_run,
    };
    info!("Using branch {}", settings.branch);

    let vcs = SystemGit::new(&config.git_host, token.clone())?;
    let host = GitHubClient::new(&config.api_url, token)?;
    let options = FleetOptions {
        jobs: config.jobs,
        timeout: config.timeout(),
        fail_fast: args.fail_fast,
    };

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        progress_bar(repos.len() as u64)
    };
    if args.dry_run && !args.quiet {
        bar.println(format!(
            "{} Dry run: nothing will be committed, pushed or proposed",
            output::emoji(out, "🔎", "[DRY-RUN]")
        ));
    }

    let on_done = |report: &RepoReport| {
        let line = output::report_line(out, report);
        if !args.quiet {
            bar.println(line);
        } else if report.outcome.is_failure() {
            eprintln!("{}", line);
        }
        bar.inc(1);
    };
    let report = fleet::run(&repos, &settings, &vcs, &host, &options, &on_done)?;
    bar.finish_and_clear();

    if !args.quiet {
        println!("{}", output::summary(out, &report));
    }

    if report.has_failures() {
        bail!(
            "{} of {} repositories failed",
            report.failed(),
            report.reports.len()
        );
    }
    Ok(())
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
