//! Fleet runner
//!
//! Runs one unit of work per repository on a bounded rayon thread pool and
//! collects one `RepoReport` per repository, in input order.
//!
//! Units share nothing mutable. A unit that returns an error or panics is
//! reported as `Failed` and never affects its siblings, unless `fail_fast` is
//! set, in which case the first failure cancels the shared token and every
//! unit still running or not yet started stops at its next step.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{error, info};
use rayon::prelude::*;

use crate::cancel::{CancellationToken, Deadline};
use crate::config::RepoSlug;
use crate::error::{Error, Result};
use crate::phases::orchestrator::{update_repository, SyncSettings};
use crate::repository::VersionControl;
use crate::review::ReviewHost;

pub use crate::phases::orchestrator::RepoOutcome;

/// Result of one repository's unit of work
#[derive(Debug, Clone)]
pub struct RepoReport {
    pub repository: RepoSlug,
    pub outcome: RepoOutcome,
    pub elapsed: Duration,
}

/// Results of a whole run, in input order
#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    pub reports: Vec<RepoReport>,
}

impl FleetReport {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, RepoOutcome::Updated { .. }))
    }

    pub fn would_update(&self) -> usize {
        self.count(|o| matches!(o, RepoOutcome::WouldUpdate { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, RepoOutcome::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(RepoOutcome::is_failure)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, predicate: impl Fn(&RepoOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// Knobs for a fleet run
#[derive(Debug, Clone, Default)]
pub struct FleetOptions {
    /// Worker threads; `None` uses rayon's default of one per logical CPU.
    pub jobs: Option<usize>,
    /// Per-repository timeout
    pub timeout: Option<Duration>,
    pub fail_fast: bool,
}

/// Update every repository in `repos`.
///
/// `on_done` is called from the worker thread as soon as a repository
/// finishes, in completion order. The returned report is in input order.
/// Only a failure to build the thread pool is returned as an error.
pub fn run(
    repos: &[RepoSlug],
    settings: &SyncSettings,
    vcs: &dyn VersionControl,
    host: &dyn ReviewHost,
    options: &FleetOptions,
    on_done: &(dyn Fn(&RepoReport) + Sync),
) -> Result<FleetReport> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("kopier-{}", i));
    if let Some(jobs) = options.jobs {
        builder = builder.num_threads(jobs);
    }
    let pool = builder
        .build()
        .map_err(|e| Error::configuration(format!("failed to start worker pool: {}", e)))?;

    let token = CancellationToken::new();
    info!(
        "Updating {} repositories on {} workers",
        repos.len(),
        pool.current_num_threads()
    );

    let reports = pool.install(|| {
        repos
            .par_iter()
            .map(|repo| {
                let report = run_unit(repo, settings, vcs, host, options, &token);
                on_done(&report);
                report
            })
            .collect::<Vec<_>>()
    });

    Ok(FleetReport { reports })
}

fn run_unit(
    repo: &RepoSlug,
    settings: &SyncSettings,
    vcs: &dyn VersionControl,
    host: &dyn ReviewHost,
    options: &FleetOptions,
    token: &CancellationToken,
) -> RepoReport {
    let started = Instant::now();
    let deadline = Deadline::start(options.timeout, token.clone());

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        update_repository(repo, settings, vcs, host, &deadline)
    }));

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!("Failed to update {}: {}", repo, e);
            RepoOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Err(payload) => {
            let reason = format!("panicked: {}", panic_message(payload.as_ref()));
            error!("Failed to update {}: {}", repo, reason);
            RepoOutcome::Failed { reason }
        }
    };

    if options.fail_fast && outcome.is_failure() && !token.is_cancelled() {
        info!("Cancelling remaining repositories after failure in {}", repo);
        token.cancel();
    }

    RepoReport {
        repository: repo.clone(),
        outcome,
        elapsed: started.elapsed(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
