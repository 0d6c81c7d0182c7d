//! Orchestrator for one repository's unit of work
//!
//! This module wraps the overlay phases with the version control and review
//! steps needed to update a single repository:
//! 1. Clone the repository into a private checkout and branch off
//! 2. Load its `service-config.yaml`
//! 3. Resolve, render and overlay its template set (Phases 1-3)
//! 4. Detect whether anything changed (Phase 4)
//! 5. Commit, push and open a pull request, or stop when nothing changed
//!
//! The checkout is private to the unit and removed when it finishes.

use std::path::PathBuf;

use log::{debug, info};

use super::{apply_templates, detect};
use crate::cancel::Deadline;
use crate::config::{Author, PullRequestTemplate, RepoConfig, RepoSlug};
use crate::error::Result;
use crate::repository::VersionControl;
use crate::review::{PullRequest, ReviewHost};
use crate::workspace::Checkout;

/// Settings shared by every repository in a run
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub templates_root: PathBuf,
    /// Branch created in every repository that needs an update
    pub branch: String,
    pub commit_message: String,
    pub author: Author,
    pub pull_request: PullRequestTemplate,
    /// Stop after change detection; never commit, push or open a pull request
    pub dry_run: bool,
}

/// How one repository's unit of work ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    /// Changes were committed, pushed and proposed
    Updated { changes: usize, pull_request: String },
    /// Changes were found during a dry run
    WouldUpdate { changes: usize },
    /// The templates produced no change
    Unchanged,
    Failed { reason: String },
}

impl RepoOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RepoOutcome::Failed { .. })
    }
}

/// Run the complete update for `repo`.
///
/// Returns an error for any failure; the caller decides how to report it.
/// Nothing is committed, pushed or proposed unless change detection found
/// at least one change.
pub fn update_repository(
    repo: &RepoSlug,
    settings: &SyncSettings,
    vcs: &dyn VersionControl,
    host: &dyn ReviewHost,
    deadline: &Deadline,
) -> Result<RepoOutcome> {
    deadline.check("starting update")?;

    let checkout = Checkout::acquire(&repo.dir_prefix())?;
    let worktree = checkout.path();

    info!("Cloning {}", repo);
    vcs.clone_repository(repo, worktree, deadline)?;
    let base = vcs.current_branch(worktree, deadline)?;
    vcs.create_branch(worktree, &settings.branch, deadline)?;

    let config = RepoConfig::load_from_checkout(worktree)?;
    deadline.check("applying templates")?;

    // Phases 1-3: Resolve, Render, Overlay
    let report = apply_templates(&config, &settings.templates_root, worktree)?;
    debug!(
        "{}: {} files copied, {} ignored, {} untemplated",
        repo,
        report.overlay.copied.len(),
        report.overlay.ignored.len(),
        report.render.untemplated.len()
    );

    // Phase 4: Change Detection
    let changes = detect::execute(vcs, worktree, deadline)?;
    if changes.is_empty() {
        info!("{} does not need an update", repo);
        return Ok(RepoOutcome::Unchanged);
    }
    for change in changes.iter() {
        debug!("{}: {} {}", repo, change.kind, change.path.display());
    }

    if settings.dry_run {
        info!("{} would be updated ({} changes)", repo, changes.len());
        return Ok(RepoOutcome::WouldUpdate {
            changes: changes.len(),
        });
    }

    vcs.commit_all(worktree, &settings.commit_message, &settings.author, deadline)?;
    vcs.push(worktree, &settings.branch, deadline)?;

    let pull_request = host.open_pull_request(
        &PullRequest {
            repository: repo.clone(),
            title: settings.pull_request.title.clone(),
            body: settings.pull_request.body.clone(),
            head: settings.branch.clone(),
            base,
        },
        deadline,
    )?;
    info!("Opened pull request #{} for {}", pull_request.number, repo);

    Ok(RepoOutcome::Updated {
        changes: changes.len(),
        pull_request: pull_request.url,
    })
}
