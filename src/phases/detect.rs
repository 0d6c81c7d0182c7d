//! Phase 4: Change Detection
//!
//! Decides whether the overlay actually changed the target tree. An empty
//! change set stops the unit of work before anything is committed, pushed
//! or proposed.

use std::path::Path;

use crate::cancel::Deadline;
use crate::changes::{self, ChangeSet};
use crate::error::{Error, Result};
use crate::filesystem::MemoryFS;
use crate::repository::VersionControl;

/// Execute Phase 4 against a version-controlled checkout.
///
/// The working-tree status relative to the checked-out branch is the
/// baseline. Timeouts and cancellation pass through unchanged; every other
/// failure becomes a change detection error.
pub fn execute(vcs: &dyn VersionControl, worktree: &Path, deadline: &Deadline) -> Result<ChangeSet> {
    vcs.status(worktree, deadline).map_err(|e| match e {
        e @ Error::ChangeDetection { .. } => e,
        e if e.is_interrupted() => e,
        other => Error::ChangeDetection {
            message: other.to_string(),
        },
    })
}

/// Compare `tree` with a snapshot taken before the overlay.
pub fn snapshot_diff(baseline: &MemoryFS, tree: &Path) -> Result<ChangeSet> {
    let current = MemoryFS::load_dir(tree)?;
    Ok(changes::diff(baseline, &current))
}

/// Like [`snapshot_diff`], but only `paths` are read back. The baseline must
/// have been taken with [`MemoryFS::load_paths`] over the same paths.
pub fn snapshot_diff_paths<P: AsRef<Path>>(
    baseline: &MemoryFS,
    tree: &Path,
    paths: &[P],
) -> Result<ChangeSet> {
    let current = MemoryFS::load_paths(tree, paths)?;
    Ok(changes::diff(baseline, &current))
}
