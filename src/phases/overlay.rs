//! Phase 3: Selective Overlay
//!
//! Copies the rendered scratch workspace into the target tree.
//!
//! ## Process
//!
//! 1.  **Walk**: Every entry under the workspace is visited. When an ignore
//!     matcher is present, a matching directory is pruned from the walk, so
//!     none of its descendants are considered, and matching files are
//!     skipped.
//!
//! 2.  **Create Directories**: Parent directories are created under the
//!     target as needed, so the relative layout is kept.
//!
//! 3.  **Copy**: Each remaining regular file is copied to the same relative
//!     path in the target, overwriting what is there. Permissions travel
//!     with the file.
//!
//! A top-level `.git` directory in the workspace is never copied. Any I/O
//! failure aborts the overlay; files already copied are left in place.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::matcher::IgnoreMatcher;
use crate::workspace::relative_to;

/// Paths handled by an overlay, relative to the workspace root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayReport {
    pub copied: Vec<PathBuf>,
    /// Files and directories excluded by the ignore matcher
    pub ignored: Vec<PathBuf>,
}

/// Execute Phase 3: copy `workspace` into `target`, honoring `matcher`.
pub fn execute(
    workspace: &Path,
    matcher: Option<&IgnoreMatcher>,
    target: &Path,
) -> Result<OverlayReport> {
    let mut report = OverlayReport::default();
    let mut ignored = Vec::new();

    let walker = WalkDir::new(workspace)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            let Ok(relative) = entry.path().strip_prefix(workspace) else {
                return true;
            };
            let is_dir = entry.file_type().is_dir();
            if entry.depth() == 1 && is_dir && entry.file_name() == ".git" {
                warn!("Not copying .git directory from template set");
                return false;
            }
            match matcher {
                Some(matcher) if matcher.matches_entry(relative, is_dir) => {
                    debug!("Ignoring {}", relative.display());
                    ignored.push(relative.to_path_buf());
                    false
                }
                _ => true,
            }
        });

    for entry in walker {
        let entry = entry.map_err(|e| Error::Overlay {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| workspace.to_path_buf()),
            message: e.to_string(),
        })?;
        let relative = relative_to(entry.path(), workspace)?;
        let destination = target.join(&relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            // With ignore rules in play only files create directories.
            if matcher.is_none() {
                create_dir(&destination)?;
            }
        } else if file_type.is_file() {
            if let Some(parent) = destination.parent() {
                create_dir(parent)?;
            }
            fs::copy(entry.path(), &destination).map_err(|e| Error::Overlay {
                path: destination.clone(),
                message: format!("failed to copy {}: {}", relative.display(), e),
            })?;
            report.copied.push(relative);
        } else {
            // Symbolic links are dropped rather than recreated, so a template
            // set cannot point into or out of the checkout.
            warn!("Skipping non-regular file {}", relative.display());
        }
    }

    report.ignored = ignored;
    Ok(report)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::Overlay {
        path: path.to_path_buf(),
        message: format!("failed to create directory: {}", e),
    })
}
