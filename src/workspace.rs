//! Scoped temporary directories
//!
//! Both the scratch copy of a template set and the clone of a target
//! repository live in temporary directories owned by a guard. Dropping the
//! guard deletes the directory, so every exit path of a unit of work
//! (success, no-op, error or unwinding panic) releases them.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Private, writable copy of a template set.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Copy the template set at `template_set` into a fresh temporary
    /// directory.
    ///
    /// Fails with a configuration error when `template_set` is not a
    /// directory, so an unknown repository type never produces an empty
    /// workspace.
    pub fn create(template_set: &Path) -> Result<Self> {
        if !template_set.is_dir() {
            return Err(Error::Configuration {
                message: format!("template set not found: {}", template_set.display()),
                hint: Some(
                    "Check that the repository 'type' matches a directory under the templates root"
                        .to_string(),
                ),
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("kopier-scratch-")
            .tempdir()
            .map_err(|e| Error::Overlay {
                path: std::env::temp_dir(),
                message: format!("failed to create scratch workspace: {}", e),
            })?;
        copy_tree(template_set, dir.path())?;
        debug!(
            "Copied template set {} into {}",
            template_set.display(),
            dir.path().display()
        );

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Temporary directory that receives a repository clone.
#[derive(Debug)]
pub struct Checkout {
    dir: TempDir,
}

impl Checkout {
    /// Create an empty directory whose name starts with `prefix`.
    pub fn acquire(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(Error::Io)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Recursively copy the regular files under `src` into `dst`, keeping
/// relative paths and permissions. Symbolic links are skipped.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| Error::Overlay {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf()),
            message: e.to_string(),
        })?;
        let relative = relative_to(entry.path(), src)?;
        let target = dst.join(&relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::Overlay {
                path: target.clone(),
                message: format!("failed to create directory: {}", e),
            })?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| Error::Overlay {
                path: target.clone(),
                message: format!("failed to copy {}: {}", entry.path().display(), e),
            })?;
        } else {
            // Symbolic links are not recreated in the copy.
            warn!("Skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(())
}

pub(crate) fn relative_to(path: &Path, root: &Path) -> Result<PathBuf> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| Error::Overlay {
            path: path.to_path_buf(),
            message: format!("path is outside {}", root.display()),
        })
}
