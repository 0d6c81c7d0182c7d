//! In-memory snapshot of a directory tree
//!
//! `MemoryFS` holds the content and permissions of every file under a root.
//! Two snapshots of the same tree, taken before and after an overlay, are
//! compared by [`crate::changes::diff`] when no version control status is
//! available.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Represents a file with content and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// File content as bytes
    pub content: Vec<u8>,
    /// Unix permission bits (0o644 where unavailable)
    pub permissions: u32,
}

impl File {
    /// Create a new file with content
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            permissions: 0o644,
        }
    }

    /// Create a new file from string content
    pub fn from_string(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }
}

/// Files stored by relative path, ordered for stable iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryFS {
    files: BTreeMap<PathBuf, File>,
}

impl MemoryFS {
    /// Create a new empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every regular file under `root`, skipping `.git`.
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut snapshot = Self::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == ".git"));

        for entry in walker {
            let entry = entry.map_err(|e| Error::ChangeDetection {
                message: format!("failed to walk {}: {}", root.display(), e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::ChangeDetection {
                    message: format!("path outside snapshot root: {}", entry.path().display()),
                })?;
            snapshot.add_file(relative, read_file(entry.path())?);
        }

        Ok(snapshot)
    }

    /// Snapshot only the given paths under `root`. Paths that do not name a
    /// regular file are left out.
    pub fn load_paths<P: AsRef<Path>>(root: &Path, paths: &[P]) -> Result<Self> {
        let mut snapshot = Self::new();
        for path in paths {
            let path = path.as_ref();
            let full = root.join(path);
            match fs::symlink_metadata(&full) {
                Ok(metadata) if metadata.is_file() => snapshot.add_file(path, read_file(&full)?),
                _ => {}
            }
        }
        Ok(snapshot)
    }

    /// Add or update a file
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, file: File) {
        self.files.insert(path.as_ref().to_path_buf(), file);
    }

    /// Add a file with string content
    pub fn add_file_string<P: AsRef<Path>>(&mut self, path: P, content: &str) {
        self.add_file(path, File::from_string(content))
    }

    /// Get a file by path
    pub fn get_file<P: AsRef<Path>>(&self, path: P) -> Option<&File> {
        self.files.get(path.as_ref())
    }

    /// Check if a file exists
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.files.contains_key(path.as_ref())
    }

    /// Get the number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if filesystem is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over all files as (path, file) pairs, ordered by path
    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &File)> {
        self.files.iter()
    }
}

fn read_file(path: &Path) -> Result<File> {
    let content = fs::read(path).map_err(|e| Error::ChangeDetection {
        message: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut file = File::new(content);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            file.permissions = metadata.permissions().mode() & 0o777;
        }
    }
    Ok(file)
}
