//! Gitignore-style matching for a repository's `buildIgnore` patterns

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log::warn;

/// Compiled ignore predicate.
///
/// Paths are matched relative to the root of the tree being copied. A path
/// is excluded when it, or any directory above it, is ignored; a negated
/// pattern cannot bring back a file whose parent directory is excluded.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    gitignore: Gitignore,
}

impl IgnoreMatcher {
    /// Compile `patterns` in order. Compilation never fails: a malformed
    /// pattern is logged and dropped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GitignoreBuilder::new(".");
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if let Err(e) = builder.add_line(None, pattern) {
                warn!("Ignoring malformed ignore pattern '{}': {}", pattern, e);
            }
        }

        let gitignore = builder.build().unwrap_or_else(|e| {
            warn!("Failed to compile ignore patterns, matching nothing: {}", e);
            Gitignore::empty()
        });
        Self { gitignore }
    }

    /// Build a matcher only when there is something to match.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Option<Self> {
        (!patterns.is_empty()).then(|| Self::new(patterns))
    }

    /// Whether the relative `path` is excluded, taking parent directories
    /// into account.
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        let parent_ignored = path
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .any(|dir| self.matches_entry(dir, true));
        parent_ignored || self.matches_entry(path, is_dir)
    }

    /// Whether the relative `path` itself is excluded. Used while walking a
    /// tree, where parent directories have already been checked.
    pub fn matches_entry(&self, path: &Path, is_dir: bool) -> bool {
        self.gitignore.matched(path, is_dir).is_ignore()
    }

    pub fn pattern_count(&self) -> u64 {
        self.gitignore.num_ignores() + self.gitignore.num_whitelists()
    }
}
