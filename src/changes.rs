//! Change sets describing how a target tree moved away from its baseline
//!
//! A `ChangeSet` comes from one of two places: the `git status` of a checkout
//! (see [`parse_porcelain`]) or a comparison of two in-memory snapshots of
//! the same directory (see [`diff`]). An empty change set means the overlay
//! left the tree exactly as it was.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::filesystem::MemoryFS;

/// Kind of change to a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    /// Path exists now but not in the baseline
    Added,
    /// Path exists in both but content or mode differs
    Modified,
    /// Path existed in the baseline but is gone
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// A single change entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Ordered list of changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>, kind: ChangeKind) {
        self.changes.push(Change {
            path: path.into(),
            kind,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

/// Parse the output of `git status --porcelain=v1 -z`.
///
/// Each record is `XY PATH\0`; renames and copies carry the original path as
/// an extra NUL-terminated field, which is reported as a deletion.
pub fn parse_porcelain(output: &[u8]) -> Result<ChangeSet> {
    let mut changes = ChangeSet::new();
    let mut fields = output
        .split(|b| *b == 0)
        .filter(|field| !field.is_empty());

    while let Some(record) = fields.next() {
        if record.len() < 4 || record[2] != b' ' {
            return Err(Error::ChangeDetection {
                message: format!(
                    "unexpected status record: {:?}",
                    String::from_utf8_lossy(record)
                ),
            });
        }
        let (x, y) = (record[0], record[1]);
        let path = PathBuf::from(String::from_utf8_lossy(&record[3..]).into_owned());

        let kind = match (x, y) {
            (b'?', b'?') => ChangeKind::Added,
            (b'R', _) | (b'C', _) | (_, b'R') | (_, b'C') => {
                let original = fields.next().ok_or_else(|| Error::ChangeDetection {
                    message: format!("rename record without source: {}", path.display()),
                })?;
                if x == b'R' || y == b'R' {
                    changes.push(
                        String::from_utf8_lossy(original).into_owned(),
                        ChangeKind::Deleted,
                    );
                }
                ChangeKind::Added
            }
            (b'A', _) | (_, b'A') => ChangeKind::Added,
            (b'D', _) | (_, b'D') => ChangeKind::Deleted,
            _ => ChangeKind::Modified,
        };
        changes.push(path, kind);
    }

    Ok(changes)
}

/// Compare two snapshots of the same tree.
pub fn diff(before: &MemoryFS, after: &MemoryFS) -> ChangeSet {
    let mut changes = ChangeSet::new();

    for (path, file) in after.files() {
        match before.get_file(path) {
            None => changes.push(path.clone(), ChangeKind::Added),
            Some(old) if old != file => changes.push(path.clone(), ChangeKind::Modified),
            Some(_) => {}
        }
    }
    for (path, _) in before.files() {
        if !after.exists(path) {
            changes.push(path.clone(), ChangeKind::Deleted);
        }
    }

    changes
}
