//! Phase 1: Template Resolution
//!
//! Maps a repository's declared `type` to the template set that applies to
//! it. Resolution is a plain path join under the templates root; whether the
//! directory exists is checked when the scratch workspace copies it.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve `kind` to its template-set directory under `templates_root`.
///
/// Fails when `kind` is empty, or when it is anything other than a single
/// relative path component.
pub fn execute(templates_root: &Path, kind: &str) -> Result<PathBuf> {
    let kind = kind.trim();
    if kind.is_empty() {
        return Err(Error::Configuration {
            message: "repository type not set".to_string(),
            hint: Some("Add 'type:' to service-config.yaml".to_string()),
        });
    }

    let mut components = Path::new(kind).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(templates_root.join(kind)),
        _ => Err(Error::Configuration {
            message: format!("invalid repository type '{}'", kind),
            hint: Some("The type must name a single directory under the templates root".to_string()),
        }),
    }
}
