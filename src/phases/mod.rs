//! # Template Overlay Pipeline
//!
//! A repository is updated in a fixed sequence of phases. The first three
//! form the overlay engine and only touch the local filesystem; the fourth
//! decides whether anything downstream happens at all.
//!
//! 1.  **Resolve** (`resolve`): map the repository's `type` to a template set.
//! 2.  **Render** (`render`): copy the template set into a scratch workspace
//!     and render every file in place against the repository configuration.
//! 3.  **Overlay** (`overlay`): copy the rendered workspace into the target
//!     tree, skipping anything the repository's ignore patterns exclude.
//! 4.  **Detect** (`detect`): compare the target tree with its baseline.
//!
//! `apply_templates` runs phases 1 to 3. The `orchestrator` wraps all four
//! with the clone, commit, push and pull request steps for one repository.

pub mod detect;
pub mod orchestrator;
pub mod overlay;
pub mod render;
pub mod resolve;

use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::config::RepoConfig;
use crate::error::{Error, Result};
use crate::matcher::IgnoreMatcher;
use crate::workspace::{relative_to, ScratchWorkspace};

use self::overlay::OverlayReport;
use self::render::{RenderContext, RenderReport};

/// What phases 1 to 3 did to a target tree
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub template_set: PathBuf,
    pub render: RenderReport,
    pub overlay: OverlayReport,
}

/// Resolve, render and overlay the template set for `config` onto `target`.
///
/// The scratch workspace is dropped before this returns, whatever the
/// outcome.
pub fn apply_templates(
    config: &RepoConfig,
    templates_root: &Path,
    target: &Path,
) -> Result<ApplyReport> {
    let template_set = resolve::execute(templates_root, &config.kind)?;
    let scratch = ScratchWorkspace::create(&template_set)?;

    let context = RenderContext::from_config(config);
    let render = render::execute(scratch.path(), &context)?;

    let patterns = config.ignore_patterns();
    let matcher = IgnoreMatcher::from_patterns(&patterns);
    if let Some(matcher) = &matcher {
        debug!("Compiled {} ignore patterns", matcher.pattern_count());
    }
    let overlay = overlay::execute(scratch.path(), matcher.as_ref(), target)?;

    Ok(ApplyReport {
        template_set,
        render,
        overlay,
    })
}

/// Relative paths of the regular files in the template set for `config`.
///
/// These are the only paths an overlay of that set can write. A template
/// set that does not exist yields no paths; `apply_templates` reports it.
pub fn template_paths(config: &RepoConfig, templates_root: &Path) -> Result<Vec<PathBuf>> {
    let template_set = resolve::execute(templates_root, &config.kind)?;
    if !template_set.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(&template_set).min_depth(1) {
        let entry = entry.map_err(|e| Error::Overlay {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| template_set.clone()),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() {
            paths.push(relative_to(entry.path(), &template_set)?);
        }
    }
    Ok(paths)
}
