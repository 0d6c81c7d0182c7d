//! # kopier
//!
//! kopier keeps a fleet of repositories in sync with a shared set of
//! templates. For every repository it clones the repository, renders the
//! template set matching the repository's `type` against its
//! `service-config.yaml`, overlays the result onto the checkout and, when that
//! changed anything, commits, pushes and opens a pull request.
//!
//! ## Quick Example
//!
//! ```
//! use kopier::config::parse_repo_config;
//! use kopier::phases::render::{render_template, RenderContext, Rendered};
//!
//! let config = parse_repo_config("title: demo\ntype: web").unwrap();
//! let context = RenderContext::from_config(&config);
//!
//! let rendered = render_template("README.md", "# {{.Title}}", &context).unwrap();
//! assert_eq!(rendered, Rendered::Output("# demo".to_string()));
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: the per-repository `service-config.yaml`
//!   and the fleet-wide `config.yml`.
//! - **Phases (`phases`)**: the overlay engine. Resolve a template set,
//!   render it in a scratch workspace, overlay it onto the target tree and
//!   detect whether anything changed.
//! - **Ignore Matching (`matcher`)**: gitignore-style patterns that keep
//!   files out of the overlay.
//! - **Collaborators (`repository`, `git`, `review`)**: the version control
//!   client and the review host, both behind traits.
//! - **Fleet (`fleet`, `cancel`)**: bounded parallel fan-out with per-unit
//!   deadlines and optional fail-fast cancellation.

pub mod cancel;
pub mod changes;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod fleet;
pub mod git;
pub mod matcher;
pub mod output;
pub mod phases;
pub mod repository;
pub mod review;
pub mod workspace;

#[cfg(test)]
mod matcher_proptest;
