//! # Error Handling
//!
//! This module defines the centralized error type for kopier. It uses
//! `thiserror` to build one `Error` enum covering every failure a single
//! repository's unit of work can hit, from loading its configuration through
//! opening the pull request.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. The first four variants are the core
//!   taxonomy of the overlay engine (configuration, template, overlay and
//!   change detection). The rest cover the external collaborators (git and
//!   the review host), deadline handling and wrapped library errors.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Every error is local to one repository. The fleet runner turns it into a
//! failed outcome for that repository and carries on with the others.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for kopier operations
#[derive(Error, Debug)]
pub enum Error {
    /// The repository or fleet configuration is missing or invalid.
    ///
    /// Covers an empty or unusable repository `type`, a missing
    /// `service-config.yaml` and malformed `config.yml` entries.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Configuration {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A template failed to parse or execute.
    #[error("Template error in {}: {message}", file.display())]
    Template { file: PathBuf, message: String },

    /// An I/O failure while preparing the scratch workspace or copying
    /// rendered output into the target tree.
    #[error("Overlay error at {}: {message}", path.display())]
    Overlay { path: PathBuf, message: String },

    /// The working-tree status could not be inspected.
    #[error("Change detection error: {message}")]
    ChangeDetection { message: String },

    /// A git subprocess exited unsuccessfully or could not be started.
    #[error("Git command failed for {repository}: {command} - {stderr}")]
    GitCommand {
        command: String,
        repository: String,
        stderr: String,
    },

    /// The review host rejected or failed the pull request request.
    #[error("Review host error for {repository}: {message}")]
    ReviewHost { repository: String, message: String },

    /// The unit of work ran past its deadline.
    #[error("Timed out after {seconds}s during {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// The unit of work was cancelled before or during an operation.
    #[error("Cancelled during {operation}")]
    Cancelled { operation: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a configuration error without a hint.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            hint: None,
        }
    }

    /// True for errors raised by the deadline or cancellation token rather
    /// than by the work itself.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Cancelled { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
