//! # Configuration Schema and Parsing
//!
//! kopier reads two YAML files:
//!
//! - **`service-config.yaml`** (or `service-config.yml`), which lives in each
//!   target repository and describes it. It is parsed into a `RepoConfig`.
//!   Its `type` field picks the template set, and its ignore patterns filter
//!   what gets copied.
//!
//! - **`config.yml`**, the fleet configuration, listing the repositories to
//!   update plus the branch, commit, pull request and host settings used for
//!   every one of them. It is parsed into a `FleetConfig`.
//!
//! Both files use camelCase keys. Missing optional keys fall back to
//! defaults, and a key written with no value (`description:`) counts as
//! missing.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// File names searched for in a checkout, in order.
pub const SERVICE_CONFIG_FILES: [&str; 2] = ["service-config.yaml", "service-config.yml"];

/// Default fleet configuration file name.
pub const FLEET_CONFIG_FILE: &str = "config.yml";

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Nested `build:` block of a service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Gitignore-style patterns excluded from the overlay.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ignore: Vec<String>,
}

/// Per-repository descriptor loaded from `service-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Selects the template set. Required.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub protocol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub build: BuildConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub build_ignore: Vec<String>,
    /// Any other top-level keys, handed to templates untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RepoConfig {
    /// All ignore patterns: `build.ignore` first, then `buildIgnore`.
    pub fn ignore_patterns(&self) -> Vec<String> {
        self.build
            .ignore
            .iter()
            .chain(self.build_ignore.iter())
            .cloned()
            .collect()
    }

    /// Load the service configuration from the root of a checkout.
    ///
    /// `service-config.yaml` wins over `service-config.yml` when both exist.
    pub fn load_from_checkout(checkout: &Path) -> Result<Self> {
        let path = SERVICE_CONFIG_FILES
            .iter()
            .map(|name| checkout.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::Configuration {
                message: format!(
                    "no service configuration found in {}",
                    checkout.display()
                ),
                hint: Some(format!(
                    "Add {} describing the repository and its 'type'",
                    SERVICE_CONFIG_FILES[0]
                )),
            })?;

        let content = fs::read_to_string(&path).map_err(|e| {
            Error::configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse_repo_config(&content).map_err(|e| match e {
            Error::Configuration { message, hint } => Error::Configuration {
                message: format!("{}: {}", path.display(), message),
                hint,
            },
            other => other,
        })
    }
}

/// Parse a service configuration from YAML text.
pub fn parse_repo_config(content: &str) -> Result<RepoConfig> {
    if content.trim().is_empty() {
        return Err(Error::configuration("service configuration is empty"));
    }
    serde_yaml::from_str(content)
        .map_err(|e| Error::configuration(format!("invalid service configuration: {}", e)))
}

/// `owner/name` identifier of a hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Filesystem-friendly form used to prefix temporary directories.
    pub fn dir_prefix(&self) -> String {
        format!("{}-{}-", self.owner, self.name)
    }
}

impl FromStr for RepoSlug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Configuration {
            message: format!("invalid repository identifier '{}'", s),
            hint: Some("Use the form 'owner/name'".to_string()),
        };
        let (owner, name) = s.trim().split_once('/').ok_or_else(invalid)?;
        let valid_part = |part: &str| {
            !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\', ' '])
        };
        if !valid_part(owner) || !valid_part(name) {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Commit author identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            name: "kopier".to_string(),
            email: "kopier@users.noreply.github.com".to_string(),
        }
    }
}

/// Title and body of every pull request opened by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestTemplate {
    pub title: String,
    pub body: String,
}

impl Default for PullRequestTemplate {
    fn default() -> Self {
        Self {
            title: "Update Kopier files".to_string(),
            body: "Hello 👋 We have some updates from kopier for you!".to_string(),
        }
    }
}

fn default_templates() -> PathBuf {
    PathBuf::from("templates")
}

fn default_branch_prefix() -> String {
    "kopier".to_string()
}

fn default_commit_message() -> String {
    "ci: Update kopier".to_string()
}

fn default_git_host() -> String {
    "https://github.com".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

/// Fleet configuration loaded from `config.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetConfig {
    /// Repositories to update, as `owner/name`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub repositories: Vec<String>,
    /// Root directory holding one template set per repository type.
    #[serde(default = "default_templates")]
    pub templates: PathBuf,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub pull_request: PullRequestTemplate,
    #[serde(default = "default_git_host")]
    pub git_host: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Worker threads; defaults to the number of logical CPUs.
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Per-repository timeout in seconds. `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            templates: default_templates(),
            branch_prefix: default_branch_prefix(),
            commit_message: default_commit_message(),
            author: Author::default(),
            pull_request: PullRequestTemplate::default(),
            git_host: default_git_host(),
            api_url: default_api_url(),
            jobs: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FleetConfig {
    /// Load and validate a fleet configuration file.
    ///
    /// A relative `templates` path is resolved against the directory that
    /// contains the configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Configuration {
            message: format!("failed to read {}: {}", path.display(), e),
            hint: Some(format!(
                "Create a {} with a 'repositories:' list",
                FLEET_CONFIG_FILE
            )),
        })?;
        let mut config = Self::parse(&content)?;
        if config.templates.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.templates = base.join(&config.templates);
        }
        Ok(config)
    }

    /// Parse and validate a fleet configuration from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: FleetConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("invalid fleet configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.repository_slugs()?;
        for (key, value) in [("gitHost", &self.git_host), ("apiUrl", &self.api_url)] {
            Url::parse(value).map_err(|e| Error::Configuration {
                message: format!("invalid {} '{}': {}", key, value, e),
                hint: Some("Use an absolute URL such as https://github.com".to_string()),
            })?;
        }
        if self.jobs == Some(0) {
            return Err(Error::configuration("jobs must be at least 1"));
        }
        if self.branch_prefix.trim().is_empty() {
            return Err(Error::configuration("branchPrefix must not be empty"));
        }
        Ok(())
    }

    /// Parsed repository identifiers, in configuration order.
    pub fn repository_slugs(&self) -> Result<Vec<RepoSlug>> {
        self.repositories.iter().map(|r| r.parse()).collect()
    }

    /// Per-repository timeout, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Branch name for a run started at `unix_secs`.
    pub fn branch_name(&self, unix_secs: u64) -> String {
        format!("{}-{}", self.branch_prefix.trim(), unix_secs)
    }
}
