//! Review host integration
//!
//! After a branch has been pushed, a pull request proposes it for merge into
//! the repository's original branch. `ReviewHost` is the seam the orchestrator
//! uses; `GitHubClient` implements it against the GitHub REST API.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cancel::Deadline;
use crate::config::RepoSlug;
use crate::error::{Error, Result};

const GITHUB_API_VERSION: &str = "2022-11-28";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A pull request to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub repository: RepoSlug,
    pub title: String,
    pub body: String,
    /// Branch carrying the changes
    pub head: String,
    /// Branch the changes should be merged into
    pub base: String,
}

/// A pull request the host accepted
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    #[serde(rename = "html_url")]
    pub url: String,
}

/// Opens pull requests on a code review host
pub trait ReviewHost: Send + Sync {
    fn open_pull_request(&self, request: &PullRequest, deadline: &Deadline)
        -> Result<PullRequestRef>;
}

#[derive(Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

/// `ReviewHost` for GitHub and GitHub Enterprise
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client for the API at `api_url`.
    ///
    /// Without a token the client can be constructed (dry runs never open
    /// pull requests) but every request fails.
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| Error::configuration(format!("invalid API URL '{}': {}", api_url, e)))?;
        let client = Client::builder()
            .user_agent(concat!("kopier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            token,
        })
    }

    /// Endpoint for creating pull requests in `repo`.
    pub fn pulls_url(&self, repo: &RepoSlug) -> Result<Url> {
        let mut base = self.api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(&format!("repos/{}/{}/pulls", repo.owner, repo.name))
            .map_err(|e| Error::configuration(format!("invalid API URL for {}: {}", repo, e)))
    }
}

impl ReviewHost for GitHubClient {
    fn open_pull_request(
        &self,
        request: &PullRequest,
        deadline: &Deadline,
    ) -> Result<PullRequestRef> {
        let repository = request.repository.to_string();
        let host_error = |message: String| Error::ReviewHost {
            repository: repository.clone(),
            message,
        };

        let token = self.token.as_deref().ok_or_else(|| {
            host_error("no access token configured; set GITHUB_TOKEN or pass --token".to_string())
        })?;

        let operation = "opening pull request";
        deadline.check(operation)?;
        let url = self.pulls_url(&request.repository)?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .timeout(deadline.remaining().unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .json(&CreatePullRequest {
                title: &request.title,
                body: &request.body,
                head: &request.head,
                base: &request.base,
            })
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    deadline.timeout_error(operation)
                } else {
                    host_error(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(host_error(format!("{} {}", status, body.trim())));
        }

        response
            .json::<PullRequestRef>()
            .map_err(|e| host_error(format!("unexpected response: {}", e)))
    }
}
