//! # Version Control Client
//!
//! This module defines `VersionControl`, the interface the orchestrator uses
//! for every version control step of a repository update: cloning, branching,
//! reading the working-tree status, committing and pushing.
//!
//! ## Design
//!
//! The orchestrator only ever talks to the trait, so the concrete client can
//! be swapped out. `SystemGit` is the implementation used by the binary; it
//! wraps the system `git` command (see [`crate::git`]). Tests substitute
//! in-process implementations that copy fixture trees instead of cloning and
//! record commits and pushes instead of performing them.
//!
//! Every method takes the unit's `Deadline`; implementations are expected to
//! give up once it expires or is cancelled.

use std::path::Path;

use url::Url;

use crate::cancel::Deadline;
use crate::changes::ChangeSet;
use crate::config::{Author, RepoSlug};
use crate::error::{Error, Result};
use crate::git::{self, GitEnv};

/// Version control operations needed to update one repository
pub trait VersionControl: Send + Sync {
    /// Clone `repo` into the empty directory `target`.
    fn clone_repository(&self, repo: &RepoSlug, target: &Path, deadline: &Deadline) -> Result<()>;

    /// Name of the branch currently checked out in `worktree`.
    fn current_branch(&self, worktree: &Path, deadline: &Deadline) -> Result<String>;

    /// Create `branch` from HEAD and switch to it.
    fn create_branch(&self, worktree: &Path, branch: &str, deadline: &Deadline) -> Result<()>;

    /// Changes in the working tree relative to the checked-out branch.
    fn status(&self, worktree: &Path, deadline: &Deadline) -> Result<ChangeSet>;

    /// Stage every change and commit it.
    fn commit_all(
        &self,
        worktree: &Path,
        message: &str,
        author: &Author,
        deadline: &Deadline,
    ) -> Result<()>;

    /// Push `branch` to the remote the worktree was cloned from.
    fn push(&self, worktree: &Path, branch: &str, deadline: &Deadline) -> Result<()>;
}

/// `VersionControl` backed by the system `git` binary.
pub struct SystemGit {
    host: Url,
    token: Option<String>,
}

impl SystemGit {
    /// Create a client cloning from `host`, authenticating with `token` when
    /// one is given.
    pub fn new(host: &str, token: Option<String>) -> Result<Self> {
        let host = Url::parse(host)
            .map_err(|e| Error::configuration(format!("invalid git host '{}': {}", host, e)))?;
        Ok(Self { host, token })
    }

    fn remote_env(&self) -> GitEnv {
        GitEnv::new().with_token(self.token.as_deref())
    }
}

fn label(worktree: &Path) -> String {
    worktree.display().to_string()
}

impl VersionControl for SystemGit {
    fn clone_repository(&self, repo: &RepoSlug, target: &Path, deadline: &Deadline) -> Result<()> {
        let url = git::repo_url(&self.host, repo)?;
        git::clone_shallow(&url, target, &self.remote_env(), &repo.to_string(), deadline)
    }

    fn current_branch(&self, worktree: &Path, deadline: &Deadline) -> Result<String> {
        git::current_branch(worktree, &label(worktree), deadline)
    }

    fn create_branch(&self, worktree: &Path, branch: &str, deadline: &Deadline) -> Result<()> {
        git::create_branch(worktree, branch, &label(worktree), deadline)
    }

    fn status(&self, worktree: &Path, deadline: &Deadline) -> Result<ChangeSet> {
        git::status(worktree, &label(worktree), deadline)
    }

    fn commit_all(
        &self,
        worktree: &Path,
        message: &str,
        author: &Author,
        deadline: &Deadline,
    ) -> Result<()> {
        git::commit_all(worktree, message, author, &label(worktree), deadline)
    }

    fn push(&self, worktree: &Path, branch: &str, deadline: &Deadline) -> Result<()> {
        git::push(worktree, branch, &self.remote_env(), &label(worktree), deadline)
    }
}
