//! Git operations through the system `git` binary
//!
//! Every command runs as a child process that is polled against the unit's
//! `Deadline` and killed once it expires or is cancelled. Output is captured
//! in anonymous temporary files rather than pipes, so a chatty command can
//! never block on a full pipe while it is being polled.
//!
//! Credentials are handed to git as an `http.extraHeader` through the
//! `GIT_CONFIG_*` environment variables. They never appear in a URL, on the
//! command line or in error messages.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::debug;
use url::Url;

use crate::cancel::Deadline;
use crate::changes::{parse_porcelain, ChangeSet};
use crate::config::{Author, RepoSlug};
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Environment for one git invocation
#[derive(Debug, Clone, Default)]
pub struct GitEnv {
    vars: Vec<(String, String)>,
}

impl GitEnv {
    pub fn new() -> Self {
        // Never fall back to an interactive credential prompt.
        Self {
            vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
        }
    }

    /// Authenticate HTTPS requests with a token, as GitHub expects for
    /// installation and personal access tokens.
    pub fn with_token(mut self, token: Option<&str>) -> Self {
        if let Some(token) = token {
            let credentials = STANDARD.encode(format!("x-access-token:{}", token));
            self.vars.extend([
                ("GIT_CONFIG_COUNT".to_string(), "1".to_string()),
                ("GIT_CONFIG_KEY_0".to_string(), "http.extraHeader".to_string()),
                (
                    "GIT_CONFIG_VALUE_0".to_string(),
                    format!("Authorization: Basic {}", credentials),
                ),
            ]);
        }
        self
    }

    /// Use `author` as both author and committer.
    pub fn with_author(mut self, author: &Author) -> Self {
        for role in ["AUTHOR", "COMMITTER"] {
            self.vars
                .push((format!("GIT_{}_NAME", role), author.name.clone()));
            self.vars
                .push((format!("GIT_{}_EMAIL", role), author.email.clone()));
        }
        self
    }
}

/// Build the clone URL of `repo` on `host`.
pub fn repo_url(host: &Url, repo: &RepoSlug) -> Result<Url> {
    let mut base = host.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("{}/{}.git", repo.owner, repo.name))
        .map_err(|e| Error::configuration(format!("invalid clone URL for {}: {}", repo, e)))
}

/// Run `git <args>` and return its stdout.
///
/// `label` identifies the repository in error messages.
pub fn run(
    args: &[&str],
    cwd: Option<&Path>,
    env: &GitEnv,
    label: &str,
    deadline: &Deadline,
) -> Result<Vec<u8>> {
    let subcommand = args.first().copied().unwrap_or("git");
    let operation = format!("git {}", subcommand);
    deadline.check(&operation)?;

    let command_error = |stderr: String| Error::GitCommand {
        command: operation.clone(),
        repository: label.to_string(),
        stderr,
    };

    let mut stdout = tempfile::tempfile()?;
    let mut stderr = tempfile::tempfile()?;

    let mut command = Command::new("git");
    command
        .args(args)
        .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout.try_clone()?))
        .stderr(Stdio::from(stderr.try_clone()?));
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    debug!("{}: running {}", label, operation);
    let mut child = command.spawn().map_err(|e| command_error(e.to_string()))?;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if deadline.is_cancelled() || deadline.is_expired() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(if deadline.is_cancelled() {
                Error::Cancelled {
                    operation: operation.clone(),
                }
            } else {
                deadline.timeout_error(&operation)
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let output = read_back(&mut stdout)?;
    if !status.success() {
        let message = String::from_utf8_lossy(&read_back(&mut stderr)?)
            .trim()
            .to_string();
        return Err(command_error(if message.is_empty() {
            status.to_string()
        } else {
            message
        }));
    }
    Ok(output)
}

fn read_back(file: &mut File) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Shallow-clone `url` into the empty directory `target`.
pub fn clone_shallow(
    url: &Url,
    target: &Path,
    env: &GitEnv,
    label: &str,
    deadline: &Deadline,
) -> Result<()> {
    let target = target.to_string_lossy();
    run(
        &["clone", "--quiet", "--depth=1", url.as_str(), target.as_ref()],
        None,
        env,
        label,
        deadline,
    )?;
    Ok(())
}

/// Name of the branch checked out in `worktree`.
pub fn current_branch(worktree: &Path, label: &str, deadline: &Deadline) -> Result<String> {
    let output = run(
        &["symbolic-ref", "--short", "HEAD"],
        Some(worktree),
        &GitEnv::new(),
        label,
        deadline,
    )?;
    Ok(String::from_utf8_lossy(&output).trim().to_string())
}

/// Create and check out `branch` from the current HEAD.
pub fn create_branch(worktree: &Path, branch: &str, label: &str, deadline: &Deadline) -> Result<()> {
    run(
        &["checkout", "--quiet", "-b", branch],
        Some(worktree),
        &GitEnv::new(),
        label,
        deadline,
    )?;
    Ok(())
}

/// Working-tree status, untracked files included.
pub fn status(worktree: &Path, label: &str, deadline: &Deadline) -> Result<ChangeSet> {
    let output = run(
        &["status", "--porcelain=v1", "-z", "--untracked-files=all"],
        Some(worktree),
        &GitEnv::new(),
        label,
        deadline,
    )?;
    parse_porcelain(&output)
}

/// Stage everything and commit it as `author`.
pub fn commit_all(
    worktree: &Path,
    message: &str,
    author: &Author,
    label: &str,
    deadline: &Deadline,
) -> Result<()> {
    let env = GitEnv::new().with_author(author);
    run(&["add", "--all"], Some(worktree), &env, label, deadline)?;
    run(
        &[
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "--no-verify",
            "-m",
            message,
        ],
        Some(worktree),
        &env,
        label,
        deadline,
    )?;
    Ok(())
}

/// Push `branch` to `origin` and set it as upstream.
pub fn push(
    worktree: &Path,
    branch: &str,
    env: &GitEnv,
    label: &str,
    deadline: &Deadline,
) -> Result<()> {
    run(
        &["push", "--quiet", "--set-upstream", "origin", branch],
        Some(worktree),
        env,
        label,
        deadline,
    )?;
    Ok(())
}
