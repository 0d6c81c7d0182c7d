//! Integration tests for the fleet runner
//!
//! These tests drive `fleet::run` end to end with in-process version control
//! and review host implementations: "cloning" copies a fixture tree, status
//! is a snapshot diff against that copy, and commits, pushes and pull
//! requests are recorded instead of performed. No network access or git
//! binary is needed.

mod common;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use common::prelude::*;
use kopier::cancel::Deadline;
use kopier::changes::ChangeSet;
use kopier::config::{Author, PullRequestTemplate, RepoSlug};
use kopier::error::{Error, Result};
use kopier::filesystem::MemoryFS;
use kopier::fleet::{self, FleetOptions, RepoOutcome, RepoReport};
use kopier::phases::detect;
use kopier::phases::orchestrator::SyncSettings;
use kopier::repository::VersionControl;
use kopier::review::{PullRequest, PullRequestRef, ReviewHost};
use kopier::workspace::copy_tree;

/// Version control backed by local fixture directories, one per repository.
#[derive(Default)]
struct FixtureVcs {
    fixtures: HashMap<String, PathBuf>,
    panic_on: Option<String>,
    baselines: Mutex<HashMap<PathBuf, MemoryFS>>,
    owners: Mutex<HashMap<PathBuf, String>>,
    clones: Mutex<Vec<PathBuf>>,
    commits: Mutex<Vec<String>>,
    pushes: Mutex<Vec<(String, String)>>,
}

impl FixtureVcs {
    fn with_fixture(mut self, repo: &str, path: &Path) -> Self {
        self.fixtures.insert(repo.to_string(), path.to_path_buf());
        self
    }

    fn owner(&self, worktree: &Path) -> String {
        self.owners
            .lock()
            .unwrap()
            .get(worktree)
            .cloned()
            .unwrap_or_default()
    }
}

impl VersionControl for FixtureVcs {
    fn clone_repository(&self, repo: &RepoSlug, target: &Path, deadline: &Deadline) -> Result<()> {
        deadline.check("git clone")?;
        let name = repo.to_string();
        if self.panic_on.as_deref() == Some(name.as_str()) {
            panic!("fixture clone exploded for {}", name);
        }
        self.clones.lock().unwrap().push(target.to_path_buf());
        let source = self.fixtures.get(&name).ok_or_else(|| Error::GitCommand {
            command: "git clone".to_string(),
            repository: name.clone(),
            stderr: "repository not found".to_string(),
        })?;
        copy_tree(source, target)?;
        self.baselines
            .lock()
            .unwrap()
            .insert(target.to_path_buf(), MemoryFS::load_dir(target)?);
        self.owners
            .lock()
            .unwrap()
            .insert(target.to_path_buf(), name);
        Ok(())
    }

    fn current_branch(&self, _worktree: &Path, _deadline: &Deadline) -> Result<String> {
        Ok("main".to_string())
    }

    fn create_branch(&self, _worktree: &Path, _branch: &str, deadline: &Deadline) -> Result<()> {
        deadline.check("git checkout")
    }

    fn status(&self, worktree: &Path, _deadline: &Deadline) -> Result<ChangeSet> {
        let baselines = self.baselines.lock().unwrap();
        let baseline = baselines.get(worktree).ok_or_else(|| Error::ChangeDetection {
            message: "no baseline".to_string(),
        })?;
        detect::snapshot_diff(baseline, worktree)
    }

    fn commit_all(
        &self,
        worktree: &Path,
        _message: &str,
        _author: &Author,
        _deadline: &Deadline,
    ) -> Result<()> {
        self.commits.lock().unwrap().push(self.owner(worktree));
        Ok(())
    }

    fn push(&self, worktree: &Path, branch: &str, _deadline: &Deadline) -> Result<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((self.owner(worktree), branch.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHost {
    opened: Mutex<Vec<PullRequest>>,
}

impl ReviewHost for RecordingHost {
    fn open_pull_request(
        &self,
        request: &PullRequest,
        _deadline: &Deadline,
    ) -> Result<PullRequestRef> {
        let mut opened = self.opened.lock().unwrap();
        opened.push(request.clone());
        Ok(PullRequestRef {
            number: opened.len() as u64,
            url: format!(
                "https://github.com/{}/pull/{}",
                request.repository,
                opened.len()
            ),
        })
    }
}

fn settings(templates: &Path, dry_run: bool) -> SyncSettings {
    SyncSettings {
        templates_root: templates.to_path_buf(),
        branch: "kopier-1700000000".to_string(),
        commit_message: "ci: Update kopier".to_string(),
        author: Author::default(),
        pull_request: PullRequestTemplate::default(),
        dry_run,
    }
}

fn slugs(names: &[&str]) -> Vec<RepoSlug> {
    names.iter().map(|n| n.parse().unwrap()).collect()
}

fn repo_dir(parent: &TempDir, name: &str, service_config: &str) -> PathBuf {
    let dir = parent.child(name);
    dir.child("service-config.yaml")
        .write_str(service_config)
        .unwrap();
    dir.path().to_path_buf()
}

fn run(
    repos: &[RepoSlug],
    settings: &SyncSettings,
    vcs: &FixtureVcs,
    host: &RecordingHost,
    options: &FleetOptions,
) -> fleet::FleetReport {
    let done = Mutex::new(Vec::new());
    let on_done = |report: &RepoReport| done.lock().unwrap().push(report.repository.clone());
    let report = fleet::run(repos, settings, vcs, host, options, &on_done).unwrap();
    assert_eq!(done.lock().unwrap().len(), repos.len());
    report
}

#[test]
fn test_fleet_updates_repository_and_opens_pull_request() {
    let fixture = TestFixture::new()
        .with_template("web/README.md", "# {{.Title}}\n")
        .with_template("web/.github/workflows/ci.yml", "name: {{ serviceName }}\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "title: api\nserviceName: api-svc\ntype: web\n");

    let vcs = FixtureVcs::default().with_fixture("acme/api", &api);
    let host = RecordingHost::default();

    let report = run(
        &slugs(&["acme/api"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &host,
        &FleetOptions::default(),
    );

    assert_eq!(
        report.reports[0].outcome,
        RepoOutcome::Updated {
            changes: 2,
            pull_request: "https://github.com/acme/api/pull/1".to_string()
        }
    );
    assert_eq!(*vcs.commits.lock().unwrap(), vec!["acme/api".to_string()]);
    assert_eq!(
        *vcs.pushes.lock().unwrap(),
        vec![("acme/api".to_string(), "kopier-1700000000".to_string())]
    );
    let opened = host.opened.lock().unwrap();
    assert_eq!(opened[0].base, "main");
    assert_eq!(opened[0].title, "Update Kopier files");
}

#[test]
fn test_fleet_empty_template_set_commits_nothing() {
    let fixture = TestFixture::new().with_template_dir("web");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "title: api\ntype: web\n");

    let vcs = FixtureVcs::default().with_fixture("acme/api", &api);
    let host = RecordingHost::default();

    let report = run(
        &slugs(&["acme/api"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &host,
        &FleetOptions::default(),
    );

    assert_eq!(report.reports[0].outcome, RepoOutcome::Unchanged);
    assert!(vcs.commits.lock().unwrap().is_empty());
    assert!(vcs.pushes.lock().unwrap().is_empty());
    assert!(host.opened.lock().unwrap().is_empty());
}

#[test]
fn test_fleet_up_to_date_repository_is_unchanged() {
    let fixture = TestFixture::new().with_template("web/README.md", "# {{.Title}}\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "title: api\ntype: web\n");
    fs::write(api.join("README.md"), "# api\n").unwrap();

    let vcs = FixtureVcs::default().with_fixture("acme/api", &api);
    let report = run(
        &slugs(&["acme/api"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &RecordingHost::default(),
        &FleetOptions::default(),
    );

    assert_eq!(report.reports[0].outcome, RepoOutcome::Unchanged);
    assert!(vcs.commits.lock().unwrap().is_empty());
}

#[test]
fn test_fleet_failure_does_not_stop_other_repositories() {
    let fixture = TestFixture::new().with_template("web/ci.yml", "ci: {{.Title}}\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "title: api\ntype: web\n");
    let web = repo_dir(&repos, "web", "title: web\ntype: web\n");
    let broken = repo_dir(&repos, "broken", "title: broken\n");

    let vcs = FixtureVcs::default()
        .with_fixture("acme/api", &api)
        .with_fixture("acme/broken", &broken)
        .with_fixture("acme/web", &web);
    let host = RecordingHost::default();

    let report = run(
        &slugs(&["acme/api", "acme/missing", "acme/broken", "acme/web"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &host,
        &FleetOptions {
            jobs: Some(2),
            ..FleetOptions::default()
        },
    );

    let names: Vec<String> = report
        .reports
        .iter()
        .map(|r| r.repository.to_string())
        .collect();
    assert_eq!(names, vec!["acme/api", "acme/missing", "acme/broken", "acme/web"]);

    assert!(matches!(report.reports[0].outcome, RepoOutcome::Updated { .. }));
    match &report.reports[1].outcome {
        RepoOutcome::Failed { reason } => assert!(reason.contains("repository not found")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    match &report.reports[2].outcome {
        RepoOutcome::Failed { reason } => assert!(reason.contains("repository type not set")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(matches!(report.reports[3].outcome, RepoOutcome::Updated { .. }));

    assert_eq!(report.updated(), 2);
    assert_eq!(report.failed(), 2);
    assert_eq!(host.opened.lock().unwrap().len(), 2);
}

#[test]
fn test_fleet_panic_is_reported_as_failure() {
    let fixture = TestFixture::new().with_template("web/ci.yml", "ci\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "type: web\n");

    let mut vcs = FixtureVcs::default().with_fixture("acme/api", &api);
    vcs.panic_on = Some("acme/boom".to_string());

    let report = run(
        &slugs(&["acme/boom", "acme/api"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &RecordingHost::default(),
        &FleetOptions::default(),
    );

    match &report.reports[0].outcome {
        RepoOutcome::Failed { reason } => assert!(reason.contains("fixture clone exploded")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(matches!(report.reports[1].outcome, RepoOutcome::Updated { .. }));
}

#[test]
fn test_fleet_fail_fast_cancels_remaining_repositories() {
    let fixture = TestFixture::new().with_template("web/ci.yml", "ci\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "type: web\n");
    let web = repo_dir(&repos, "web", "type: web\n");

    let vcs = FixtureVcs::default()
        .with_fixture("acme/api", &api)
        .with_fixture("acme/web", &web);
    let host = RecordingHost::default();

    // A single worker runs the units in input order.
    let report = run(
        &slugs(&["acme/missing", "acme/api", "acme/web"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &host,
        &FleetOptions {
            jobs: Some(1),
            timeout: None,
            fail_fast: true,
        },
    );

    match &report.reports[0].outcome {
        RepoOutcome::Failed { reason } => assert!(reason.contains("repository not found")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    for later in &report.reports[1..] {
        match &later.outcome {
            RepoOutcome::Failed { reason } => assert!(reason.contains("Cancelled")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
    assert!(vcs.commits.lock().unwrap().is_empty());
    assert!(host.opened.lock().unwrap().is_empty());
}

#[test]
fn test_fleet_dry_run_reports_would_update() {
    let fixture = TestFixture::new().with_template("web/ci.yml", "ci\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "type: web\n");

    let vcs = FixtureVcs::default().with_fixture("acme/api", &api);
    let host = RecordingHost::default();

    let report = run(
        &slugs(&["acme/api"]),
        &settings(&fixture.templates_path(), true),
        &vcs,
        &host,
        &FleetOptions::default(),
    );

    assert_eq!(report.reports[0].outcome, RepoOutcome::WouldUpdate { changes: 1 });
    assert!(vcs.pushes.lock().unwrap().is_empty());
    assert!(host.opened.lock().unwrap().is_empty());
}

#[test]
fn test_fleet_expired_deadline_fails_unit() {
    let fixture = TestFixture::new().with_template("web/ci.yml", "ci\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "type: web\n");

    let vcs = FixtureVcs::default().with_fixture("acme/api", &api);
    let report = run(
        &slugs(&["acme/api"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &RecordingHost::default(),
        &FleetOptions {
            jobs: None,
            timeout: Some(Duration::ZERO),
            fail_fast: false,
        },
    );

    match &report.reports[0].outcome {
        RepoOutcome::Failed { reason } => assert!(reason.contains("Timed out")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_fleet_removes_checkouts_on_success_and_failure() {
    let fixture = TestFixture::new().with_template("web/ci.yml", "ci\n");
    let repos = TempDir::new().unwrap();
    let api = repo_dir(&repos, "api", "type: web\n");
    let broken = repo_dir(&repos, "broken", "title: no type\n");

    let vcs = FixtureVcs::default()
        .with_fixture("acme/api", &api)
        .with_fixture("acme/broken", &broken);

    run(
        &slugs(&["acme/api", "acme/broken"]),
        &settings(&fixture.templates_path(), false),
        &vcs,
        &RecordingHost::default(),
        &FleetOptions::default(),
    );

    let clones = vcs.clones.lock().unwrap();
    assert_eq!(clones.len(), 2);
    for clone in clones.iter() {
        assert!(!clone.exists(), "{} was not removed", clone.display());
    }
}
