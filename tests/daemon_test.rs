//! End-to-end tests for the change-detection loop against real git
//! repositories created in temporary directories.

use betabuild::build::{ActionError, BuildJob, BuildSettings, BuildSupervisor};
use betabuild::cancel::CancelToken;
use betabuild::daemon::{CycleOutcome, Daemon, DaemonOptions, MarkerPolicy};
use betabuild::marker;
use betabuild::repo::{GitRepo, SourceRepo};
use betabuild::target::BuildTarget;
use git2::{Oid, Repository, Signature};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn commit_file(repo: &Repository, name: &str, content: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    fs::write(workdir.join(name), content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let sig = Signature::now("Beta Builder", "beta@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &parents)
        .unwrap()
}

fn write_artifact(job: &BuildJob<'_>, _cancel: &CancelToken) -> Result<(), ActionError> {
    let source = fs::read_to_string(job.source_dir.join("main.go"))?;
    fs::write(&job.output_path, source)?;
    Ok(())
}

struct Fixture {
    _upstream_dir: tempfile::TempDir,
    upstream: Repository,
    work: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let upstream_dir = tempfile::tempdir().unwrap();
        let upstream = Repository::init(upstream_dir.path()).unwrap();
        let first = commit_file(&upstream, "main.go", "package main // 1\n");
        upstream
            .tag_lightweight("v0.9.0", &upstream.find_object(first, None).unwrap(), false)
            .unwrap();
        Self {
            _upstream_dir: upstream_dir,
            upstream,
            work: tempfile::tempdir().unwrap(),
        }
    }

    fn marker_path(&self) -> std::path::PathBuf {
        self.work.path().join("state").join("commit.current")
    }

    fn output(&self) -> std::path::PathBuf {
        self.work.path().join("www")
    }

    fn daemon(&self) -> Daemon<GitRepo, fn(&BuildJob<'_>, &CancelToken) -> Result<(), ActionError>> {
        let url = self.upstream.workdir().unwrap().to_string_lossy().to_string();
        let repo = GitRepo::new(url, self.work.path().join("restic.git"));
        let settings = BuildSettings {
            project: "restic".to_string(),
            output_dir: self.output(),
            workers: Some(2),
            checksums: true,
            show_progress: false,
        };
        let action: fn(&BuildJob<'_>, &CancelToken) -> Result<(), ActionError> = write_artifact;
        let supervisor = BuildSupervisor::new(settings, action).with_targets(vec![
            BuildTarget::new("linux", "amd64"),
            BuildTarget::new("windows", "386"),
        ]);
        let options = DaemonOptions {
            marker_path: self.marker_path(),
            poll_interval: Duration::from_secs(2),
            retry_delay: Duration::from_secs(1),
            marker_policy: MarkerPolicy::Advance,
        };
        Daemon::new(repo, supervisor, options)
    }
}

#[test]
fn test_first_cycle_clones_and_builds() {
    let fx = Fixture::new();
    let mut daemon = fx.daemon();

    let outcome = daemon.run_once().unwrap();
    let report = match outcome {
        CycleOutcome::Built(report) => report,
        other => panic!("expected a build, got {:?}", other),
    };

    assert!(daemon.repo().exists());
    assert!(report.version.starts_with("v0.9.0-0-g"));
    let binary = report
        .output_dir
        .join(format!("restic_{}_windows_386.exe", report.version));
    assert_eq!(fs::read_to_string(binary).unwrap(), "package main // 1\n");

    let head = daemon.repo().commit_id().unwrap();
    assert_eq!(marker::read_marker(&fx.marker_path()).unwrap(), head);
}

#[test]
fn test_restart_skips_built_commit_and_picks_up_new_one() {
    let fx = Fixture::new();
    fx.daemon().run_once().unwrap();

    // same commit after a restart: nothing to do
    let mut restarted = fx.daemon();
    let outcome = restarted.run_once().unwrap();
    assert!(matches!(outcome, CycleOutcome::Unchanged), "{:?}", outcome);
    assert_eq!(fs::read_dir(fx.output()).unwrap().count(), 1);

    let second = commit_file(&fx.upstream, "main.go", "package main // 2\n");
    let outcome = restarted.poll_once();
    let report = match outcome {
        CycleOutcome::Built(report) => report,
        other => panic!("expected a build, got {:?}", other),
    };
    assert!(report.version.starts_with("v0.9.0-1-g"));
    assert_eq!(restarted.last_commit(), second.to_string());
    assert_eq!(fs::read_dir(fx.output()).unwrap().count(), 2);
    assert_eq!(
        marker::read_marker(&fx.marker_path()).unwrap(),
        second.to_string()
    );
}

#[test]
fn test_unreachable_upstream_is_fatal_at_startup() {
    let fx = Fixture::new();
    let missing = fx.work.path().join("no-such-upstream");
    let repo = GitRepo::new(missing.to_string_lossy(), fx.work.path().join("restic.git"));
    let settings = BuildSettings {
        project: "restic".to_string(),
        output_dir: fx.output(),
        workers: Some(1),
        checksums: false,
        show_progress: false,
    };
    let mut daemon = Daemon::new(
        repo,
        BuildSupervisor::new(settings, write_artifact),
        DaemonOptions {
            marker_path: fx.marker_path(),
            poll_interval: Duration::from_secs(2),
            retry_delay: Duration::from_secs(1),
            marker_policy: MarkerPolicy::Advance,
        },
    );

    let err = daemon.run().unwrap_err();
    assert!(format!("{:#}", err).contains("clone error"));
    assert!(!fx.marker_path().exists());
}
