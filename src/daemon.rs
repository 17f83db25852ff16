//! Change-detection loop.
//!
//! Polls upstream on a fixed interval and hands every new commit to the
//! build supervisor. The loop survives pull failures, setup errors and
//! failed builds; only startup errors (no checkout, unreadable marker) are
//! returned to the caller. It stops at the next iteration boundary once its
//! shutdown token is cancelled.

use crate::build::{BuildAction, BuildError, BuildReport, BuildSupervisor};
use crate::cancel::CancelToken;
use crate::marker;
use crate::repo::SourceRepo;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What to do with the commit marker when the build for a new commit fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerPolicy {
    /// Record the commit anyway; a failing commit is not retried.
    #[default]
    Advance,
    /// Keep the previous marker so the next cycle builds the commit again.
    RetryFailed,
}

#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub marker_path: PathBuf,
    pub poll_interval: Duration,
    /// Delay after a failed pull; shorter than `poll_interval`
    pub retry_delay: Duration,
    pub marker_policy: MarkerPolicy,
}

/// Result of one poll cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Synchronizing with upstream failed; the marker was left alone
    PullFailed(anyhow::Error),
    /// The checkout could not be inspected after a successful pull
    InspectFailed(anyhow::Error),
    /// Upstream has not moved since the last build
    Unchanged,
    Built(BuildReport),
    BuildFailed(anyhow::Error),
}

impl CycleOutcome {
    fn retry_soon(&self) -> bool {
        matches!(
            self,
            CycleOutcome::PullFailed(_) | CycleOutcome::InspectFailed(_)
        )
    }
}

pub struct Daemon<R, A> {
    repo: R,
    supervisor: BuildSupervisor<A>,
    options: DaemonOptions,
    shutdown: CancelToken,
    last_commit: String,
}

impl<R: SourceRepo, A: BuildAction> Daemon<R, A> {
    pub fn new(repo: R, supervisor: BuildSupervisor<A>, options: DaemonOptions) -> Self {
        Self {
            repo,
            supervisor,
            options,
            shutdown: CancelToken::new(),
            last_commit: String::new(),
        }
    }

    /// Use an externally owned shutdown token.
    pub fn with_shutdown(mut self, shutdown: CancelToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token that stops the loop (and any running build) when cancelled.
    pub fn shutdown_handle(&self) -> CancelToken {
        self.shutdown.clone()
    }

    pub fn last_commit(&self) -> &str {
        &self.last_commit
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Make sure a checkout exists and load the stored marker.
    ///
    /// Errors here are unrecoverable: the loop cannot do anything useful
    /// without a checkout or with an unreadable state file.
    pub fn start(&mut self) -> Result<()> {
        if !self.repo.exists() {
            self.repo
                .synchronize()
                .context("clone error")?;
        }
        self.last_commit = marker::read_marker(&self.options.marker_path)?;
        if self.last_commit.is_empty() {
            info!("no previous build recorded");
        } else {
            info!(commit = %self.last_commit, "last built commit");
        }
        Ok(())
    }

    /// Start, then poll until the shutdown token is cancelled.
    pub fn run(&mut self) -> Result<()> {
        self.start()?;
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let outcome = self.poll_once();
            let delay = if outcome.retry_soon() {
                self.options.retry_delay
            } else {
                self.options.poll_interval
            };
            debug!("next poll in {:?}", delay);
            if self.shutdown.wait_timeout(delay) {
                break;
            }
        }
        info!("shutting down");
        Ok(())
    }

    /// Start and run exactly one poll cycle.
    pub fn run_once(&mut self) -> Result<CycleOutcome> {
        self.start()?;
        Ok(self.poll_once())
    }

    /// Pull, compare, maybe build, and update the marker.
    pub fn poll_once(&mut self) -> CycleOutcome {
        if let Err(e) = self.repo.synchronize() {
            warn!("error update: {:#}", e);
            return CycleOutcome::PullFailed(e);
        }

        let commit = match self.repo.commit_id() {
            Ok(commit) => commit,
            Err(e) => {
                error!("cannot read checked out commit: {:#}", e);
                return CycleOutcome::InspectFailed(e);
            }
        };

        let outcome = if commit == self.last_commit {
            debug!(commit = %commit, "no new commits");
            CycleOutcome::Unchanged
        } else {
            info!(commit = %commit, previous = %self.last_commit, "new commit");
            self.build()
        };

        if self.should_advance(&outcome) {
            self.last_commit = commit;
            if let Err(e) = marker::write_marker(&self.options.marker_path, &self.last_commit) {
                error!("{:#}", e);
            }
        }
        outcome
    }

    fn build(&self) -> CycleOutcome {
        let version = match self.repo.version_tag() {
            Ok(version) => version,
            Err(e) => {
                error!("cannot determine version: {:#}", e);
                return CycleOutcome::BuildFailed(e);
            }
        };

        match self
            .supervisor
            .run_with_cancel(self.repo.path(), &version, &self.shutdown)
        {
            Ok(report) => {
                info!(
                    version = %report.version,
                    artifacts = report.artifacts.len(),
                    dir = %report.output_dir.display(),
                    "published"
                );
                CycleOutcome::Built(report)
            }
            Err(e) => {
                error!("{}", e);
                CycleOutcome::BuildFailed(e.into())
            }
        }
    }

    fn should_advance(&self, outcome: &CycleOutcome) -> bool {
        match outcome {
            CycleOutcome::BuildFailed(e) => {
                // an interrupted build says nothing about the commit
                let interrupted = matches!(
                    e.downcast_ref::<BuildError>(),
                    Some(BuildError::Cancelled { .. })
                );
                !interrupted && self.options.marker_policy == MarkerPolicy::Advance
            }
            CycleOutcome::PullFailed(_) | CycleOutcome::InspectFailed(_) => false,
            CycleOutcome::Unchanged | CycleOutcome::Built(_) => true,
        }
    }
}
