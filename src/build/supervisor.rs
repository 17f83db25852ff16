//! Build supervisor.
//!
//! One call to [`BuildSupervisor::run`] is one complete build of the matrix
//! for a single version: validate the version, create its run directory,
//! dispatch the targets to the worker pool and fold the outcomes into a
//! [`BuildReport`] or a [`BuildError`].

use super::action::BuildAction;
use super::error::BuildError;
use super::pool::{self, JobOutcome, RunContext};
use super::report::{self, Artifact, BuildReport};
use crate::cancel::CancelToken;
use crate::target::{self, BuildTarget};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

/// Settings for the build supervisor, resolved from configuration.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Artifact and run-directory prefix (e.g. `restic`)
    pub project: String,
    /// Base publish directory; each run gets its own subdirectory
    pub output_dir: PathBuf,
    /// Worker override; `None` uses the host's available parallelism
    pub workers: Option<usize>,
    /// Write a `SHA256SUMS` file after a successful run
    pub checksums: bool,
    /// Draw an interactive progress bar
    pub show_progress: bool,
}

/// Orchestrates one complete multi-target build run per call.
pub struct BuildSupervisor<A> {
    settings: BuildSettings,
    action: A,
    targets: Vec<BuildTarget>,
}

impl<A: BuildAction> BuildSupervisor<A> {
    pub fn new(settings: BuildSettings, action: A) -> Self {
        Self {
            settings,
            action,
            targets: target::targets().to_vec(),
        }
    }

    /// Replace the default matrix.
    pub fn with_targets(mut self, targets: Vec<BuildTarget>) -> Self {
        self.targets = targets;
        self
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    /// Directory that holds the artifacts of `version`.
    pub fn run_dir(&self, version: &str) -> PathBuf {
        run_dir(&self.settings.output_dir, &self.settings.project, version)
    }

    pub fn worker_count(&self) -> usize {
        self.settings
            .workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            })
    }

    /// Build every target for `version` from the checkout at `source_dir`.
    pub fn run(&self, source_dir: &Path, version: &str) -> Result<BuildReport, BuildError> {
        self.run_with_cancel(source_dir, version, &CancelToken::new())
    }

    /// Like [`run`](Self::run), but stops early once `shutdown` fires.
    pub fn run_with_cancel(
        &self,
        source_dir: &Path,
        version: &str,
        shutdown: &CancelToken,
    ) -> Result<BuildReport, BuildError> {
        validate_version(version)?;
        let start = Instant::now();
        info!(version, "compiling");

        let output_dir = self.run_dir(version);
        fs::create_dir_all(&output_dir).map_err(|source| BuildError::CreateOutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let workers = self.worker_count();
        let cancel = shutdown.child();
        let pb = self.progress_bar();
        let observer = |outcome: &JobOutcome| {
            match outcome {
                JobOutcome::Built(target) => pb.set_message(format!("{}", target)),
                JobOutcome::Failed(failure) => pb.println(format!("{} {}", "x".red(), failure)),
                JobOutcome::Skipped(_) => {}
            }
            pb.inc(1);
        };

        let ctx = RunContext {
            project: &self.settings.project,
            version,
            source_dir,
            output_dir: &output_dir,
        };
        let outcomes = pool::dispatch(&self.targets, workers, ctx, &self.action, &cancel, &observer);
        pb.finish_and_clear();

        let mut built = HashSet::new();
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                JobOutcome::Built(target) => {
                    built.insert(target);
                }
                JobOutcome::Failed(failure) => failures.push(failure),
                JobOutcome::Skipped(target) => skipped.push(target),
            }
        }

        if !failures.is_empty() {
            return Err(BuildError::JobsFailed {
                version: version.to_string(),
                failures,
                skipped,
            });
        }
        if !skipped.is_empty() {
            return Err(BuildError::Cancelled {
                version: version.to_string(),
                skipped,
            });
        }

        let mut artifacts: Vec<Artifact> = self
            .targets
            .iter()
            .filter(|target| built.contains(*target))
            .map(|target| Artifact {
                target: *target,
                path: output_dir.join(target.artifact_name(&self.settings.project, version)),
                sha256: None,
            })
            .collect();

        if self.settings.checksums
            && let Err(e) = report::write_checksums(&output_dir, &mut artifacts)
        {
            warn!(version, "checksums not written: {:#}", e);
        }

        let elapsed = start.elapsed();
        info!(version, "built version {} in {:.2?}", version, elapsed);

        Ok(BuildReport {
            version: version.to_string(),
            output_dir,
            workers,
            artifacts,
            elapsed,
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.targets.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Compiling...");
        pb
    }
}

/// `<base>/<project>-<version>`
pub fn run_dir(base: &Path, project: &str, version: &str) -> PathBuf {
    base.join(format!("{}-{}", project, version))
}

fn validate_version(version: &str) -> Result<(), BuildError> {
    let bad = version.is_empty()
        || version == "."
        || version == ".."
        || version.contains(['/', '\\', '\0']);
    if bad {
        Err(BuildError::InvalidVersion(version.to_string()))
    } else {
        Ok(())
    }
}
