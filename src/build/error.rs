//! Error types for build actions and supervised runs.

use crate::target::BuildTarget;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Why a single build action did not produce its artifact.
#[derive(Debug)]
pub enum ActionError {
    /// The external command could not be started
    Spawn(std::io::Error),
    /// The command ran and exited unsuccessfully (`None` if killed by a signal)
    ExitStatus(Option<i32>),
    /// The command exceeded the per-job timeout and was killed
    TimedOut(Duration),
    /// The run was cancelled while the command was executing
    Cancelled,
    /// Any other failure reported by a custom action
    Other(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::Spawn(e) => write!(f, "failed to start build command: {}", e),
            ActionError::ExitStatus(Some(code)) => write!(f, "exit status {}", code),
            ActionError::ExitStatus(None) => write!(f, "terminated by signal"),
            ActionError::TimedOut(limit) => write!(f, "timed out after {:.0?}", limit),
            ActionError::Cancelled => write!(f, "cancelled"),
            ActionError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ActionError {
    fn from(e: std::io::Error) -> Self {
        ActionError::Spawn(e)
    }
}

/// A failed job, identified by target and version.
#[derive(Debug)]
pub struct JobFailure {
    pub target: BuildTarget,
    pub version: String,
    pub error: ActionError,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compiling {} for {} failed: {}",
            self.version, self.target, self.error
        )
    }
}

/// Error type for a whole build run
#[derive(Debug)]
pub enum BuildError {
    /// The version tag cannot be used as a directory name
    InvalidVersion(String),
    /// The run's output directory could not be created; no job was started
    CreateOutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// One or more jobs failed. Targets that were never started are listed
    /// in `skipped`.
    JobsFailed {
        version: String,
        failures: Vec<JobFailure>,
        skipped: Vec<BuildTarget>,
    },
    /// The run was cancelled from outside before every job finished
    Cancelled {
        version: String,
        skipped: Vec<BuildTarget>,
    },
}

impl BuildError {
    /// Targets whose build action failed.
    pub fn failed_targets(&self) -> Vec<BuildTarget> {
        match self {
            BuildError::JobsFailed { failures, .. } => {
                failures.iter().map(|failure| failure.target).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidVersion(version) => {
                write!(f, "version tag {:?} is not a valid directory name", version)
            }
            BuildError::CreateOutputDir { path, source } => {
                write!(f, "MkdirAll({}) failed: {}", path.display(), source)
            }
            BuildError::JobsFailed {
                version,
                failures,
                skipped,
            } => {
                write!(
                    f,
                    "{} of the builds for {} failed",
                    failures.len(),
                    version
                )?;
                for failure in failures {
                    write!(f, "\n  {}: {}", failure.target, failure.error)?;
                }
                if !skipped.is_empty() {
                    let names: Vec<String> = skipped.iter().map(|t| t.to_string()).collect();
                    write!(f, "\n  skipped: {}", names.join(", "))?;
                }
                Ok(())
            }
            BuildError::Cancelled { version, skipped } => write!(
                f,
                "build of {} cancelled ({} targets not built)",
                version,
                skipped.len()
            ),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::CreateOutputDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_failed_names_each_target() {
        let err = BuildError::JobsFailed {
            version: "v1.0.0".to_string(),
            failures: vec![JobFailure {
                target: BuildTarget::new("linux", "arm"),
                version: "v1.0.0".to_string(),
                error: ActionError::ExitStatus(Some(2)),
            }],
            skipped: vec![BuildTarget::new("windows", "amd64")],
        };
        let msg = err.to_string();
        assert!(msg.contains("linux/arm: exit status 2"));
        assert!(msg.contains("skipped: windows/amd64"));
        assert_eq!(err.failed_targets(), vec![BuildTarget::new("linux", "arm")]);
    }

    #[test]
    fn test_job_failure_mentions_version() {
        let failure = JobFailure {
            target: BuildTarget::new("darwin", "amd64"),
            version: "v0.9.1-3-g1234567".to_string(),
            error: ActionError::Cancelled,
        };
        assert_eq!(
            failure.to_string(),
            "compiling v0.9.1-3-g1234567 for darwin/amd64 failed: cancelled"
        );
    }
}
