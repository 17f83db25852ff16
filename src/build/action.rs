//! The per-target build step.
//!
//! Workers know nothing about compilers: they hand a [`BuildJob`] to a
//! [`BuildAction`] and observe success or failure. [`CommandAction`] is the
//! production implementation and runs an external command whose stdout and
//! stderr are streamed through to the daemon's own.

use super::error::ActionError;
use crate::cancel::CancelToken;
use crate::target::BuildTarget;
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything a build action needs to produce one artifact.
#[derive(Debug, Clone)]
pub struct BuildJob<'a> {
    pub target: BuildTarget,
    pub version: &'a str,
    pub source_dir: &'a Path,
    pub output_path: PathBuf,
}

pub trait BuildAction: Sync {
    /// Build `job.target`, writing exactly one file at `job.output_path`.
    ///
    /// Implementations that block for a long time should watch `cancel`
    /// and return [`ActionError::Cancelled`] once it fires.
    fn build(&self, job: &BuildJob<'_>, cancel: &CancelToken) -> Result<(), ActionError>;
}

impl<F> BuildAction for F
where
    F: Fn(&BuildJob<'_>, &CancelToken) -> Result<(), ActionError> + Sync,
{
    fn build(&self, job: &BuildJob<'_>, cancel: &CancelToken) -> Result<(), ActionError> {
        self(job, cancel)
    }
}

/// Runs a configured command line once per target.
///
/// Arguments and environment values may contain the placeholders
/// `{output}`, `{os}`, `{arch}`, `{version}` and `{source}`.
#[derive(Debug, Clone)]
pub struct CommandAction {
    command: Vec<String>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
}

impl CommandAction {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line that would run for `job`.
    pub fn expand(&self, job: &BuildJob<'_>) -> Vec<String> {
        self.command.iter().map(|arg| substitute(arg, job)).collect()
    }

    fn spawn(&self, job: &BuildJob<'_>) -> Result<Child, ActionError> {
        let args = self.expand(job);
        let Some((program, rest)) = args.split_first() else {
            return Err(ActionError::Other("build command is empty".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .current_dir(job.source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        for (key, value) in &self.env {
            cmd.env(key, substitute(value, job));
        }
        Ok(cmd.spawn()?)
    }
}

impl BuildAction for CommandAction {
    fn build(&self, job: &BuildJob<'_>, cancel: &CancelToken) -> Result<(), ActionError> {
        let mut child = self.spawn(job)?;
        let started = Instant::now();

        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => return Err(ActionError::ExitStatus(status.code())),
                Ok(None) => {}
                Err(e) => {
                    stop(&mut child);
                    return Err(ActionError::Other(format!(
                        "failed to wait for build command: {}",
                        e
                    )));
                }
            }

            if cancel.is_cancelled() {
                stop(&mut child);
                return Err(ActionError::Cancelled);
            }

            if let Some(limit) = self.timeout
                && started.elapsed() >= limit
            {
                stop(&mut child);
                return Err(ActionError::TimedOut(limit));
            }

            cancel.wait_timeout(POLL_INTERVAL);
        }
    }
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn substitute(template: &str, job: &BuildJob<'_>) -> String {
    template
        .replace("{output}", &job.output_path.to_string_lossy())
        .replace("{os}", job.target.os)
        .replace("{arch}", job.target.arch)
        .replace("{version}", job.version)
        .replace("{source}", &job.source_dir.to_string_lossy())
}

/// Run the toolchain's version command and return its trimmed output.
///
/// A daemon that cannot even ask its compiler for a version has no chance
/// of building anything, so callers treat an error here as fatal.
pub fn toolchain_version(command: &[String], dir: &Path) -> Result<String> {
    let Some((program, args)) = command.split_first() else {
        bail!("toolchain version command is empty");
    };

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("Failed to execute '{}'", command.join(" ")))?;

    if !output.status.success() {
        bail!(
            "'{}' failed ({}): {}",
            command.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
