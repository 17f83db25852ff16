//! Configuration file parsing (`betabuild.toml`).
//!
//! Every section is optional; missing values fall back to the defaults the
//! daemon was originally run with (restic's beta build server).

use crate::build::{BuildSettings, CommandAction};
use crate::daemon::{DaemonOptions, MarkerPolicy};
use crate::repo::GitRepo;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "betabuild.toml";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BetabuildConfig {
    pub repository: RepositoryConfig,
    pub output: OutputConfig,
    pub state: StateConfig,
    pub schedule: ScheduleConfig,
    pub build: BuildConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: String,
    pub checkout: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: "https://github.com/restic/restic".to_string(),
            checkout: PathBuf::from("restic.git"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Prefix for run directories and artifact names
    pub project: String,
    pub checksums: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/www/beta.restic.net"),
            project: "restic".to_string(),
            checksums: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    pub marker: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            marker: PathBuf::from("commit.current"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub poll_interval_secs: u64,
    pub retry_delay_secs: u64,
    pub marker_policy: MarkerPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 180,
            retry_delay_secs: 60,
            marker_policy: MarkerPolicy::Advance,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BuildConfig {
    /// Command template run once per target
    pub command: Vec<String>,
    /// Command whose success proves the toolchain is usable
    pub version_command: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// 0 disables the per-job timeout
    pub job_timeout_secs: u64,
    pub workers: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let command = [
            "go", "run", "build.go", "-o", "{output}", "--goos", "{os}", "--goarch", "{arch}",
        ];
        let mut env = BTreeMap::new();
        env.insert("CGO_ENABLED".to_string(), "0".to_string());
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
            version_command: vec!["go".to_string(), "version".to_string()],
            env,
            job_timeout_secs: 3600,
            workers: None,
        }
    }
}

impl BetabuildConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `./betabuild.toml` and then
    /// `<config dir>/betabuild/config.toml` are tried, and defaults are used
    /// if neither exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for candidate in Self::search_paths() {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("betabuild").join("config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.build.command.is_empty() {
            bail!("[build] command must not be empty");
        }
        if self.build.version_command.is_empty() {
            bail!("[build] version_command must not be empty");
        }
        if self.output.project.is_empty() {
            bail!("[output] project must not be empty");
        }
        if self.schedule.poll_interval_secs == 0 {
            bail!("[schedule] poll_interval_secs must be greater than zero");
        }
        if self.schedule.retry_delay_secs >= self.schedule.poll_interval_secs {
            bail!(
                "[schedule] retry_delay_secs ({}) must be shorter than poll_interval_secs ({})",
                self.schedule.retry_delay_secs,
                self.schedule.poll_interval_secs
            );
        }
        if self.build.workers == Some(0) {
            bail!("[build] workers must be at least 1");
        }
        Ok(())
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        match self.build.job_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn git_repo(&self) -> GitRepo {
        GitRepo::new(&self.repository.url, &self.repository.checkout)
    }

    pub fn command_action(&self) -> CommandAction {
        CommandAction::new(self.build.command.clone())
            .with_env(self.build.env.clone())
            .with_timeout(self.job_timeout())
    }

    pub fn build_settings(&self, show_progress: bool) -> BuildSettings {
        BuildSettings {
            project: self.output.project.clone(),
            output_dir: self.output.dir.clone(),
            workers: self.build.workers,
            checksums: self.output.checksums,
            show_progress,
        }
    }

    pub fn daemon_options(&self) -> DaemonOptions {
        DaemonOptions {
            marker_path: self.state.marker.clone(),
            poll_interval: Duration::from_secs(self.schedule.poll_interval_secs),
            retry_delay: Duration::from_secs(self.schedule.retry_delay_secs),
            marker_policy: self.schedule.marker_policy,
        }
    }
}
