//! Run command handler
//!
//! Handles `betabuild run`, the long-running change-detection loop.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::build::{self, BuildSupervisor};
use crate::config::BetabuildConfig;
use crate::daemon::{CycleOutcome, Daemon};

/// Start the daemon. With `once` a single poll cycle runs and the command
/// returns; an unsuccessful cycle is then reported as an error so cron
/// style callers see a non-zero exit.
pub fn handle_run_command(config: &BetabuildConfig, once: bool) -> Result<()> {
    let toolchain = build::toolchain_version(&config.build.version_command, Path::new("."))
        .context("toolchain is not usable")?;
    info!(toolchain = %toolchain, "toolchain found");

    let supervisor = BuildSupervisor::new(config.build_settings(false), config.command_action());
    info!(
        repository = %config.repository.url,
        checkout = %config.repository.checkout.display(),
        output = %config.output.dir.display(),
        workers = supervisor.worker_count(),
        "starting build daemon"
    );

    let mut daemon = Daemon::new(config.git_repo(), supervisor, config.daemon_options());

    if !once {
        return daemon.run();
    }

    match daemon.run_once()? {
        CycleOutcome::PullFailed(e) => Err(e.context("error update")),
        CycleOutcome::InspectFailed(e) | CycleOutcome::BuildFailed(e) => Err(e),
        CycleOutcome::Unchanged => {
            info!("nothing to do");
            Ok(())
        }
        CycleOutcome::Built(_) => Ok(()),
    }
}
