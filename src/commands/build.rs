//! Build command handler
//!
//! Handles `betabuild build`: compile the matrix once for whatever is
//! currently checked out, without pulling and without touching the marker.

use anyhow::{Result, bail};
use colored::*;
use std::time::Instant;

use crate::build::{BuildError, BuildSupervisor};
use crate::config::BetabuildConfig;
use crate::repo::SourceRepo;

pub fn handle_build_command(config: &BetabuildConfig, version: Option<&str>) -> Result<()> {
    let repo = config.git_repo();
    if !repo.exists() {
        bail!(
            "No checkout at {} (run `betabuild run --once` to clone it)",
            repo.path().display()
        );
    }

    let version = match version {
        Some(v) => v.to_string(),
        None => repo.version_tag()?,
    };

    let supervisor = BuildSupervisor::new(config.build_settings(true), config.command_action());
    println!(
        "{} Compiling {} for {} targets ({} workers)",
        "🔨".yellow(),
        version.green(),
        supervisor.targets().len(),
        supervisor.worker_count()
    );

    let start = Instant::now();
    match supervisor.run(repo.path(), &version) {
        Ok(report) => {
            println!(
                "{} Built {} artifacts in {:.2}s",
                "✓".green(),
                report.artifacts.len(),
                start.elapsed().as_secs_f64()
            );
            println!("   {}", report.output_dir.display().to_string().cyan());
            Ok(())
        }
        Err(BuildError::JobsFailed {
            version,
            failures,
            skipped,
        }) => {
            println!("{} Build of {} failed", "x".red(), version.bold());
            for failure in &failures {
                println!("  - {}: {}", failure.target.to_string().red(), failure.error);
            }
            if !skipped.is_empty() {
                println!("  {} targets skipped", skipped.len().to_string().yellow());
            }
            bail!("{} of {} targets failed", failures.len(), supervisor.targets().len())
        }
        Err(e) => Err(e.into()),
    }
}
