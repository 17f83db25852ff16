//! Status command handler
//!
//! Handles `betabuild status`: what was built last, what is checked out, and
//! which run directories exist in the publish directory.

use anyhow::Result;
use colored::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::build::CHECKSUM_FILE;
use crate::config::BetabuildConfig;
use crate::marker;
use crate::repo::SourceRepo;
use crate::ui;

#[derive(Debug, Serialize)]
pub struct Status {
    pub repository: String,
    pub checkout: PathBuf,
    pub checkout_exists: bool,
    pub head_commit: Option<String>,
    pub head_version: Option<String>,
    pub marker: String,
    pub up_to_date: bool,
    pub runs: Vec<RunDir>,
}

#[derive(Debug, Serialize)]
pub struct RunDir {
    pub version: String,
    pub path: PathBuf,
    pub artifacts: usize,
    pub has_checksums: bool,
    #[serde(skip)]
    modified: Option<SystemTime>,
}

/// Collect the daemon's current state without touching the network.
pub fn collect_status(config: &BetabuildConfig) -> Result<Status> {
    let repo = config.git_repo();
    let checkout_exists = repo.exists();
    let head_commit = checkout_exists.then(|| repo.commit_id().ok()).flatten();
    let head_version = checkout_exists.then(|| repo.version_tag().ok()).flatten();
    let marker = marker::read_marker(&config.state.marker)?;
    let up_to_date = head_commit.as_deref() == Some(marker.as_str());

    Ok(Status {
        repository: config.repository.url.clone(),
        checkout: config.repository.checkout.clone(),
        checkout_exists,
        head_commit,
        head_version,
        marker,
        up_to_date,
        runs: list_runs(&config.output.dir, &config.output.project),
    })
}

/// Run directories under `base`, newest first.
pub fn list_runs(base: &Path, project: &str) -> Vec<RunDir> {
    let prefix = format!("{}-", project);
    let Ok(entries) = fs::read_dir(base) else {
        return Vec::new();
    };

    let mut runs: Vec<RunDir> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let version = name.strip_prefix(&prefix)?.to_string();
            let path = e.path();
            let files: Vec<String> = fs::read_dir(&path)
                .map(|dir| {
                    dir.filter_map(|f| f.ok())
                        .map(|f| f.file_name().to_string_lossy().to_string())
                        .collect()
                })
                .unwrap_or_default();
            Some(RunDir {
                version,
                artifacts: files.iter().filter(|f| f.as_str() != CHECKSUM_FILE).count(),
                has_checksums: files.iter().any(|f| f == CHECKSUM_FILE),
                modified: e.metadata().and_then(|m| m.modified()).ok(),
                path,
            })
        })
        .collect();

    runs.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.version.cmp(&b.version)));
    runs
}

pub fn handle_status_command(config: &BetabuildConfig, json: bool) -> Result<()> {
    let status = collect_status(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{} {}", "📡".cyan(), "Build Daemon Status".bold());
    println!("{}", "─".repeat(50).dimmed());
    println!("Repository:  {}", status.repository.cyan());
    println!("Checkout:    {}", status.checkout.display());

    if status.checkout_exists {
        println!(
            "HEAD:        {} ({})",
            status.head_commit.as_deref().unwrap_or("unknown").yellow(),
            status.head_version.as_deref().unwrap_or("no version")
        );
    } else {
        println!("HEAD:        {}", "not cloned yet".yellow());
    }

    if status.marker.is_empty() {
        println!("Last built:  {}", "nothing recorded".dimmed());
    } else {
        println!("Last built:  {}", status.marker.yellow());
    }

    if status.up_to_date {
        println!("{} Checkout is built", "✓".green());
    } else if status.checkout_exists {
        println!("{} Checkout has not been built yet", "!".yellow());
    }

    println!();
    if status.runs.is_empty() {
        println!("{} No runs in {}", "!".yellow(), config.output.dir.display());
        return Ok(());
    }

    let mut table = ui::Table::new(&["Version", "Artifacts", "Checksums"]);
    for run in &status.runs {
        table.add_row(vec![
            run.version.green().to_string(),
            run.artifacts.to_string(),
            if run.has_checksums {
                "✓".green().to_string()
            } else {
                "-".dimmed().to_string()
            },
        ]);
    }
    table.print();
    Ok(())
}
