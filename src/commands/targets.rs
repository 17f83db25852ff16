//! Targets command handler
//!
//! Handles `betabuild targets`, which prints the build matrix together with
//! the artifact each target produces.

use colored::*;

use crate::build;
use crate::config::BetabuildConfig;
use crate::target;
use crate::ui;

const SAMPLE_VERSION: &str = "<version>";

/// Print the build matrix as a table.
pub fn handle_targets_command(config: &BetabuildConfig, version: Option<&str>) {
    let version = version.unwrap_or(SAMPLE_VERSION);
    println!(
        "{} {}",
        "🎯".cyan(),
        "Cross-Compilation Targets".bold()
    );
    println!("{}", "─".repeat(50).dimmed());

    let mut table = ui::Table::new(&["OS", "Arch", "Artifact"]);
    for t in target::targets() {
        table.add_row(vec![
            t.os.green().to_string(),
            t.arch.cyan().to_string(),
            t.artifact_name(&config.output.project, version),
        ]);
    }
    table.print();

    println!();
    println!(
        "{} {} targets, published under {}",
        "ℹ".blue(),
        table.len(),
        build::run_dir(&config.output.dir, &config.output.project, version)
            .display()
            .to_string()
            .cyan()
    );
}
