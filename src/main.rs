//! # betabuild CLI Entry Point
//!
//! This is the main executable for the `betabuild` command-line tool.
//! It parses CLI arguments using clap, loads `betabuild.toml`, applies
//! command-line overrides and routes commands to the appropriate handlers.
//!
//! ## Command Structure
//!
//! - **Daemon**: `run`
//! - **One-shot**: `build`, `targets`, `status`
//! - **Setup**: `doctor`, `completion`

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use betabuild::commands;
use betabuild::config::BetabuildConfig;
use betabuild::ui;

#[derive(Parser)]
#[command(name = "betabuild")]
#[command(about = "Continuous cross-compilation daemon", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (default: ./betabuild.toml)
    #[arg(long, global = true, env = "BETABUILD_CONFIG")]
    config: Option<PathBuf>,
    /// Upstream repository URL
    #[arg(long, global = true, env = "BETABUILD_URL")]
    url: Option<String>,
    /// Local checkout directory
    #[arg(long, global = true, env = "BETABUILD_CHECKOUT")]
    checkout: Option<PathBuf>,
    /// Directory that receives one sub-directory per version
    #[arg(long, global = true, env = "BETABUILD_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
    /// Number of parallel build jobs
    #[arg(long, global = true, env = "BETABUILD_WORKERS")]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the repository and build every new commit
    Run {
        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Build the current checkout once
    Build {
        /// Version tag to publish under (default: git describe)
        #[arg(long)]
        version: Option<String>,
    },
    /// List the cross-compilation targets
    Targets {
        /// Show artifact names for this version
        #[arg(long)]
        version: Option<String>,
    },
    /// Show the last built commit and published runs
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Check git, the toolchain and the output directory
    Doctor,
    /// Generate shell completions
    Completion { shell: Shell },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Some(Commands::Completion { shell }) = &cli.command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli)?;

    match &cli.command {
        Some(Commands::Run { once }) => commands::run::handle_run_command(&config, *once),
        Some(Commands::Build { version }) => {
            commands::build::handle_build_command(&config, version.as_deref())
        }
        Some(Commands::Targets { version }) => {
            commands::targets::handle_targets_command(&config, version.as_deref());
            Ok(())
        }
        Some(Commands::Status { json }) => commands::status::handle_status_command(&config, *json),
        Some(Commands::Doctor) => commands::doctor::run_doctor(&config),
        Some(Commands::Completion { .. }) => Ok(()),
        None => {
            print_dashboard(&config);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<BetabuildConfig> {
    let mut config = BetabuildConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.url {
        config.repository.url = url.clone();
    }
    if let Some(checkout) = &cli.checkout {
        config.repository.checkout = checkout.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(workers) = cli.workers {
        config.build.workers = Some(workers);
    }
    config.validate()?;
    Ok(config)
}

fn print_dashboard(config: &BetabuildConfig) {
    println!();
    println!("   {}", "betabuild".cyan().bold());
    println!(
        "   {}",
        "Continuous cross-compilation daemon".dimmed().italic()
    );
    println!("   {}", format!("v{}", env!("CARGO_PKG_VERSION")).green());
    println!();

    let mut table = ui::Table::new(&["Setting", "Value"]);
    table.add_row(vec![
        "Repository".bold().green().to_string(),
        config.repository.url.clone(),
    ]);
    table.add_row(vec![
        "Checkout".bold().yellow().to_string(),
        config.repository.checkout.display().to_string(),
    ]);
    table.add_row(vec![
        "Output".bold().blue().to_string(),
        config.output.dir.display().to_string(),
    ]);
    table.add_row(vec![
        "Poll".bold().magenta().to_string(),
        format!(
            "every {}s (retry after {}s)",
            config.schedule.poll_interval_secs, config.schedule.retry_delay_secs
        ),
    ]);
    table.add_row(vec![
        "Commands".bold().white().to_string(),
        format!(
            "{}, {}, {}, {}, {}",
            "run".cyan(),
            "build".cyan(),
            "targets".cyan(),
            "status".cyan(),
            "doctor".cyan()
        ),
    ]);

    table.print();
    println!();
    println!("   Run {} for detailed usage.", "betabuild --help".white().bold());
    println!();
}
