//! Doctor command handler
//!
//! Handles `betabuild doctor`, which checks everything the daemon needs
//! before it is left running unattended.

use anyhow::{Result, bail};
use colored::*;
use std::fs;
use std::path::Path;

use crate::build;
use crate::config::BetabuildConfig;
use crate::repo::SourceRepo;

/// Run the `betabuild doctor` command
pub fn run_doctor(config: &BetabuildConfig) -> Result<()> {
    println!("{} Running Build Doctor...", "🚑".red());
    println!("-------------------------------");
    let mut problems = 0;

    print!("Checking OS... ");
    println!(
        "{} ({})",
        std::env::consts::OS.green(),
        std::env::consts::ARCH.cyan()
    );

    // git2 does the fetching, the CLI is only needed by most build scripts
    print!("Checking Git... ");
    if std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok()
    {
        println!("{}", "Found".green());
    } else {
        println!("{}", "Not Found (Optional)".yellow());
    }

    print!("Checking toolchain... ");
    match build::toolchain_version(&config.build.version_command, Path::new(".")) {
        Ok(version) => println!("{} ({})", "Found".green(), version.dimmed()),
        Err(e) => {
            problems += 1;
            println!("{} ({:#})", "Not Usable".red(), e);
        }
    }

    print!("Checking output directory... ");
    match check_writable(&config.output.dir) {
        Ok(()) => println!("{} ({})", "Writable".green(), config.output.dir.display()),
        Err(e) => {
            problems += 1;
            println!("{} ({})", "Not Writable".red(), e);
        }
    }

    print!("Checking checkout... ");
    let repo = config.git_repo();
    if !repo.exists() {
        println!("{}", "Missing (cloned on first run)".yellow());
    } else {
        match repo.version_tag() {
            Ok(version) => println!("{} ({})", "Found".green(), version),
            Err(e) => {
                problems += 1;
                println!("{} ({:#})", "Broken".red(), e);
            }
        }
    }

    println!();
    if problems > 0 {
        bail!("{} problem(s) found", problems);
    }
    println!("{} All checks passed", "✓".green());
    Ok(())
}

/// Create `dir` if needed and prove a file can be written into it.
pub fn check_writable(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(".betabuild-doctor");
    fs::write(&probe, b"ok")?;
    fs::remove_file(&probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_writable_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("www").join("beta");
        check_writable(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_check_writable_fails_below_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(check_writable(&file.join("sub")).is_err());
    }
}
