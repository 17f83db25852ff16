//! Results of a successful run and the `SHA256SUMS` file written next to
//! its artifacts.

use crate::target::BuildTarget;
use anyhow::{Context, Result};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CHECKSUM_FILE: &str = "SHA256SUMS";

/// One file produced by a successful job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub target: BuildTarget,
    pub path: PathBuf,
    pub sha256: Option<String>,
}

/// Summary of a successful build run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub version: String,
    pub output_dir: PathBuf,
    pub workers: usize,
    pub artifacts: Vec<Artifact>,
    pub elapsed: Duration,
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash every artifact that exists on disk and write a `SHA256SUMS` file
/// next to them.
///
/// Artifacts missing from disk are left without a digest. Returns `None`
/// (and writes nothing) when no artifact exists.
pub fn write_checksums(output_dir: &Path, artifacts: &mut [Artifact]) -> Result<Option<PathBuf>> {
    artifacts
        .par_iter_mut()
        .filter(|artifact| artifact.path.is_file())
        .try_for_each(|artifact| -> Result<()> {
            artifact.sha256 = Some(sha256_file(&artifact.path)?);
            Ok(())
        })?;

    let mut lines: Vec<String> = artifacts
        .iter()
        .filter_map(|artifact| {
            let digest = artifact.sha256.as_ref()?;
            let name = artifact.path.file_name()?.to_string_lossy();
            Some(format!("{}  {}", digest, name))
        })
        .collect();

    if lines.is_empty() {
        return Ok(None);
    }
    lines.sort_by(|a, b| a[64..].cmp(&b[64..]));

    let sums_path = output_dir.join(CHECKSUM_FILE);
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(&sums_path, content)
        .with_context(|| format!("Failed to write {}", sums_path.display()))?;
    Ok(Some(sums_path))
}
