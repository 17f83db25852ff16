//! Persisted id of the last processed commit.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Read the stored commit id. A missing file is not an error: it means
/// nothing has been built yet.
pub fn read_marker(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.trim().to_string()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("read state file {}", path.display())),
    }
}

/// Replace the stored commit id.
///
/// The new value is written next to the marker first and renamed over it,
/// so a crash never leaves a truncated marker behind.
pub fn write_marker(path: &Path, commit: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, commit).with_context(|| format!("write state file {}", path.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("write state file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_marker_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_marker(&dir.path().join("commit.current")).unwrap(), "");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("commit.current");
        write_marker(&path, "0123abcd").unwrap();
        assert_eq!(read_marker(&path).unwrap(), "0123abcd");
        assert_eq!(fs::read_to_string(&path).unwrap(), "0123abcd");

        write_marker(&path, "feedface").unwrap();
        assert_eq!(read_marker(&path).unwrap(), "feedface");
    }

    #[test]
    fn test_trailing_newline_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commit.current");
        fs::write(&path, "abc123\n").unwrap();
        assert_eq!(read_marker(&path).unwrap(), "abc123");
    }

    #[test]
    fn test_unreadable_marker_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be
        let path = dir.path().join("commit.current");
        fs::create_dir(&path).unwrap();
        assert!(read_marker(&path).is_err());
    }
}
