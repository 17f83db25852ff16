//! Cross-compilation target matrix.
//!
//! Every build run produces one artifact per entry of [`targets`]. The list
//! is fixed at compile time; its order only affects log interleaving.

use std::fmt;

/// One (operating system, architecture) pair to compile for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildTarget {
    pub os: &'static str,
    pub arch: &'static str,
}

impl BuildTarget {
    pub const fn new(os: &'static str, arch: &'static str) -> Self {
        Self { os, arch }
    }

    /// Executable suffix the target OS conventionally requires.
    pub fn exe_suffix(&self) -> &'static str {
        if self.os == "windows" { ".exe" } else { "" }
    }

    /// Artifact filename for this target, e.g. `restic_v0.9.0_linux_amd64`.
    pub fn artifact_name(&self, project: &str, version: &str) -> String {
        format!(
            "{}_{}_{}_{}{}",
            project,
            version,
            self.os,
            self.arch,
            self.exe_suffix()
        )
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

const TARGETS: &[BuildTarget] = &[
    BuildTarget::new("darwin", "386"),
    BuildTarget::new("darwin", "amd64"),
    BuildTarget::new("freebsd", "386"),
    BuildTarget::new("freebsd", "amd64"),
    BuildTarget::new("freebsd", "arm"),
    BuildTarget::new("linux", "386"),
    BuildTarget::new("linux", "amd64"),
    BuildTarget::new("linux", "arm"),
    BuildTarget::new("linux", "arm64"),
    BuildTarget::new("openbsd", "386"),
    BuildTarget::new("openbsd", "amd64"),
    BuildTarget::new("windows", "386"),
    BuildTarget::new("windows", "amd64"),
];

/// The build matrix, in dispatch order.
pub fn targets() -> &'static [BuildTarget] {
    TARGETS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_matrix_has_no_duplicates() {
        let unique: HashSet<_> = targets().iter().collect();
        assert_eq!(unique.len(), targets().len());
    }

    #[test]
    fn test_matrix_is_not_empty() {
        assert!(!targets().is_empty());
        assert!(targets().contains(&BuildTarget::new("linux", "amd64")));
    }

    #[test]
    fn test_windows_gets_exe_suffix() {
        let win = BuildTarget::new("windows", "amd64");
        assert_eq!(win.exe_suffix(), ".exe");
        assert_eq!(
            win.artifact_name("restic", "v1.2.3-4-gabcdef-dirty"),
            "restic_v1.2.3-4-gabcdef-dirty_windows_amd64.exe"
        );
    }

    #[test]
    fn test_unix_has_no_suffix() {
        let linux = BuildTarget::new("linux", "arm64");
        assert_eq!(linux.exe_suffix(), "");
        assert_eq!(
            linux.artifact_name("restic", "v0.9.0"),
            "restic_v0.9.0_linux_arm64"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(BuildTarget::new("openbsd", "386").to_string(), "openbsd/386");
    }
}
