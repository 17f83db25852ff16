//! Source checkout management.
//!
//! The daemon only needs four things from a repository: does the checkout
//! exist, bring it up to date, which commit is checked out, and a
//! human-readable version for that commit. [`SourceRepo`] is that seam;
//! [`GitRepo`] implements it with libgit2.

use anyhow::{Context, Result, bail};
use git2::build::CheckoutBuilder;
use git2::{AutotagOption, DescribeFormatOptions, DescribeOptions, FetchOptions, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub trait SourceRepo {
    /// Local checkout directory.
    fn path(&self) -> &Path;

    fn exists(&self) -> bool;

    /// Clone the checkout if it is absent, otherwise pull from upstream.
    fn synchronize(&self) -> Result<()>;

    /// Full id of the checked-out commit.
    fn commit_id(&self) -> Result<String>;

    /// `git describe --long --tags --dirty --always` for the checkout.
    fn version_tag(&self) -> Result<String>;
}

/// A git checkout that tracks the `origin` remote.
#[derive(Debug, Clone)]
pub struct GitRepo {
    url: String,
    path: PathBuf,
}

impl GitRepo {
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.path)
            .with_context(|| format!("{} is not a git repository", self.path.display()))
    }

    fn clone_repo(&self) -> Result<()> {
        info!("clone repo {}", self.url);
        Repository::clone(&self.url, &self.path)
            .with_context(|| format!("Failed to clone '{}'", self.url))?;
        Ok(())
    }

    /// Fetch the checked-out branch from `origin` and fast-forward to it.
    fn pull(&self) -> Result<()> {
        let repo = self.open()?;
        let head = repo.head().context("Failed to read HEAD")?;
        if !head.is_branch() {
            bail!("{} has a detached HEAD", self.path.display());
        }
        let branch = head
            .shorthand()
            .context("HEAD is not valid UTF-8")?
            .to_string();

        let mut remote = repo
            .find_remote("origin")
            .context("Checkout has no 'origin' remote")?;
        let mut fetch_opts = FetchOptions::new();
        fetch_opts.download_tags(AutotagOption::All);
        // FETCH_HEAD lists tags first, so resolve the tracking branch instead
        let tracking = format!("refs/remotes/origin/{}", branch);
        let refspec = format!("+refs/heads/{}:{}", branch, tracking);
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_opts), None)
            .with_context(|| format!("Failed to fetch '{}' from origin", branch))?;

        let upstream = repo
            .find_reference(&tracking)
            .with_context(|| format!("origin has no branch '{}'", branch))?;
        let fetch_commit = repo.reference_to_annotated_commit(&upstream)?;
        let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            debug!(branch, "already up to date");
            return Ok(());
        }
        if !analysis.is_fast_forward() {
            bail!(
                "cannot fast-forward '{}' to origin/{}; local history diverged",
                branch,
                branch
            );
        }

        let refname = format!("refs/heads/{}", branch);
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(fetch_commit.id(), "betabuild: fast-forward")?;
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))
            .context("Failed to check out updated HEAD")?;
        debug!(branch, commit = %fetch_commit.id(), "fast-forwarded");
        Ok(())
    }
}

impl SourceRepo for GitRepo {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn synchronize(&self) -> Result<()> {
        if self.exists() {
            self.pull()
        } else {
            self.clone_repo()
        }
    }

    fn commit_id(&self) -> Result<String> {
        let repo = self.open()?;
        let commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .context("Failed to resolve HEAD commit")?;
        Ok(commit.id().to_string())
    }

    fn version_tag(&self) -> Result<String> {
        let repo = self.open()?;

        let mut describe_opts = DescribeOptions::new();
        describe_opts.describe_tags().show_commit_oid_as_fallback(true);
        let describe = repo
            .describe(&describe_opts)
            .context("git describe returned error")?;

        let mut format_opts = DescribeFormatOptions::new();
        format_opts
            .always_use_long_format(true)
            .dirty_suffix("-dirty");
        let version = describe.format(Some(&format_opts))?;
        Ok(version.trim().to_string())
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use git2::{Oid, Repository, Signature};
    use std::fs;
    use std::path::Path;

    pub fn commit_file(repo: &Repository, name: &str, content: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::now("Beta Builder", "beta@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, &format!("update {}", name), &tree, &parents)
            .unwrap()
    }

    pub fn tag(repo: &Repository, name: &str, oid: Oid) {
        let obj = repo.find_object(oid, None).unwrap();
        repo.tag_lightweight(name, &obj, false).unwrap();
    }
}
