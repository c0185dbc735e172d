//! Source fetching through the `git` CLI
//!
//! Checks out a single ref with a shallow fetch. Branches, tags and pull
//! request heads are all opaque refs here; only commit hashes get special
//! treatment, because servers will not serve an abbreviated hash directly.

use crate::error::{InstallError, InstallResult};
use crate::process::{self, CancelToken};
use crate::selector::GitRefSelector;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Obtains source code for a git ref
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Check out `selector` into `dest` and return the source directory
    async fn fetch(
        &self,
        selector: &GitRefSelector,
        dest: &Path,
        cancel: &CancelToken,
    ) -> InstallResult<PathBuf>;
}

/// Source fetcher backed by the `git` executable
pub struct GitFetcher {
    git: PathBuf,
}

impl GitFetcher {
    /// Use `git` from PATH
    pub fn new() -> Self {
        Self::with_binary("git")
    }

    /// Use a specific git executable
    pub fn with_binary(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }

    fn command(&self, repo_root: &Path) -> Command {
        let mut command = Command::new(&self.git);
        command
            .arg("-c")
            .arg("core.autocrlf=false")
            .arg("-c")
            .arg("advice.detachedHead=false")
            .env("GIT_TERMINAL_PROMPT", "0")
            .current_dir(repo_root);
        command
    }

    async fn git(
        &self,
        repo_root: &Path,
        args: &[&str],
        selector: &GitRefSelector,
        cancel: &CancelToken,
    ) -> InstallResult<String> {
        let mut command = self.command(repo_root);
        command.args(args);

        let output = process::run(command, cancel).await?;
        if !output.status.success() {
            return Err(fetch_error(
                selector,
                repo_root,
                format!("git {} failed:\n{}", args.join(" "), process::error_output(&output)),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Refuse directories that hold something other than a clean checkout
    async fn prepare_dir(
        &self,
        dest: &Path,
        selector: &GitRefSelector,
        cancel: &CancelToken,
    ) -> InstallResult<()> {
        if !dir_has_entries(dest).await? {
            tokio::fs::create_dir_all(dest)
                .await
                .map_err(|e| InstallError::io(format!("creating {}", dest.display()), e))?;
            self.git(dest, &["init", "--quiet"], selector, cancel).await?;
            return Ok(());
        }

        if !dest.join(".git").exists() {
            return Err(fetch_error(
                selector,
                dest,
                "checkout conflict: directory is not empty and is not a git checkout".to_string(),
            ));
        }

        let status = self
            .git(
                dest,
                &["status", "--porcelain", "--untracked-files=no"],
                selector,
                cancel,
            )
            .await?;
        if !status.is_empty() {
            return Err(fetch_error(
                selector,
                dest,
                format!("checkout conflict: existing checkout has local changes:\n{}", status),
            ));
        }

        debug!("Reusing git checkout at {}", dest.display());
        Ok(())
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(
        &self,
        selector: &GitRefSelector,
        dest: &Path,
        cancel: &CancelToken,
    ) -> InstallResult<PathBuf> {
        let repo = selector.repo_url();
        let git_ref = selector.git_ref.as_str();
        info!(
            "Fetching {} from {}",
            if git_ref.is_empty() { "HEAD" } else { git_ref },
            repo
        );

        self.prepare_dir(dest, selector, cancel).await?;

        if is_abbreviated_commit(git_ref) {
            self.git(
                dest,
                &[
                    "fetch",
                    "--quiet",
                    "--no-tags",
                    repo,
                    "+refs/heads/*:refs/remotes/origin/*",
                ],
                selector,
                cancel,
            )
            .await?;
            self.git(dest, &["checkout", "--quiet", "--force", "--detach", git_ref], selector, cancel)
                .await?;
        } else {
            let refspec = if git_ref.is_empty() { "HEAD" } else { git_ref };
            self.git(
                dest,
                &["fetch", "--quiet", "--no-tags", "--depth", "1", repo, refspec],
                selector,
                cancel,
            )
            .await?;
            self.git(
                dest,
                &["checkout", "--quiet", "--force", "--detach", "FETCH_HEAD"],
                selector,
                cancel,
            )
            .await?;
        }

        let head = self.git(dest, &["rev-parse", "HEAD"], selector, cancel).await?;
        info!("Checked out {} at {}", head, dest.display());
        Ok(dest.to_path_buf())
    }
}

fn fetch_error(selector: &GitRefSelector, dir: &Path, output: String) -> InstallError {
    InstallError::Fetch {
        git_ref: if selector.git_ref.is_empty() {
            "HEAD".to_string()
        } else {
            selector.git_ref.clone()
        },
        repo: selector.repo_url().to_string(),
        work_dir: dir.to_path_buf(),
        output,
    }
}

fn is_abbreviated_commit(git_ref: &str) -> bool {
    git_ref.len() < 40 && git_ref.len() >= 7 && git_ref.chars().all(|c| c.is_ascii_hexdigit())
}

async fn dir_has_entries(dir: &Path) -> InstallResult<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(InstallError::io(format!("reading {}", dir.display()), e)),
    };
    let first = entries
        .next_entry()
        .await
        .map_err(|e| InstallError::io(format!("reading {}", dir.display()), e))?;
    Ok(first.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Selector;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn sh_git(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(["-c", "user.email=test@example.com", "-c", "user.name=test"])
            .args(["-c", "init.defaultBranch=main", "-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    /// Upstream repo with a tagged first commit and a second commit on main
    fn upstream() -> TempDir {
        let dir = TempDir::new().unwrap();
        sh_git(dir.path(), &["init", "--quiet"]);
        std::fs::write(dir.path().join("VERSION"), "0.1.0\n").unwrap();
        sh_git(dir.path(), &["add", "VERSION"]);
        sh_git(dir.path(), &["commit", "--quiet", "-m", "first"]);
        sh_git(dir.path(), &["tag", "v0.1.0"]);
        std::fs::write(dir.path().join("VERSION"), "0.2.0-dev\n").unwrap();
        sh_git(dir.path(), &["commit", "--quiet", "-am", "second"]);
        dir
    }

    fn selector_for(upstream: &TempDir, git_ref: &str) -> GitRefSelector {
        match Selector::git_ref(
            git_ref,
            Some(format!("file://{}", upstream.path().display())),
            None,
        ) {
            Selector::GitRef(sel) => sel,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn fetches_tag() {
        if !git_available() {
            return;
        }
        let upstream = upstream();
        let work = TempDir::new().unwrap();
        let dest = work.path().join("src");

        let fetched = GitFetcher::new()
            .fetch(&selector_for(&upstream, "refs/tags/v0.1.0"), &dest, &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(fetched.join("VERSION")).unwrap(), "0.1.0\n");
    }

    #[tokio::test]
    async fn empty_ref_fetches_default_head() {
        if !git_available() {
            return;
        }
        let upstream = upstream();
        let work = TempDir::new().unwrap();
        let dest = work.path().join("src");

        GitFetcher::new()
            .fetch(&selector_for(&upstream, ""), &dest, &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("VERSION")).unwrap(), "0.2.0-dev\n");
    }

    #[tokio::test]
    async fn reuses_clean_checkout_for_another_ref() {
        if !git_available() {
            return;
        }
        let upstream = upstream();
        let work = TempDir::new().unwrap();
        let dest = work.path().join("src");
        let fetcher = GitFetcher::new();

        fetcher
            .fetch(&selector_for(&upstream, "refs/heads/main"), &dest, &CancelToken::never())
            .await
            .unwrap();
        fetcher
            .fetch(&selector_for(&upstream, "refs/tags/v0.1.0"), &dest, &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("VERSION")).unwrap(), "0.1.0\n");
    }

    #[tokio::test]
    async fn unknown_ref_is_fetch_error() {
        if !git_available() {
            return;
        }
        let upstream = upstream();
        let work = TempDir::new().unwrap();

        let err = GitFetcher::new()
            .fetch(
                &selector_for(&upstream, "refs/heads/does-not-exist"),
                &work.path().join("src"),
                &CancelToken::never(),
            )
            .await
            .unwrap_err();

        match err {
            InstallError::Fetch { git_ref, output, .. } => {
                assert_eq!(git_ref, "refs/heads/does-not-exist");
                assert!(!output.is_empty());
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_git_directory_is_conflict() {
        let work = TempDir::new().unwrap();
        std::fs::write(work.path().join("stray.txt"), "x").unwrap();
        let sel = match Selector::git_ref("refs/heads/main", None, None) {
            Selector::GitRef(sel) => sel,
            _ => unreachable!(),
        };

        let err = GitFetcher::new()
            .fetch(&sel, work.path(), &CancelToken::never())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("checkout conflict"));
    }

    #[test]
    fn abbreviated_commit_detection() {
        assert!(is_abbreviated_commit("83630a7"));
        assert!(!is_abbreviated_commit("83630a7003fb8b868a3bf940798326634c3c6acc"));
        assert!(!is_abbreviated_commit("refs/heads/main"));
        assert!(!is_abbreviated_commit(""));
    }
}
