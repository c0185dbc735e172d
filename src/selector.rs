//! Selector classification and resolution
//!
//! Turns user input ("1.5.7", "refs/tags/v0.12.29", "latest", a commit hash)
//! into a [`Selector`], and a selector into an immutable [`ResolutionPlan`].
//! Nothing in this module touches the filesystem or spawns processes.

use crate::error::{InstallError, InstallResult};
use semver::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Repository used for source builds unless a selector overrides it
pub const DEFAULT_REPO_URL: &str = "https://github.com/hashicorp/terraform.git";

/// Which version of Terraform to acquire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A released version, e.g. `1.5.7`
    ExactVersion(Version),
    /// A git ref to build from source
    GitRef(GitRefSelector),
    /// The newest stable release
    LatestRelease,
}

/// A git ref plus where to fetch it from and where to build it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRefSelector {
    /// Raw ref (`refs/heads/main`, `refs/pull/1/head`, a commit hash). Empty means default branch head.
    pub git_ref: String,
    /// Repository URL override
    pub repo: Option<String>,
    /// Working directory override
    pub work_dir: Option<PathBuf>,
}

impl GitRefSelector {
    /// Repository to fetch from
    pub fn repo_url(&self) -> &str {
        self.repo.as_deref().unwrap_or(DEFAULT_REPO_URL)
    }
}

impl Selector {
    /// Select an exact released version (a leading `v` is accepted)
    pub fn exact_version(version: &str) -> InstallResult<Self> {
        let trimmed = version.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        Version::parse(bare)
            .map(Self::ExactVersion)
            .map_err(|e| InstallError::invalid_selector(version, e.to_string()))
    }

    /// Select a git ref, optionally from another repository and into a specific directory.
    ///
    /// An empty ref selects the head of the default branch.
    pub fn git_ref(
        git_ref: impl Into<String>,
        repo: Option<String>,
        work_dir: Option<PathBuf>,
    ) -> Self {
        Self::GitRef(GitRefSelector {
            git_ref: git_ref.into().trim().to_string(),
            repo: repo.filter(|r| !r.trim().is_empty()),
            work_dir,
        })
    }

    /// Select the newest stable release
    pub fn latest() -> Self {
        Self::LatestRelease
    }

    /// Classify a raw selector string.
    ///
    /// - semantic versions (with optional `v`) are exact versions
    /// - `refs/...` and 7 to 40 hex characters are git refs
    /// - empty or `latest` is the latest release
    pub fn parse(raw: &str) -> InstallResult<Self> {
        let input = raw.trim();

        if input.is_empty() || input.eq_ignore_ascii_case("latest") {
            return Ok(Self::LatestRelease);
        }

        if looks_like_version(input) {
            return Self::exact_version(input);
        }

        if let Some(rest) = input.strip_prefix("refs/") {
            if rest.is_empty() || rest.ends_with('/') || input.contains("..") || input.contains(' ')
            {
                return Err(InstallError::invalid_selector(raw, "malformed git ref"));
            }
            return Ok(Self::git_ref(input, None, None));
        }

        if is_commit_hash(input) {
            return Ok(Self::git_ref(input.to_ascii_lowercase(), None, None));
        }

        Err(InstallError::invalid_selector(
            raw,
            "not a version, git ref, commit hash, or \"latest\"",
        ))
    }

    /// Attach a working directory (git refs only; other selectors ignore it)
    pub fn with_work_dir(self, dir: impl Into<PathBuf>) -> Self {
        match self {
            Self::GitRef(mut sel) => {
                sel.work_dir = Some(dir.into());
                Self::GitRef(sel)
            }
            other => other,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactVersion(v) => write!(f, "{}", v),
            Self::GitRef(sel) if sel.git_ref.is_empty() => write!(f, "HEAD"),
            Self::GitRef(sel) => write!(f, "{}", sel.git_ref),
            Self::LatestRelease => write!(f, "latest"),
        }
    }
}

fn looks_like_version(input: &str) -> bool {
    let bare = input.strip_prefix('v').unwrap_or(input);
    bare.chars().next().is_some_and(|c| c.is_ascii_digit()) && bare.contains('.')
}

fn is_commit_hash(input: &str) -> bool {
    (7..=40).contains(&input.len()) && input.chars().all(|c| c.is_ascii_hexdigit())
}

/// How a binary is acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fetch source with git and compile it
    BuildFromSource,
    /// Download a prebuilt release archive
    DownloadRelease,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildFromSource => write!(f, "source"),
            Self::DownloadRelease => write!(f, "release"),
        }
    }
}

/// What the acquired binary must report from `terraform version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionExpectation {
    /// Exactly this version
    Exact(Version),
    /// Any version in this major.minor line
    Family { major: u64, minor: u64 },
    /// A development build, i.e. any version with a pre-release tag
    Prerelease,
    /// Anything parseable
    Any,
}

impl VersionExpectation {
    /// Check a reported version against the expectation
    pub fn check(&self, reported: &Version) -> Result<(), String> {
        match self {
            Self::Exact(expected) if reported != expected => Err(format!(
                "reported version {} but {} was requested",
                reported, expected
            )),
            Self::Family { major, minor } if reported.major != *major || reported.minor != *minor => {
                Err(format!(
                    "reported version {} is outside the {}.{} line",
                    reported, major, minor
                ))
            }
            Self::Prerelease if reported.pre.is_empty() => Err(format!(
                "reported release version {} but a development build was expected",
                reported
            )),
            _ => Ok(()),
        }
    }

    fn for_git_ref(git_ref: &str) -> Self {
        if let Some(tag) = git_ref.strip_prefix("refs/tags/") {
            let bare = tag.strip_prefix('v').unwrap_or(tag);
            if let Ok(version) = Version::parse(bare) {
                return Self::Exact(version);
            }
        }
        if let Some(branch) = git_ref.strip_prefix("refs/heads/") {
            let bare = branch.strip_prefix('v').unwrap_or(branch);
            let mut parts = bare.split('.');
            if let (Some(major), Some(minor), None) = (parts.next(), parts.next(), parts.next()) {
                if let (Ok(major), Ok(minor)) = (major.parse(), minor.parse()) {
                    return Self::Family { major, minor };
                }
            }
        }
        if git_ref.starts_with("refs/pull/") {
            return Self::Prerelease;
        }
        Self::Any
    }
}

/// Whether a missing release may be built from its source tag instead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// A missing release is a `NotFound` error
    #[default]
    Disabled,
    /// Build `refs/tags/v<version>` when no release artifact exists
    BuildFromSource,
}

/// Concrete acquisition plan derived from a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    /// How to acquire the binary
    pub strategy: Strategy,
    /// Normalized, filesystem-safe identity of the request
    pub identifier: String,
    /// Working directory the plan is scoped to
    pub work_dir: PathBuf,
    /// Source-build inputs, present for `BuildFromSource`
    pub source: Option<GitRefSelector>,
    /// Requested release version; `None` means latest, unresolved
    pub version: Option<Version>,
    /// What the binary must report
    pub expectation: VersionExpectation,
    /// Source build to try when the release does not exist
    pub fallback: Option<Box<ResolutionPlan>>,
}

impl ResolutionPlan {
    /// Pin an unresolved latest-release plan to a concrete version
    pub fn pin_release(self, version: Version, policy: FallbackPolicy) -> Self {
        release_plan(version, self.work_dir, policy)
    }

    /// Directory holding this plan's artifacts
    pub fn entry_dir(&self) -> PathBuf {
        self.work_dir.join(&self.identifier)
    }
}

/// Resolve a selector into a plan.
///
/// `default_work_dir` is used unless the selector carries its own.
pub fn resolve(
    selector: &Selector,
    default_work_dir: &Path,
    policy: FallbackPolicy,
) -> ResolutionPlan {
    match selector {
        Selector::GitRef(sel) => source_plan(
            sel.clone(),
            sel.work_dir.clone().unwrap_or_else(|| default_work_dir.to_path_buf()),
        ),
        Selector::ExactVersion(version) => {
            release_plan(version.clone(), default_work_dir.to_path_buf(), policy)
        }
        Selector::LatestRelease => ResolutionPlan {
            strategy: Strategy::DownloadRelease,
            identifier: "release-latest".to_string(),
            work_dir: default_work_dir.to_path_buf(),
            source: None,
            version: None,
            expectation: VersionExpectation::Any,
            fallback: None,
        },
    }
}

fn source_plan(sel: GitRefSelector, work_dir: PathBuf) -> ResolutionPlan {
    ResolutionPlan {
        strategy: Strategy::BuildFromSource,
        identifier: source_identifier(&sel),
        work_dir,
        expectation: VersionExpectation::for_git_ref(&sel.git_ref),
        source: Some(sel),
        version: None,
        fallback: None,
    }
}

fn release_plan(version: Version, work_dir: PathBuf, policy: FallbackPolicy) -> ResolutionPlan {
    let fallback = match policy {
        FallbackPolicy::Disabled => None,
        FallbackPolicy::BuildFromSource => Some(Box::new(source_plan(
            GitRefSelector {
                git_ref: format!("refs/tags/v{}", version),
                repo: None,
                work_dir: None,
            },
            work_dir.clone(),
        ))),
    };

    ResolutionPlan {
        strategy: Strategy::DownloadRelease,
        identifier: format!("release-{}", version),
        work_dir,
        source: None,
        expectation: VersionExpectation::Exact(version.clone()),
        version: Some(version),
        fallback,
    }
}

fn source_identifier(sel: &GitRefSelector) -> String {
    let name = if sel.git_ref.is_empty() {
        "HEAD".to_string()
    } else {
        sanitize(&sel.git_ref)
    };

    match sel.repo.as_deref() {
        Some(repo) if repo != DEFAULT_REPO_URL => {
            let digest = Sha256::digest(repo.as_bytes());
            format!("git-{}-{}", name, hex::encode(&digest[..4]))
        }
        _ => format!("git-{}", name),
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
