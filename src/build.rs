//! Compiling fetched source with the Go toolchain, and probing binaries
//!
//! A build is only as good as what the produced binary says about itself:
//! every binary is run with `version` and must print `Terraform v<semver>`.

use crate::error::{InstallError, InstallResult};
use crate::platform::Platform;
use crate::process::{self, CancelToken};
use crate::selector::VersionExpectation;
use async_trait::async_trait;
use semver::Version;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Outcome of building or downloading a binary and probing it
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Path to the binary
    pub binary: PathBuf,
    /// Version parsed from `<binary> version`
    pub version: Option<Version>,
    /// Raw probe output, kept for diagnostics
    pub output: String,
    /// True only if the binary ran and reported a parseable version
    pub valid: bool,
}

impl BuildResult {
    /// Turn an invalid result into a `Verification` error
    pub fn require_valid(self) -> InstallResult<Self> {
        if self.valid {
            return Ok(self);
        }
        Err(InstallError::verification(
            self.binary,
            format!("`version` did not report a Terraform version:\n{}", self.output),
        ))
    }

    /// Check the reported version against what the request expects
    pub fn check(&self, expectation: &VersionExpectation) -> InstallResult<()> {
        let version = self.version.as_ref().ok_or_else(|| {
            InstallError::verification(&self.binary, "no version reported".to_string())
        })?;
        expectation
            .check(version)
            .map_err(|reason| InstallError::verification(&self.binary, reason))
    }

    /// Version as a display string ("" when unknown)
    pub fn version_string(&self) -> String {
        self.version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// Compiles source into a binary
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build `source_dir` and return the verified binary
    async fn build(&self, source_dir: &Path, cancel: &CancelToken) -> InstallResult<BuildResult>;
}

/// Builder that runs `go build`
pub struct GoBuilder {
    go: PathBuf,
    platform: Platform,
}

impl GoBuilder {
    /// Use `go` from PATH
    pub fn new() -> Self {
        Self::with_binary("go")
    }

    /// Use a specific go executable
    pub fn with_binary(go: impl Into<PathBuf>) -> Self {
        Self {
            go: go.into(),
            platform: Platform::current(),
        }
    }

    /// Where the binary for `source_dir` is written
    pub fn output_path(&self, source_dir: &Path) -> PathBuf {
        source_dir.join("bin").join(self.platform.binary_name())
    }

    async fn ensure_toolchain(&self, cancel: &CancelToken) -> InstallResult<()> {
        let mut command = Command::new(&self.go);
        command.arg("version");

        match process::run(command, cancel).await {
            Ok(output) if output.status.success() => {
                debug!(
                    "Using {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
                Ok(())
            }
            Ok(_) | Err(InstallError::CommandFailed { .. }) => Err(InstallError::ToolNotFound {
                name: self.go.display().to_string(),
                hint: "Install Go from https://go.dev/dl to build Terraform from source".to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

impl Default for GoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Builder for GoBuilder {
    async fn build(&self, source_dir: &Path, cancel: &CancelToken) -> InstallResult<BuildResult> {
        self.ensure_toolchain(cancel).await?;

        let output_path = self.output_path(source_dir);
        if output_path.exists() {
            tokio::fs::remove_file(&output_path).await.map_err(|e| {
                InstallError::io(format!("removing stale {}", output_path.display()), e)
            })?;
        }

        let mut command = Command::new(&self.go);
        command.arg("build");
        if source_dir.join("vendor").is_dir() {
            command.arg("-mod=vendor");
        }
        command.arg("-o").arg(&output_path).current_dir(source_dir);

        info!("Building Terraform in {}", source_dir.display());
        let output = process::run(command, cancel).await?;

        if !output.status.success() {
            return Err(InstallError::Compile {
                source_dir: source_dir.to_path_buf(),
                output: process::combined_output(&output),
            });
        }

        if !output_path.is_file() {
            return Err(InstallError::verification(
                &output_path,
                "build succeeded but produced no binary".to_string(),
            ));
        }

        let result = probe(&output_path, cancel).await?.require_valid()?;
        info!("Built Terraform {}", result.version_string());
        Ok(result)
    }
}

/// Run `<binary> version` and parse what it reports.
///
/// Only cancellation is an error; anything else that goes wrong yields an
/// invalid result.
pub async fn probe(binary: &Path, cancel: &CancelToken) -> InstallResult<BuildResult> {
    let mut command = Command::new(binary);
    command.arg("version").env("CHECKPOINT_DISABLE", "1");

    let output = match process::run(command, cancel).await {
        Ok(output) => output,
        Err(InstallError::CommandFailed { source, .. }) => {
            warn!("Failed to execute {}: {}", binary.display(), source);
            return Ok(BuildResult {
                binary: binary.to_path_buf(),
                version: None,
                output: source.to_string(),
                valid: false,
            });
        }
        Err(e) => return Err(e),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let version = if output.status.success() {
        parse_version(&stdout)
    } else {
        None
    };

    Ok(BuildResult {
        binary: binary.to_path_buf(),
        valid: version.is_some(),
        version,
        output: if output.status.success() {
            stdout
        } else {
            process::error_output(&output)
        },
    })
}

/// Find the version in `terraform version` output.
///
/// Prefers the token after `Terraform`, falling back to the first
/// `v<semver>` token anywhere in the output.
pub fn parse_version(output: &str) -> Option<Version> {
    let tokens: Vec<&str> = output.split_whitespace().collect();

    let after_name = tokens
        .windows(2)
        .find(|pair| pair[0] == "Terraform")
        .and_then(|pair| parse_token(pair[1]));

    after_name.or_else(|| tokens.iter().find_map(|t| parse_token(t)))
}

fn parse_token(token: &str) -> Option<Version> {
    let bare = token.strip_prefix('v')?;
    Version::parse(bare.trim_end_matches(',')).ok()
}
