//! Error types for tfinstall
//!
//! All modules use `InstallResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tfinstall operations
pub type InstallResult<T> = Result<T, InstallError>;

/// All errors that can occur while finding, fetching, or building Terraform
#[derive(Error, Debug)]
pub enum InstallError {
    // Selector errors
    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    // Acquisition errors
    #[error("Failed to fetch {git_ref} from {repo} into {}: {output}", .work_dir.display())]
    Fetch {
        git_ref: String,
        repo: String,
        work_dir: PathBuf,
        output: String,
    },

    #[error("Build failed in {}:\n{output}", .source_dir.display())]
    Compile { source_dir: PathBuf, output: String },

    #[error("Binary {} is unusable: {reason}", .binary.display())]
    Verification { binary: PathBuf, reason: String },

    #[error("Checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    Integrity {
        artifact: String,
        expected: String,
        actual: String,
    },

    #[error("No release found for Terraform {version} ({platform})")]
    NotFound { version: String, platform: String },

    #[error("Required tool not found: {name}. {hint}")]
    ToolNotFound { name: String, hint: String },

    #[error("Cancelled while running: {command}")]
    Cancelled { command: String },

    // Transport errors
    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("Failed to read archive {artifact}: {reason}")]
    Archive { artifact: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // Annotation added by the installer facade
    #[error("selector {selector:?}: {source}")]
    Find {
        selector: String,
        #[source]
        source: Box<InstallError>,
    },
}

impl InstallError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an invalid selector error
    pub fn invalid_selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Create a verification error
    pub fn verification(binary: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Verification {
            binary: binary.into(),
            reason: reason.into(),
        }
    }

    /// Annotate with the selector that caused the error.
    ///
    /// Already-annotated errors are returned unchanged.
    pub fn with_selector(self, selector: impl Into<String>) -> Self {
        match self {
            Self::Find { .. } => self,
            other => Self::Find {
                selector: selector.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, without the selector annotation
    pub fn root(&self) -> &InstallError {
        match self {
            Self::Find { source, .. } => source.root(),
            other => other,
        }
    }

    /// Selector this error was raised for, if annotated
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Find { selector, .. } => Some(selector),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::InvalidSelector { .. } => Some(
                "Use a version (1.5.7), a git ref (refs/heads/main, refs/tags/v1.5.7), a commit hash, or \"latest\"",
            ),
            Self::Integrity { .. } => {
                Some("The download was corrupted or tampered with. Do not use it.")
            }
            Self::NotFound { .. } => {
                Some("Check the version exists, or pass --fallback-to-source to build it")
            }
            Self::ToolNotFound { .. } => Some("Install the missing tool and make sure it is on PATH"),
            Self::Verification { .. } => {
                Some("Remove the cached directory and try again; the binary is broken")
            }
            _ => None,
        }
    }
}
