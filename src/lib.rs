//! tfinstall - find, download, or build Terraform binaries
//!
//! Resolves a release version, a git ref, or "latest" to a verified
//! `terraform` executable: downloaded from the release server, or fetched
//! and compiled from source, and cached per working directory.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod installer;
pub mod platform;
pub mod process;
pub mod release;
pub mod selector;
pub mod ui;

pub use error::{InstallError, InstallResult};
pub use installer::{find, FindOptions, FindResult, Installer};
pub use selector::{FallbackPolicy, Selector};
