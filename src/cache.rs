//! Binary cache
//!
//! Each acquisition lives in `<work_dir>/<identifier>/` and is recorded by an
//! `entry.json` manifest written once the binary has been verified. Entries
//! are never edited: an entry is either present and complete, or absent.
//!
//! # Entry layout
//!
//! | Strategy | Contents |
//! |----------|----------|
//! | source   | `src/` checkout, `src/bin/terraform`, `entry.json` |
//! | release  | `terraform`, `entry.json` |
//!
//! Work on a single key is serialized inside the process with a per-key
//! async mutex. Separate processes sharing a work dir are not coordinated.

use crate::error::{InstallError, InstallResult};
use crate::selector::{ResolutionPlan, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

/// Manifest file name inside each entry directory
pub const ENTRY_FILE: &str = "entry.json";

/// A completed acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// How the binary was acquired
    pub strategy: Strategy,
    /// Normalized identity of the request
    pub identifier: String,
    /// Path to the binary
    pub binary: PathBuf,
    /// Version the binary reported when it was cached
    pub version: String,
    /// Selector that produced the entry
    pub selector: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
}

/// Cache of acquired binaries, scoped by working directory
pub struct BinaryCache {
    default_dir: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl BinaryCache {
    /// Create a cache whose plans default to `default_dir`
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Default working directory
    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    /// Serialize work on the plan's key. Held until the guard drops.
    pub async fn lock(&self, plan: &ResolutionPlan) -> OwnedMutexGuard<()> {
        let key = plan.entry_dir();
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop keys nobody holds or waits on
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        mutex.lock_owned().await
    }

    /// Read the entry for a plan, if one has been written
    pub async fn get(&self, plan: &ResolutionPlan) -> InstallResult<Option<CacheEntry>> {
        let path = plan.entry_dir().join(ENTRY_FILE);
        read_entry(&path).await
    }

    /// Record a verified binary for a plan
    pub async fn put(
        &self,
        plan: &ResolutionPlan,
        selector: &str,
        binary: &Path,
        version: &str,
    ) -> InstallResult<CacheEntry> {
        let entry = CacheEntry {
            strategy: plan.strategy,
            identifier: plan.identifier.clone(),
            binary: binary.to_path_buf(),
            version: version.to_string(),
            selector: selector.to_string(),
            created_at: Utc::now(),
        };

        let dir = plan.entry_dir();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| InstallError::io(format!("creating {}", dir.display()), e))?;

        let content = serde_json::to_string_pretty(&entry)?;
        let tmp = dir.join(format!("{}.tmp", ENTRY_FILE));
        let path = dir.join(ENTRY_FILE);
        fs::write(&tmp, content)
            .await
            .map_err(|e| InstallError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| InstallError::io(format!("writing {}", path.display()), e))?;

        debug!("Cached {} -> {}", entry.identifier, entry.binary.display());
        Ok(entry)
    }

    /// Drop the manifest for a plan so the next lookup misses
    pub async fn invalidate(&self, plan: &ResolutionPlan) -> InstallResult<()> {
        let path = plan.entry_dir().join(ENTRY_FILE);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Invalidated cache entry {}", plan.identifier);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallError::io(format!("removing {}", path.display()), e)),
        }
    }

    /// List every entry under `dir` (defaults to the cache's default dir)
    pub async fn list(&self, dir: Option<&Path>) -> InstallResult<Vec<CacheEntry>> {
        let dir = dir.unwrap_or(&self.default_dir);
        let mut entries: Vec<CacheEntry> = scan(dir)
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect();

        entries.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(entries)
    }

    /// Remove every entry directory under `dir`. Returns how many were removed.
    ///
    /// Only directories holding an entry manifest are touched, and always by
    /// the path they were found at.
    pub async fn clear(&self, dir: Option<&Path>) -> InstallResult<usize> {
        let dir = dir.unwrap_or(&self.default_dir);
        let found = scan(dir).await?;

        for (entry_dir, _) in &found {
            fs::remove_dir_all(entry_dir)
                .await
                .map_err(|e| InstallError::io(format!("removing {}", entry_dir.display()), e))?;
            info!("Removed {}", entry_dir.display());
        }

        Ok(found.len())
    }
}

/// Entry directories directly under `dir` with a readable manifest.
/// Anything that is not a directory is skipped.
async fn scan(dir: &Path) -> InstallResult<Vec<(PathBuf, CacheEntry)>> {
    let mut found = Vec::new();

    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => return Err(InstallError::io(format!("reading {}", dir.display()), e)),
    };

    while let Some(child) = read_dir
        .next_entry()
        .await
        .map_err(|e| InstallError::io("reading cache entry", e))?
    {
        let file_type = child
            .file_type()
            .await
            .map_err(|e| InstallError::io(format!("inspecting {}", child.path().display()), e))?;
        if !file_type.is_dir() {
            debug!("Skipping non-directory {}", child.path().display());
            continue;
        }

        let entry_dir = child.path();
        if let Some(entry) = read_entry(&entry_dir.join(ENTRY_FILE)).await? {
            found.push((entry_dir, entry));
        }
    }

    Ok(found)
}

async fn read_entry(path: &Path) -> InstallResult<Option<CacheEntry>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(InstallError::io(format!("reading {}", path.display()), e)),
    };

    match serde_json::from_str(&content) {
        Ok(entry) => Ok(Some(entry)),
        Err(e) => {
            debug!("Ignoring unreadable cache entry {}: {}", path.display(), e);
            Ok(None)
        }
    }
}
