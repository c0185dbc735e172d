//! Prebuilt release downloads
//!
//! Releases follow the `releases.hashicorp.com` layout:
//!
//! ```text
//! {base}/terraform/index.json
//! {base}/terraform/{version}/terraform_{version}_SHA256SUMS
//! {base}/terraform/{version}/terraform_{version}_{os}_{arch}.zip
//! ```
//!
//! Every archive is checked against the SHA256SUMS manifest before it is
//! opened. A mismatch is always fatal.

use crate::build::{self, BuildResult};
use crate::error::{InstallError, InstallResult};
use crate::platform::Platform;
use crate::process::CancelToken;
use crate::selector::VersionExpectation;
use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default release server
pub const DEFAULT_RELEASES_URL: &str = "https://releases.hashicorp.com";

/// Largest archive or manifest accepted from the server
const MAX_DOWNLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// Minimal blocking HTTP interface used for release downloads
pub trait HttpClient: Send + Sync {
    /// GET `url`. `Ok(None)` means the server answered 404.
    fn get(&self, url: &str) -> InstallResult<Option<Vec<u8>>>;
}

/// HTTP client backed by `ureq`
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    /// Create a client with default settings
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str) -> InstallResult<Option<Vec<u8>>> {
        debug!(%url, "Downloading");

        let http_err = |reason: String| InstallError::Http {
            url: url.to_string(),
            reason,
        };

        match self
            .agent
            .get(url)
            .header("User-Agent", concat!("tfinstall/", env!("CARGO_PKG_VERSION")))
            .call()
        {
            Ok(mut response) => response
                .body_mut()
                .with_config()
                .limit(MAX_DOWNLOAD_BYTES)
                .read_to_vec()
                .map(Some)
                .map_err(|e| http_err(e.to_string())),
            Err(ureq::Error::StatusCode(404)) => Ok(None),
            Err(e) => Err(http_err(e.to_string())),
        }
    }
}

/// Source of prebuilt releases
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Newest stable version available
    async fn latest_version(&self, cancel: &CancelToken) -> InstallResult<Version>;

    /// Download, verify and extract `version` into `dest`
    async fn fetch_release(
        &self,
        version: &Version,
        dest: &Path,
        cancel: &CancelToken,
    ) -> InstallResult<BuildResult>;
}

#[derive(Debug, Deserialize)]
struct ReleaseIndex {
    versions: HashMap<String, serde_json::Value>,
}

/// Release fetcher for the HashiCorp releases layout
pub struct HashicorpReleases {
    base_url: String,
    platform: Platform,
    http: Arc<dyn HttpClient>,
}

impl HashicorpReleases {
    /// Fetch from `base_url` for the current platform using `ureq`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Platform::current(), Arc::new(UreqClient::new()))
    }

    /// Fetch with an explicit platform and HTTP client
    pub fn with_client(
        base_url: impl Into<String>,
        platform: Platform,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            platform,
            http,
        }
    }

    /// Archive file name for `version` on this platform
    pub fn archive_name(&self, version: &Version) -> String {
        format!("terraform_{}_{}.zip", version, self.platform)
    }

    fn version_url(&self, version: &Version, file: &str) -> String {
        format!("{}/terraform/{}/{}", self.base_url, version, file)
    }

    async fn download(&self, url: String, cancel: &CancelToken) -> InstallResult<Option<Vec<u8>>> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled {
                command: format!("GET {}", url),
            });
        }

        let http = Arc::clone(&self.http);
        let request_url = url.clone();
        let task = tokio::task::spawn_blocking(move || http.get(&request_url));

        tokio::select! {
            joined = task => joined.map_err(|e| InstallError::Http {
                url,
                reason: e.to_string(),
            })?,
            _ = cancel.cancelled() => Err(InstallError::Cancelled {
                command: format!("GET {}", url),
            }),
        }
    }

    fn not_found(&self, version: &Version) -> InstallError {
        InstallError::NotFound {
            version: version.to_string(),
            platform: self.platform.to_string(),
        }
    }
}

#[async_trait]
impl ReleaseFetcher for HashicorpReleases {
    async fn latest_version(&self, cancel: &CancelToken) -> InstallResult<Version> {
        let url = format!("{}/terraform/index.json", self.base_url);
        let body = self
            .download(url.clone(), cancel)
            .await?
            .ok_or_else(|| InstallError::Http {
                url: url.clone(),
                reason: "release index not found".to_string(),
            })?;

        let index: ReleaseIndex = serde_json::from_slice(&body)?;
        let latest = latest_stable(index.versions.keys().map(String::as_str)).ok_or_else(|| {
            InstallError::Http {
                url,
                reason: "release index lists no stable versions".to_string(),
            }
        })?;

        info!("Latest Terraform release is {}", latest);
        Ok(latest)
    }

    async fn fetch_release(
        &self,
        version: &Version,
        dest: &Path,
        cancel: &CancelToken,
    ) -> InstallResult<BuildResult> {
        let archive = self.archive_name(version);
        info!("Downloading {}", archive);

        let sums = self
            .download(
                self.version_url(version, &format!("terraform_{}_SHA256SUMS", version)),
                cancel,
            )
            .await?
            .ok_or_else(|| self.not_found(version))?;
        let sums = String::from_utf8_lossy(&sums);
        let expected = checksum_for(&sums, &archive).ok_or_else(|| self.not_found(version))?;

        let bytes = self
            .download(self.version_url(version, &archive), cancel)
            .await?
            .ok_or_else(|| self.not_found(version))?;

        verify_checksum(&archive, &bytes, &expected)?;
        debug!("Checksum verified for {}", archive);

        let binary =
            extract_binary_blocking(bytes, archive, self.platform.binary_name(), dest).await?;

        let result = build::probe(&binary, cancel).await?.require_valid()?;
        result.check(&VersionExpectation::Exact(version.clone()))?;
        info!("Installed Terraform {} at {}", version, binary.display());
        Ok(result)
    }
}

/// Highest version without a pre-release tag
pub fn latest_stable<'a>(versions: impl Iterator<Item = &'a str>) -> Option<Version> {
    versions
        .filter_map(|v| Version::parse(v).ok())
        .filter(|v| v.pre.is_empty())
        .max()
}

/// Look up `file` in a `sha256sum`-style manifest
pub fn checksum_for(manifest: &str, file: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let digest = parts.next()?;
        let name = parts.next()?.trim_start_matches('*');
        (name == file).then(|| digest.to_ascii_lowercase())
    })
}

/// Compare the SHA-256 of `bytes` with `expected`
pub fn verify_checksum(artifact: &str, bytes: &[u8], expected: &str) -> InstallResult<()> {
    let actual = hex::encode(Sha256::digest(bytes));
    if actual != expected.to_ascii_lowercase() {
        return Err(InstallError::Integrity {
            artifact: artifact.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// [`extract_binary`] on the blocking thread pool
async fn extract_binary_blocking(
    data: Vec<u8>,
    artifact: String,
    binary_name: &'static str,
    dest: &Path,
) -> InstallResult<PathBuf> {
    let dest = dest.to_path_buf();
    let task_artifact = artifact.clone();
    tokio::task::spawn_blocking(move || extract_binary(&data, &task_artifact, binary_name, &dest))
        .await
        .map_err(|e| InstallError::Archive {
            artifact,
            reason: e.to_string(),
        })?
}

/// Extract `binary_name` from a zip archive into `dest`, marked executable.
///
/// The binary is written to a temporary name first and renamed into place,
/// so a failed extraction never leaves a truncated binary behind.
pub fn extract_binary(
    data: &[u8],
    artifact: &str,
    binary_name: &str,
    dest: &Path,
) -> InstallResult<PathBuf> {
    let archive_err = |reason: String| InstallError::Archive {
        artifact: artifact.to_string(),
        reason,
    };

    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| archive_err(e.to_string()))?;
    let mut entry = archive
        .by_name(binary_name)
        .map_err(|e| archive_err(format!("{}: {}", binary_name, e)))?;

    let mut content = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry
        .read_to_end(&mut content)
        .map_err(|e| archive_err(e.to_string()))?;

    std::fs::create_dir_all(dest)
        .map_err(|e| InstallError::io(format!("creating {}", dest.display()), e))?;

    let final_path = dest.join(binary_name);
    let tmp_path = dest.join(format!(".{}.tmp", binary_name));
    std::fs::write(&tmp_path, &content)
        .map_err(|e| InstallError::io(format!("writing {}", tmp_path.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| InstallError::io("setting binary permissions", e))?;
    }

    std::fs::rename(&tmp_path, &final_path)
        .map_err(|e| InstallError::io(format!("moving binary to {}", final_path.display()), e))?;

    Ok(final_path)
}
