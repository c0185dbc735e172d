//! Installer facade
//!
//! [`Installer::find`] is the single entry point: resolve the selector,
//! consult the cache, and on a miss fetch+build or download, then record the
//! verified binary. Every error leaving `find` is annotated with the selector
//! that caused it.

use crate::build::{self, BuildResult, Builder, GoBuilder};
use crate::cache::BinaryCache;
use crate::config::{Config, ConfigManager};
use crate::error::{InstallError, InstallResult};
use crate::git::{GitFetcher, SourceFetcher};
use crate::process::CancelToken;
use crate::release::{HashicorpReleases, ReleaseFetcher};
use crate::selector::{resolve, FallbackPolicy, ResolutionPlan, Selector, Strategy};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What to find, and how
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Which version or ref to acquire
    pub selector: Selector,
    /// Override of the cache/work location
    pub work_dir: Option<PathBuf>,
    /// Whether a missing release may be built from source
    pub fallback: FallbackPolicy,
    /// Cancels any running subprocess or download
    pub cancel: CancelToken,
}

impl FindOptions {
    /// Options for a selector with default settings
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            work_dir: None,
            fallback: FallbackPolicy::Disabled,
            cancel: CancelToken::never(),
        }
    }

    /// Options for a raw selector string
    pub fn parse(raw: &str) -> InstallResult<Self> {
        Selector::parse(raw).map(Self::new)
    }

    /// Use `dir` as the work directory
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Set the fallback policy
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set the cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A ready-to-run binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindResult {
    /// Path to the executable
    pub path: PathBuf,
    /// Version the binary reports
    pub version: String,
    /// How it was acquired
    pub strategy: Strategy,
    /// Whether it came from the cache
    pub cache_hit: bool,
}

/// Locates or produces Terraform binaries
pub struct Installer {
    cache: Arc<BinaryCache>,
    fetcher: Arc<dyn SourceFetcher>,
    builder: Arc<dyn Builder>,
    releases: Arc<dyn ReleaseFetcher>,
}

impl Installer {
    /// Installer with the default git, go and release backends
    pub fn new(cache: Arc<BinaryCache>) -> Self {
        Self::from_config(&Config::default(), cache)
    }

    /// Installer whose backends follow `config`
    pub fn from_config(config: &Config, cache: Arc<BinaryCache>) -> Self {
        Self {
            cache,
            fetcher: Arc::new(GitFetcher::with_binary(&config.install.git_binary)),
            builder: Arc::new(GoBuilder::with_binary(&config.install.go_binary)),
            releases: Arc::new(HashicorpReleases::new(config.install.releases_url.clone())),
        }
    }

    /// Replace the source fetcher
    pub fn with_source_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the builder
    pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.builder = builder;
        self
    }

    /// Replace the release fetcher
    pub fn with_release_fetcher(mut self, releases: Arc<dyn ReleaseFetcher>) -> Self {
        self.releases = releases;
        self
    }

    /// The cache this installer reads and writes
    pub fn cache(&self) -> &BinaryCache {
        &self.cache
    }

    /// Find or produce the binary for `options.selector`
    pub async fn find(&self, options: FindOptions) -> InstallResult<FindResult> {
        let label = options.selector.to_string();
        self.find_inner(&options, &label)
            .await
            .map_err(|e| e.with_selector(label))
    }

    async fn find_inner(&self, options: &FindOptions, label: &str) -> InstallResult<FindResult> {
        let cancel = &options.cancel;
        let selector = match options.work_dir {
            Some(ref dir) => options.selector.clone().with_work_dir(dir),
            None => options.selector.clone(),
        };
        let default_dir = options
            .work_dir
            .clone()
            .unwrap_or_else(|| self.cache.default_dir().to_path_buf());

        let mut plan = resolve(&selector, &default_dir, options.fallback);
        if plan.strategy == Strategy::DownloadRelease && plan.version.is_none() {
            let latest = self.releases.latest_version(cancel).await?;
            plan = plan.pin_release(latest, options.fallback);
        }

        match self.acquire(&plan, label, cancel).await {
            Err(InstallError::NotFound { version, platform }) => match plan.fallback {
                Some(ref fallback) => {
                    info!(
                        "No release {} for {}, building {} from source",
                        version, platform, fallback.identifier
                    );
                    self.acquire(fallback, label, cancel).await
                }
                None => Err(InstallError::NotFound { version, platform }),
            },
            other => other,
        }
    }

    async fn acquire(
        &self,
        plan: &ResolutionPlan,
        label: &str,
        cancel: &CancelToken,
    ) -> InstallResult<FindResult> {
        let _guard = self.cache.lock(plan).await;

        if let Some(entry) = self.cache.get(plan).await? {
            let probe = build::probe(&entry.binary, cancel).await?;
            if probe.valid && probe.check(&plan.expectation).is_ok() {
                info!("Using cached {} at {}", plan.identifier, entry.binary.display());
                return Ok(FindResult {
                    path: entry.binary,
                    version: probe.version_string(),
                    strategy: plan.strategy,
                    cache_hit: true,
                });
            }
            warn!(
                "Cached binary {} is no longer usable, acquiring again",
                entry.binary.display()
            );
            self.cache.invalidate(plan).await?;
        }

        let result = match plan.strategy {
            Strategy::BuildFromSource => self.build_from_source(plan, cancel).await?,
            Strategy::DownloadRelease => self.download_release(plan, cancel).await?,
        };
        result.check(&plan.expectation)?;

        let version = result.version_string();
        self.cache
            .put(plan, label, &result.binary, &version)
            .await?;

        Ok(FindResult {
            path: result.binary,
            version,
            strategy: plan.strategy,
            cache_hit: false,
        })
    }

    async fn build_from_source(
        &self,
        plan: &ResolutionPlan,
        cancel: &CancelToken,
    ) -> InstallResult<BuildResult> {
        let source = plan.source.as_ref().ok_or_else(|| {
            InstallError::invalid_selector(&plan.identifier, "source build without a git ref")
        })?;
        let checkout = plan.entry_dir().join("src");

        let source_dir = self.fetcher.fetch(source, &checkout, cancel).await?;
        self.builder.build(&source_dir, cancel).await
    }

    async fn download_release(
        &self,
        plan: &ResolutionPlan,
        cancel: &CancelToken,
    ) -> InstallResult<BuildResult> {
        let version = plan.version.as_ref().ok_or_else(|| {
            InstallError::invalid_selector(&plan.identifier, "release without a version")
        })?;
        self.releases
            .fetch_release(version, &plan.entry_dir(), cancel)
            .await
    }
}

/// Find a binary using the default configuration and work directory
pub async fn find(options: FindOptions) -> InstallResult<FindResult> {
    let config = Config::default();
    let cache = Arc::new(BinaryCache::new(ConfigManager::work_dir(&config)));
    Installer::from_config(&config, cache).find(options).await
}
