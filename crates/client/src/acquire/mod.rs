//! Resilient, idempotent acquisition of work item resources.
//!
//! ### Algorithm
//! 1. A cache record marked `downloaded` whose artifacts all exist on disk
//!    with non-zero size short-circuits the item; metadata and disk must agree.
//! 2. Otherwise the source URL is fetched. If it answers with a document
//!    content type it is the item's only resource; if it is a listing page,
//!    export links are discovered and each is fetched independently.
//! 3. Every fetch goes through the retry driver (identity rotation, linear
//!    backoff) and the politeness gate, and is accepted only if it passes
//!    the response rules.
//! 4. Acquired artifacts are recorded in the cache store. Some-but-not-all
//!    resources acquired is a partial outcome, not a failure.
//!
//! Transport errors and validation rejections never leave this module; they
//! surface only as `RetryBudgetExhausted`.

pub mod artifact;
pub mod links;

pub use links::{ResourceLink, SUBTYPE_STANDARD, SUBTYPE_WITH_METADATA, discover_resources};

use crate::fetch::{
    FetchRequest, FetchResponse, HttpTransport, PolitenessGate, Rejection, ResponseRules, RetryExhausted, RetryPolicy,
    TransportError, UrlError, canonicalize, external_id,
};
use artifact::{artifact_path, existing_size};
use chrono::Utc;
use docket_core::{AcquiredResource, AppConfig, CacheStore, ContentKind, WorkItem, model::AcquireState};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Acquisition errors visible to callers.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("INVALID_URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("INVALID_INPUT: export link pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Every attempt at one resource failed.
    #[error("RETRY_BUDGET_EXHAUSTED: {url}: {source}")]
    RetryBudgetExhausted {
        url: String,
        #[source]
        source: RetryExhausted,
    },

    /// The listing page carried no downloadable resources.
    #[error("NO_RESOURCES: no downloadable resources found at {0}")]
    NoResources(String),

    /// Resources were found but none could be acquired.
    #[error("ALL_RESOURCES_FAILED: {failed} of {found} resources failed, first: {first}")]
    AllResourcesFailed { found: usize, failed: usize, first: String },

    #[error("ARTIFACT_ERROR: {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cache(#[from] docket_core::Error),
}

impl AcquireError {
    fn artifact(path: &Path, source: std::io::Error) -> Self {
        AcquireError::Artifact { path: path.to_path_buf(), source }
    }
}

/// Why a single attempt failed. Both variants are retried.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
}

/// Acquisition settings.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub output_dir: PathBuf,
    pub timeout: Duration,
    pub rules: ResponseRules,
    pub export_pattern: Regex,
}

impl AcquireConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, AcquireError> {
        let defaults = AppConfig::default();
        Ok(Self {
            output_dir: output_dir.into(),
            timeout: defaults.timeout(),
            rules: ResponseRules::default(),
            export_pattern: Regex::new(&defaults.export_link_pattern)?,
        })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, AcquireError> {
        Ok(Self {
            output_dir: config.output_dir.clone(),
            timeout: config.timeout(),
            rules: ResponseRules {
                document_content_types: config.document_content_types.clone(),
                max_bytes: config.max_bytes,
            },
            export_pattern: Regex::new(&config.export_link_pattern)?,
        })
    }
}

/// A resource that could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub url: String,
    pub subtype: String,
    pub reason: String,
}

/// Result of acquiring one work item.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    /// Already acquired in an earlier run; nothing was fetched.
    Cached { resources: Vec<AcquiredResource> },
    Full { resources: Vec<AcquiredResource> },
    Partial { resources: Vec<AcquiredResource>, failures: Vec<ResourceFailure> },
}

impl AcquisitionOutcome {
    pub fn resources(&self) -> &[AcquiredResource] {
        match self {
            AcquisitionOutcome::Cached { resources }
            | AcquisitionOutcome::Full { resources }
            | AcquisitionOutcome::Partial { resources, .. } => resources,
        }
    }

    pub fn failures(&self) -> &[ResourceFailure] {
        match self {
            AcquisitionOutcome::Partial { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn state(&self) -> AcquireState {
        match self {
            AcquisitionOutcome::Cached { .. } => AcquireState::Cached,
            AcquisitionOutcome::Full { .. } => AcquireState::Full,
            AcquisitionOutcome::Partial { .. } => AcquireState::Partial,
        }
    }
}

/// Artifact entry stored in the cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactEntry {
    url: String,
    subtype: String,
    path: PathBuf,
    size: u64,
}

/// Acquires work item resources.
pub struct Acquirer {
    transport: Arc<dyn HttpTransport>,
    store: CacheStore,
    policy: RetryPolicy,
    gate: PolitenessGate,
    config: AcquireConfig,
}

impl Acquirer {
    pub fn new(transport: Arc<dyn HttpTransport>, store: CacheStore, policy: RetryPolicy, config: AcquireConfig) -> Self {
        Self { transport, store, policy, gate: PolitenessGate::disabled(), config }
    }

    /// Space every remote call through `gate`.
    pub fn with_politeness(mut self, gate: PolitenessGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn config(&self) -> &AcquireConfig {
        &self.config
    }

    /// Fetch `url` until a response passes the rules for `kind` or the retry
    /// budget runs out.
    pub async fn fetch_validated(&self, url: &Url, kind: ContentKind) -> Result<FetchResponse, AcquireError> {
        self.policy
            .run(url.as_str(), |attempt| {
                let request = FetchRequest { url: url.clone(), profile: attempt.profile, timeout: self.config.timeout };
                async move {
                    self.gate.wait().await;
                    let response = self.transport.get(&request).await?;
                    self.config.rules.check(&response, kind)?;
                    Ok::<_, AttemptError>(response)
                }
            })
            .await
            .map_err(|source| AcquireError::RetryBudgetExhausted { url: url.to_string(), source })
    }

    /// Acquire every resource of `item`, skipping work already done.
    pub async fn acquire(&self, item: &WorkItem) -> Result<AcquisitionOutcome, AcquireError> {
        let key = item.cache_key();

        if let Some(resources) = self.cached_resources(&key).await {
            tracing::info!(title = item.title(), key = %key, resources = resources.len(), "already acquired, skipping");
            return Ok(AcquisitionOutcome::Cached { resources });
        }

        let source = canonicalize(item.source_url())?;
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| AcquireError::artifact(&self.config.output_dir, e))?;

        let listing = self.fetch_validated(&source, ContentKind::Listing).await?;
        let id = external_id(&source);

        let mut resources = Vec::new();
        let mut failures = Vec::new();
        let found;

        if self.config.rules.is_document_type(listing.content_type.as_deref()) {
            tracing::debug!(url = %source, "source answered with a document");
            found = 1;
            let path = artifact_path(&self.config.output_dir, item.title(), id.as_deref(), SUBTYPE_STANDARD);
            let size = self.write_artifact(&path, &listing.bytes).await?;
            resources.push(AcquiredResource {
                url: source.to_string(),
                content_kind: ContentKind::Document,
                subtype: SUBTYPE_STANDARD.to_string(),
                local_path: path,
                size,
                from_cache: false,
            });
        } else {
            let links = discover_resources(&listing.text(), &listing.final_url, &self.config.export_pattern);
            if links.is_empty() {
                return Err(AcquireError::NoResources(source.to_string()));
            }
            found = links.len();
            tracing::debug!(url = %source, found, "discovered resources");

            let mut used = HashSet::new();
            for (index, link) in links.iter().enumerate() {
                let mut path = artifact_path(&self.config.output_dir, item.title(), id.as_deref(), &link.subtype);
                if !used.insert(path.clone()) {
                    let subtype = format!("{}_{index}", link.subtype);
                    path = artifact_path(&self.config.output_dir, item.title(), id.as_deref(), &subtype);
                    used.insert(path.clone());
                }

                match self.fetch_document(link, path).await {
                    Ok(resource) => resources.push(resource),
                    Err(e) => {
                        tracing::warn!(url = %link.url, subtype = %link.subtype, error = %e, "resource not acquired");
                        failures.push(ResourceFailure {
                            url: link.url.clone(),
                            subtype: link.subtype.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if resources.is_empty() {
            let first = failures.first().map(|f| f.reason.clone()).unwrap_or_default();
            return Err(AcquireError::AllResourcesFailed { found, failed: failures.len(), first });
        }

        self.record(&key, item, &resources, found).await?;

        tracing::info!(
            title = item.title(),
            acquired = resources.len(),
            failed = failures.len(),
            "acquisition finished"
        );

        if failures.is_empty() {
            Ok(AcquisitionOutcome::Full { resources })
        } else {
            Ok(AcquisitionOutcome::Partial { resources, failures })
        }
    }

    /// Resources recorded for `key`, if the record says downloaded and every
    /// artifact is still on disk.
    async fn cached_resources(&self, key: &str) -> Option<Vec<AcquiredResource>> {
        let record = self.store.get(key).await?;
        if !record.flags.downloaded {
            return None;
        }

        let entries: Vec<ArtifactEntry> = match record.field("artifacts") {
            Some(artifacts) => serde_json::from_value(artifacts.clone()).ok()?,
            None => {
                let path = record.field("artifact_path")?.as_str()?;
                let url = record.field("source_url").and_then(|v| v.as_str()).unwrap_or_default();
                vec![ArtifactEntry { url: url.into(), subtype: SUBTYPE_STANDARD.into(), path: path.into(), size: 0 }]
            }
        };

        if entries.is_empty() {
            return None;
        }

        let mut resources = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(size) = existing_size(&entry.path).await else {
                tracing::info!(key, path = %entry.path.display(), "cached artifact missing on disk, refetching");
                return None;
            };
            resources.push(AcquiredResource {
                url: entry.url,
                content_kind: ContentKind::Document,
                subtype: entry.subtype,
                local_path: entry.path,
                size,
                from_cache: true,
            });
        }

        Some(resources)
    }

    async fn fetch_document(&self, link: &ResourceLink, path: PathBuf) -> Result<AcquiredResource, AcquireError> {
        if let Some(size) = existing_size(&path).await {
            tracing::debug!(path = %path.display(), size, "artifact already on disk");
            return Ok(AcquiredResource {
                url: link.url.clone(),
                content_kind: ContentKind::Document,
                subtype: link.subtype.clone(),
                local_path: path,
                size,
                from_cache: true,
            });
        }

        let url = canonicalize(&link.url)?;
        let response = self.fetch_validated(&url, ContentKind::Document).await?;
        let size = self.write_artifact(&path, &response.bytes).await?;

        Ok(AcquiredResource {
            url: link.url.clone(),
            content_kind: ContentKind::Document,
            subtype: link.subtype.clone(),
            local_path: path,
            size,
            from_cache: false,
        })
    }

    async fn write_artifact(&self, path: &Path, bytes: &[u8]) -> Result<u64, AcquireError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| AcquireError::artifact(path, e))?;

        let size = existing_size(path).await.ok_or_else(|| {
            AcquireError::artifact(path, std::io::Error::other("artifact missing or empty after write"))
        })?;
        tracing::info!(path = %path.display(), size, "artifact saved");
        Ok(size)
    }

    async fn record(
        &self, key: &str, item: &WorkItem, resources: &[AcquiredResource], found: usize,
    ) -> Result<(), AcquireError> {
        let artifacts: Vec<ArtifactEntry> = resources
            .iter()
            .map(|r| ArtifactEntry { url: r.url.clone(), subtype: r.subtype.clone(), path: r.local_path.clone(), size: r.size })
            .collect();
        let total: u64 = resources.iter().map(|r| r.size).sum();

        let partial = json!({
            "title": item.title(),
            "source_url": item.source_url(),
            "downloaded": true,
            "artifact_path": resources[0].local_path,
            "size": total,
            "artifacts": artifacts,
            "total_resources_found": found,
            "downloaded_at": Utc::now().to_rfc3339(),
        });

        self.store
            .put_or_merge(key, partial.as_object().cloned().unwrap_or_default())
            .await?;
        Ok(())
    }
}
