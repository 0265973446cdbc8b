//! Pipeline coordinator.
//!
//! Drives every item through `Discovered -> Filtered -> Acquired ->
//! Analyzed -> Reported`. Items run as concurrent tasks bounded by a
//! semaphore; a failure or panic in one task is recorded against that item
//! only. The run itself fails only on a precondition checked before the
//! first item starts.

use chrono::Utc;
use docket_client::{
    AcquireConfig, Acquirer, AuditLog, ChatCompletionsClient, ExtractionEngine, FetchConfig, HttpTransport,
    IdentityPool, LlmConfig, PolitenessGate, ReqwestTransport, RetryPolicy, TextGenerator,
};
use docket_core::{AcquireState, AnalyzeState, AppConfig, CacheStore, FilterVerdict, ItemStatus, WorkItem};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::analysis::{Analysis, AnalysisOutcome};
use crate::error::{PipelineError, StageError};
use crate::filter::{AcceptAll, ItemFilter};
use crate::report::{ItemReport, RunReport, Stage};

/// Run-wide settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_concurrency: usize,
    /// Attempts per resource, including the first.
    pub retry_budget: u32,
    pub base_delay: Duration,
    pub politeness_delay: Option<Duration>,
    pub identities: IdentityPool,
    pub required_field_name: String,
    /// Characters of artifact text placed in each analysis prompt.
    pub document_text_budget: usize,
    pub acquire: AcquireConfig,
}

impl PipelineOptions {
    /// Defaults writing artifacts to `output_dir`.
    pub fn new(output_dir: impl Into<std::path::PathBuf>) -> Result<Self, PipelineError> {
        let defaults = AppConfig::default();
        let acquire = AcquireConfig::new(output_dir)
            .map_err(|e| PipelineError::precondition("export_link_pattern", e.to_string()))?;
        Ok(Self::with_acquire(&defaults, acquire))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let acquire = AcquireConfig::from_app_config(config)
            .map_err(|e| PipelineError::precondition("export_link_pattern", e.to_string()))?;
        Ok(Self::with_acquire(config, acquire))
    }

    fn with_acquire(config: &AppConfig, acquire: AcquireConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            retry_budget: config.retry_budget,
            base_delay: config.base_delay(),
            politeness_delay: config.politeness_delay(),
            identities: IdentityPool::browsers(),
            required_field_name: config.required_field_name.clone(),
            document_text_budget: config.document_text_budget,
            acquire,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_attempts: self.retry_budget, base_delay: self.base_delay, identities: self.identities.clone() }
    }
}

/// Per-item stage logic, cloned into each task.
#[derive(Clone)]
struct ItemWorker {
    filter: Arc<dyn ItemFilter>,
    acquirer: Arc<Acquirer>,
    analysis: Option<Arc<Analysis>>,
}

impl ItemWorker {
    async fn process(self, index: usize, item: WorkItem) -> ItemReport {
        let mut report = ItemReport::new(index, &item);

        let verdict = self.filter.verdict(&item);
        report.advance(ItemStatus::Filtered(verdict));
        if verdict == FilterVerdict::Reject {
            tracing::debug!(index, title = item.title(), "filtered out");
            return report.finish();
        }

        let outcome = match self.acquirer.acquire(&item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                report.advance(ItemStatus::Acquired(AcquireState::Failed));
                report.fail(Some(Stage::Acquisition), &StageError::from(e));
                return report.finish();
            }
        };
        report.advance(ItemStatus::Acquired(outcome.state()));
        report.resources = outcome.resources().to_vec();
        report.resource_failures = outcome.failures().to_vec();

        if let Some(analysis) = &self.analysis {
            match analysis.analyze(&item, &report.resources, self.acquirer.store()).await {
                Ok(AnalysisOutcome::Cached) => report.advance(ItemStatus::Analyzed(AnalyzeState::Cached)),
                Ok(AnalysisOutcome::Analyzed(summary)) => {
                    report.advance(ItemStatus::Analyzed(AnalyzeState::Success));
                    report.extraction = Some(summary);
                }
                Err(e) => {
                    report.advance(ItemStatus::Analyzed(AnalyzeState::Failed));
                    report.fail(Some(Stage::Analysis), &e);
                }
            }
        }

        report.finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs batches of work items.
pub struct Coordinator {
    options: PipelineOptions,
    filter: Arc<dyn ItemFilter>,
    acquirer: Arc<Acquirer>,
    analysis: Option<Arc<Analysis>>,
}

impl Coordinator {
    pub fn new(transport: Arc<dyn HttpTransport>, store: CacheStore, options: PipelineOptions) -> Self {
        let acquirer = Acquirer::new(transport, store, options.retry_policy(), options.acquire.clone())
            .with_politeness(PolitenessGate::new(options.politeness_delay));

        Self { filter: Arc::new(AcceptAll), acquirer: Arc::new(acquirer), analysis: None, options }
    }

    /// Production wiring from configuration.
    ///
    /// With `analyze` set, a missing LLM credential fails here, before any
    /// item is looked at.
    pub async fn from_config(config: &AppConfig, analyze: bool) -> Result<Self, PipelineError> {
        let options = PipelineOptions::from_config(config)?;

        let fetch = FetchConfig { max_bytes: config.max_bytes, ..FetchConfig::default() };
        let transport =
            ReqwestTransport::new(fetch).map_err(|e| PipelineError::precondition("transport", e.to_string()))?;
        let store = CacheStore::open(&config.cache_path)
            .await
            .map_err(|e| PipelineError::precondition("cache_path", e.to_string()))?;

        let mut coordinator = Self::new(Arc::new(transport), store, options);

        if analyze {
            config.require_llm_api_key()?;
            let llm = LlmConfig::from_app_config(config)
                .map_err(|e| PipelineError::precondition("llm_api_key", e.to_string()))?;
            let client =
                ChatCompletionsClient::new(llm).map_err(|e| PipelineError::precondition("llm_api_key", e.to_string()))?;

            let mut engine = ExtractionEngine::new();
            if let Some(dir) = &config.audit_dir {
                engine = engine.with_audit(AuditLog::new(dir));
            }
            coordinator = coordinator.with_analysis(Arc::new(client), engine);
        }

        Ok(coordinator)
    }

    pub fn with_filter(mut self, filter: impl ItemFilter + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    /// Enable the analysis stage.
    pub fn with_analysis(mut self, generator: Arc<dyn TextGenerator>, engine: ExtractionEngine) -> Self {
        let analysis = Analysis::new(generator, engine, self.options.required_field_name.clone())
            .with_text_budget(self.options.document_text_budget);
        self.analysis = Some(Arc::new(analysis));
        self
    }

    /// Enable the analysis stage with a custom prompt template.
    pub fn with_analysis_template(
        mut self, generator: Arc<dyn TextGenerator>, engine: ExtractionEngine, template: &str,
    ) -> Self {
        let analysis = Analysis::new(generator, engine, self.options.required_field_name.clone())
            .with_text_budget(self.options.document_text_budget)
            .with_template(template);
        self.analysis = Some(Arc::new(analysis));
        self
    }

    pub fn store(&self) -> &CacheStore {
        self.acquirer.store()
    }

    /// Checks run before any item is processed.
    pub async fn check_preconditions(&self) -> Result<(), PipelineError> {
        if self.options.max_concurrency == 0 {
            return Err(PipelineError::precondition("max_concurrency", "must be at least 1"));
        }
        if self.options.retry_budget == 0 {
            return Err(PipelineError::precondition("retry_budget", "must be at least 1"));
        }
        if self.options.required_field_name.trim().is_empty() {
            return Err(PipelineError::precondition("required_field_name", "must not be blank"));
        }

        let output_dir = &self.options.acquire.output_dir;
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            PipelineError::precondition("output_dir", format!("cannot create {}: {e}", output_dir.display()))
        })?;

        Ok(())
    }

    /// Run `items` through every stage.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<RunReport, PipelineError> {
        self.check_preconditions().await?;

        let started_at = Utc::now();
        tracing::info!(
            items = items.len(),
            max_concurrency = self.options.max_concurrency,
            analysis = self.analysis.is_some(),
            "pipeline run started"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));
        let worker = ItemWorker {
            filter: self.filter.clone(),
            acquirer: self.acquirer.clone(),
            analysis: self.analysis.clone(),
        };

        let mut pending = BTreeMap::new();
        let mut join_set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            pending.insert(index, ItemReport::new(index, &item));

            let semaphore = semaphore.clone();
            let worker = worker.clone();
            join_set.spawn(async move {
                // Held until this item is fully processed.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = AssertUnwindSafe(worker.process(index, item)).catch_unwind().await;
                (index, result)
            });
        }

        let mut reports = Vec::with_capacity(pending.len());

        while let Some(joined) = join_set.join_next().await {
            let (index, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(error = %e, "item task did not complete");
                    continue;
                }
            };

            let Some(skeleton) = pending.remove(&index) else {
                continue;
            };

            match result {
                Ok(report) => reports.push(report),
                Err(panic) => {
                    let mut report = skeleton;
                    report.fail(None, &StageError::Panicked(panic_message(panic.as_ref())));
                    reports.push(report.finish());
                }
            }
        }

        for (_, mut report) in pending {
            report.fail(None, &StageError::Panicked("task aborted".into()));
            reports.push(report.finish());
        }

        let report = RunReport::new(started_at, reports, self.store().statistics().await);
        tracing::info!(
            total = report.counters.total,
            failed = report.counters.failed,
            outcome = ?report.outcome,
            "pipeline run finished"
        );
        Ok(report)
    }
}
