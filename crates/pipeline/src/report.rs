//! Run report: one entry per discovered item plus stage counters.

use chrono::{DateTime, Utc};
use docket_client::ResourceFailure;
use docket_core::{AcquireState, AcquiredResource, AnalyzeState, CacheStatistics, FilterVerdict, ItemStatus, WorkItem};
use serde::Serialize;

use crate::error::StageError;

/// Stage an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquisition,
    Analysis,
}

/// Winning extraction strategy for an analyzed item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionSummary {
    pub strategy: String,
    pub confidence: f64,
}

/// Everything that happened to one item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    /// Position in the input batch.
    pub index: usize,
    pub title: String,
    pub source_url: String,
    pub cache_key: String,
    pub filter: Option<FilterVerdict>,
    pub acquisition: Option<AcquireState>,
    pub analysis: Option<AnalyzeState>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<AcquiredResource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_failures: Vec<ResourceFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every status the item passed through, ending in `Reported`.
    pub history: Vec<ItemStatus>,
}

impl ItemReport {
    pub fn new(index: usize, item: &WorkItem) -> Self {
        Self {
            index,
            title: item.title().to_string(),
            source_url: item.source_url().to_string(),
            cache_key: item.cache_key(),
            filter: None,
            acquisition: None,
            analysis: None,
            resources: Vec::new(),
            resource_failures: Vec::new(),
            extraction: None,
            failed_stage: None,
            error: None,
            history: vec![ItemStatus::Discovered],
        }
    }

    pub fn status(&self) -> ItemStatus {
        self.history.last().copied().unwrap_or_default()
    }

    /// Move to `next`. Illegal transitions are logged and still recorded so
    /// the history shows them.
    pub fn advance(&mut self, next: ItemStatus) {
        let current = self.status();
        if !current.can_advance_to(next) {
            tracing::error!(index = self.index, ?current, ?next, "illegal item transition");
        }
        match next {
            ItemStatus::Filtered(verdict) => self.filter = Some(verdict),
            ItemStatus::Acquired(state) => self.acquisition = Some(state),
            ItemStatus::Analyzed(state) => self.analysis = Some(state),
            ItemStatus::Discovered | ItemStatus::Reported => {}
        }
        self.history.push(next);
    }

    /// Record a stage failure.
    pub fn fail(&mut self, stage: Option<Stage>, error: &StageError) {
        tracing::warn!(index = self.index, title = %self.title, ?stage, error = %error, "item failed");
        self.failed_stage = stage;
        self.error = Some(error.to_string());
    }

    /// Close the item from whatever state it reached. Idempotent.
    pub fn finish(mut self) -> Self {
        if !self.status().is_terminal() {
            self.history.push(ItemStatus::Reported);
        }
        self
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-stage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageCounters {
    pub total: usize,
    pub filtered_pass: usize,
    pub filtered_reject: usize,
    pub acquired_full: usize,
    pub acquired_partial: usize,
    pub acquired_cached: usize,
    pub acquired_failed: usize,
    pub analyzed_success: usize,
    pub analyzed_cached: usize,
    pub analyzed_failed: usize,
    /// Items carrying an error, whatever the stage.
    pub failed: usize,
}

impl StageCounters {
    fn count(items: &[ItemReport]) -> Self {
        let mut counters = StageCounters { total: items.len(), ..Default::default() };
        for item in items {
            match item.filter {
                Some(FilterVerdict::Pass) => counters.filtered_pass += 1,
                Some(FilterVerdict::Reject) => counters.filtered_reject += 1,
                None => {}
            }
            match item.acquisition {
                Some(AcquireState::Full) => counters.acquired_full += 1,
                Some(AcquireState::Partial) => counters.acquired_partial += 1,
                Some(AcquireState::Cached) => counters.acquired_cached += 1,
                Some(AcquireState::Failed) => counters.acquired_failed += 1,
                None => {}
            }
            match item.analysis {
                Some(AnalyzeState::Success) => counters.analyzed_success += 1,
                Some(AnalyzeState::Cached) => counters.analyzed_cached += 1,
                Some(AnalyzeState::Failed) => counters.analyzed_failed += 1,
                None => {}
            }
            if item.is_failed() {
                counters.failed += 1;
            }
        }
        counters
    }
}

/// How the run ended. A crashed run produces no report at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// Items existed and every one of them failed.
    CompletedWithAllFailures,
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub counters: StageCounters,
    pub cache: CacheStatistics,
    /// Sorted by input position.
    pub items: Vec<ItemReport>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, mut items: Vec<ItemReport>, cache: CacheStatistics) -> Self {
        items.sort_by_key(|item| item.index);
        let counters = StageCounters::count(&items);
        let outcome = if !items.is_empty() && counters.failed == items.len() {
            RunOutcome::CompletedWithAllFailures
        } else {
            RunOutcome::Completed
        };

        Self { started_at, finished_at: Utc::now(), outcome, counters, cache, items }
    }

    pub fn item(&self, index: usize) -> Option<&ItemReport> {
        self.items.iter().find(|item| item.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize) -> ItemReport {
        ItemReport::new(index, &WorkItem::new(format!("Item {index}"), format!("https://example.org/{index}")))
    }

    #[test]
    fn test_history_ends_in_reported() {
        let mut item = report(0);
        item.advance(ItemStatus::Filtered(FilterVerdict::Pass));
        item.advance(ItemStatus::Acquired(AcquireState::Full));
        let item = item.finish().finish();

        assert_eq!(item.filter, Some(FilterVerdict::Pass));
        assert_eq!(item.acquisition, Some(AcquireState::Full));
        assert_eq!(item.history.len(), 4);
        assert_eq!(item.status(), ItemStatus::Reported);
    }

    #[test]
    fn test_items_sorted_and_counted() {
        let mut failed = report(2);
        failed.advance(ItemStatus::Filtered(FilterVerdict::Pass));
        failed.advance(ItemStatus::Acquired(AcquireState::Failed));
        failed.fail(Some(Stage::Acquisition), &StageError::Panicked("boom".into()));

        let mut rejected = report(0);
        rejected.advance(ItemStatus::Filtered(FilterVerdict::Reject));

        let mut ok = report(1);
        ok.advance(ItemStatus::Filtered(FilterVerdict::Pass));
        ok.advance(ItemStatus::Acquired(AcquireState::Partial));

        let items = vec![failed.finish(), rejected.finish(), ok.finish()];
        let run = RunReport::new(Utc::now(), items, CacheStatistics::default());

        assert_eq!(run.items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(run.counters.filtered_pass, 2);
        assert_eq!(run.counters.filtered_reject, 1);
        assert_eq!(run.counters.acquired_partial, 1);
        assert_eq!(run.counters.acquired_failed, 1);
        assert_eq!(run.counters.failed, 1);
        assert_eq!(run.outcome, RunOutcome::Completed);
    }

    #[test]
    fn test_all_failures_outcome() {
        let mut only = report(0);
        only.fail(None, &StageError::Panicked("boom".into()));
        let run = RunReport::new(Utc::now(), vec![only.finish()], CacheStatistics::default());
        assert_eq!(run.outcome, RunOutcome::CompletedWithAllFailures);

        let empty = RunReport::new(Utc::now(), Vec::new(), CacheStatistics::default());
        assert_eq!(empty.outcome, RunOutcome::Completed);
    }

    #[test]
    fn test_serialized_shape() {
        let run = RunReport::new(Utc::now(), vec![report(0).finish()], CacheStatistics::default());
        let json = serde_json::to_value(&run).unwrap();

        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["items"][0]["history"][1]["stage"], "reported");
        assert!(json["items"][0].get("error").is_none());
    }
}
