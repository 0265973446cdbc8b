//! Work item data model shared by acquisition, extraction and the pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::key_for;

/// One candidate document moving through the pipeline.
///
/// `title` and `source_url` form the item's identity and drive cache-key
/// derivation; they are never modified after discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    title: String,
    source_url: String,
    /// Reference found alongside the item during discovery (e.g. a lower
    /// court case number). Opaque to the pipeline.
    #[serde(default)]
    pub discovered_reference: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
}

impl WorkItem {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self { title: title.into(), source_url: source_url.into(), discovered_reference: None, status: ItemStatus::Discovered }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.discovered_reference = Some(reference.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Cache key derived from the item's identity.
    pub fn cache_key(&self) -> String {
        key_for(&self.title, &self.source_url)
    }
}

/// What a fetched resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// HTML page listing downloadable resources.
    Listing,
    /// Binary document artifact.
    Document,
}

/// A resource obtained for a work item. Only the artifact file outlives the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredResource {
    pub url: String,
    pub content_kind: ContentKind,
    /// Variant of the resource (e.g. `standard`, `with_metadata`).
    pub subtype: String,
    pub local_path: PathBuf,
    pub size: u64,
    pub from_cache: bool,
}

/// Outcome of the filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterVerdict {
    Pass,
    Reject,
}

/// Outcome of the acquisition stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireState {
    Full,
    Partial,
    /// Every resource was already present; nothing was fetched.
    Cached,
    Failed,
}

/// Outcome of the analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeState {
    Success,
    Cached,
    Failed,
}

/// Per-item state machine.
///
/// `Discovered -> Filtered -> Acquired -> Analyzed -> Reported`, where a
/// rejected or failed item jumps straight to `Reported` and analysis may be
/// skipped entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "stage", content = "outcome", rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Discovered,
    Filtered(FilterVerdict),
    Acquired(AcquireState),
    Analyzed(AnalyzeState),
    Reported,
}

impl ItemStatus {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        match (self, next) {
            (Discovered, Filtered(_)) => true,
            (Filtered(FilterVerdict::Pass), Acquired(_)) => true,
            (Filtered(FilterVerdict::Reject), Reported) => true,
            (Acquired(AcquireState::Failed), Analyzed(_)) => false,
            (Acquired(_), Analyzed(_)) => true,
            (Acquired(_), Reported) => true,
            (Analyzed(_), Reported) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_depends_on_identity_only() {
        let a = WorkItem::new("X v Y", "http://example/case/1");
        let b = WorkItem::new("X v Y", "http://example/case/1").with_reference("HCCC 12/2019");
        let c = WorkItem::new("X v Z", "http://example/case/1");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            ItemStatus::Discovered,
            ItemStatus::Filtered(FilterVerdict::Pass),
            ItemStatus::Acquired(AcquireState::Partial),
            ItemStatus::Analyzed(AnalyzeState::Success),
            ItemStatus::Reported,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_rejected_and_failed_items_skip_to_reported() {
        assert!(ItemStatus::Filtered(FilterVerdict::Reject).can_advance_to(ItemStatus::Reported));
        assert!(!ItemStatus::Filtered(FilterVerdict::Reject).can_advance_to(ItemStatus::Acquired(AcquireState::Full)));
        assert!(ItemStatus::Acquired(AcquireState::Failed).can_advance_to(ItemStatus::Reported));
        assert!(!ItemStatus::Acquired(AcquireState::Failed).can_advance_to(ItemStatus::Analyzed(AnalyzeState::Success)));
    }

    #[test]
    fn test_no_skipping_filter() {
        assert!(!ItemStatus::Discovered.can_advance_to(ItemStatus::Acquired(AcquireState::Full)));
        assert!(!ItemStatus::Reported.can_advance_to(ItemStatus::Discovered));
        assert!(ItemStatus::Reported.is_terminal());
    }

    #[test]
    fn test_work_item_deserializes_without_status() {
        let item: WorkItem =
            serde_json::from_str(r#"{"title": "A v B", "source_url": "https://example.com/cases/view/1"}"#).unwrap();
        assert_eq!(item.status, ItemStatus::Discovered);
        assert!(item.discovered_reference.is_none());
    }

    #[test]
    fn test_status_serialization_shape() {
        let json = serde_json::to_value(ItemStatus::Acquired(AcquireState::Partial)).unwrap();
        assert_eq!(json, serde_json::json!({"stage": "acquired", "outcome": "partial"}));
    }
}
