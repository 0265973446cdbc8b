//! Audit trail for extraction input.
//!
//! Each call writes the raw text and the winning strategy to its own file.
//! Write failures are logged and otherwise ignored.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Directory of extraction audit files.
#[derive(Debug)]
pub struct AuditLog {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), sequence: AtomicU64::new(0) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record `raw_text` under `label`. Returns the written path, or `None`
    /// if the write failed.
    pub async fn record(&self, label: &str, raw_text: &str, strategy: &str, required_field: &str) -> Option<PathBuf> {
        let now = Utc::now();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = self
            .dir
            .join(format!("{label}_{}_{sequence:04}.txt", now.format("%Y%m%d_%H%M%S%.6f")));

        let contents = format!(
            "recorded_at: {}\nstrategy: {strategy}\nrequired_field: {required_field}\nlength: {}\n\n{raw_text}",
            now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            raw_text.len(),
        );

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&path, contents).await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), strategy, "extraction input recorded");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "failed to record extraction input");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_writes_text_and_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("results"));

        let path = log.record("extraction", "raw llm text", "tagged_block", "cases").await.unwrap();
        let written = std::fs::read_to_string(path).unwrap();

        assert!(written.contains("strategy: tagged_block"));
        assert!(written.contains("required_field: cases"));
        assert!(written.ends_with("raw llm text"));
    }

    #[tokio::test]
    async fn test_record_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());

        let a = log.record("extraction", "a", "exhausted", "cases").await.unwrap();
        let b = log.record("extraction", "b", "exhausted", "cases").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let log = AuditLog::new(blocker.join("nested"));
        assert!(log.record("extraction", "text", "exhausted", "cases").await.is_none());
    }
}
