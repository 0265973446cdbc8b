//! Analysis stage: prompt the generator, extract a structured record, merge
//! it into the item's cache record.

use chrono::Utc;
use docket_client::{ExtractionEngine, TextGenerator, document_text, truncate_chars};
use docket_core::{AcquiredResource, CacheStore, WorkItem};
use serde_json::json;
use std::sync::Arc;

use crate::error::StageError;
use crate::report::ExtractionSummary;

/// Prompt used when none is configured.
///
/// Placeholders: `{title}`, `{url}`, `{reference}`, `{artifacts}`,
/// `{document}` (artifact text, truncated to the text budget) and `{field}`
/// (the required top-level field).
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are analyzing a court decision.

Title: {title}
Source: {url}
Known lower court reference: {reference}
Downloaded documents:
{artifacts}

Document text:
{document}

Identify the appellate decision and the trial court proceedings it arose from.
Respond with one JSON object inside a ```json fenced block. The object must
have a top-level \"{field}\" array; each entry should carry title, court_level,
case_number, date, url and trial_reference.";

/// Substitute `{name}` placeholders in one pass. Unknown placeholders are
/// left as written, and substituted text is never re-scanned.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replacement = after
            .find('}')
            .and_then(|close| values.iter().find(|(name, _)| *name == &after[..close]).map(|(_, v)| (close, *v)));

        match replacement {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn describe_artifacts(resources: &[AcquiredResource]) -> String {
    if resources.is_empty() {
        return "(none)".to_string();
    }
    resources
        .iter()
        .map(|r| format!("- {} ({} bytes): {}", r.subtype, r.size, r.local_path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Characters of artifact text placed in a prompt when none is configured.
pub const DEFAULT_DOCUMENT_TEXT_BUDGET: usize = 8_000;

const NO_DOCUMENT_TEXT: &str = "(no document text available)";

/// Text of every readable artifact, in order, cut to `budget` characters.
/// Unreadable artifacts are logged and skipped.
pub async fn document_excerpt(resources: &[AcquiredResource], budget: usize) -> String {
    let mut sections = Vec::new();
    let mut chars = 0;

    for resource in resources {
        if chars >= budget {
            break;
        }
        match document_text(&resource.local_path).await {
            Ok(text) => {
                chars += text.chars().count();
                sections.push(format!("[{}]\n{text}", resource.subtype));
            }
            Err(e) => {
                tracing::warn!(path = %resource.local_path.display(), error = %e, "artifact text unavailable");
            }
        }
    }

    if sections.is_empty() {
        return NO_DOCUMENT_TEXT.to_string();
    }

    let joined = sections.join("\n\n");
    let excerpt = truncate_chars(&joined, budget);
    if excerpt.len() < joined.len() {
        tracing::debug!(budget, "document text truncated for prompt");
    }
    excerpt.to_string()
}

/// Result of analyzing one item.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// The cache record was already analyzed; nothing was generated.
    Cached,
    Analyzed(ExtractionSummary),
}

/// Generator plus extraction engine for the analysis stage.
pub struct Analysis {
    generator: Arc<dyn TextGenerator>,
    engine: ExtractionEngine,
    template: String,
    required_field: String,
    text_budget: usize,
}

impl Analysis {
    pub fn new(generator: Arc<dyn TextGenerator>, engine: ExtractionEngine, required_field: impl Into<String>) -> Self {
        Self {
            generator,
            engine,
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            required_field: required_field.into(),
            text_budget: DEFAULT_DOCUMENT_TEXT_BUDGET,
        }
    }

    /// Characters of artifact text allowed into the prompt.
    pub fn with_text_budget(mut self, budget: usize) -> Self {
        self.text_budget = budget;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn required_field(&self) -> &str {
        &self.required_field
    }

    pub fn render_prompt(&self, item: &WorkItem, resources: &[AcquiredResource], document: &str) -> String {
        let artifacts = describe_artifacts(resources);
        render_template(
            &self.template,
            &[
                ("title", item.title()),
                ("url", item.source_url()),
                ("reference", item.discovered_reference.as_deref().unwrap_or("unknown")),
                ("artifacts", &artifacts),
                ("document", document),
                ("field", &self.required_field),
            ],
        )
    }

    /// Analyze `item` unless its record is already analyzed.
    pub async fn analyze(
        &self, item: &WorkItem, resources: &[AcquiredResource], store: &CacheStore,
    ) -> Result<AnalysisOutcome, StageError> {
        let key = item.cache_key();
        if store.get(&key).await.is_some_and(|record| record.flags.analyzed) {
            tracing::debug!(key = %key, "already analyzed, skipping");
            return Ok(AnalysisOutcome::Cached);
        }

        let document = document_excerpt(resources, self.text_budget).await;
        let prompt = self.render_prompt(item, resources, &document);
        let text = self.generator.generate(&prompt).await?;
        let result = self.engine.extract(&text, &self.required_field).await;

        let (Some(payload), Some(strategy)) = (result.payload, result.strategy) else {
            return Err(StageError::ExtractionExhausted(self.required_field.clone()));
        };

        let summary = ExtractionSummary { strategy: strategy.to_string(), confidence: result.confidence };
        let partial = json!({
            "title": item.title(),
            "source_url": item.source_url(),
            "analyzed": true,
            "analysis": payload,
            "strategy": summary.strategy,
            "confidence": summary.confidence,
            "analyzed_at": Utc::now().to_rfc3339(),
        });
        store.put_or_merge(&key, partial.as_object().cloned().unwrap_or_default()).await?;

        tracing::info!(title = item.title(), strategy = %summary.strategy, "item analyzed");
        Ok(AnalysisOutcome::Analyzed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docket_client::GenerateError;
    use docket_core::ContentKind;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: String,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: reply.to_string(), calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn artifact(dir: &Path, name: &str, contents: &str) -> AcquiredResource {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        AcquiredResource {
            url: format!("https://x.org/export/{name}"),
            content_kind: ContentKind::Document,
            subtype: "standard".into(),
            local_path: path,
            size: contents.len() as u64,
            from_cache: false,
        }
    }

    #[tokio::test]
    async fn test_document_excerpt_reads_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let html = artifact(
            dir.path(),
            "judgment.html",
            "<html><body><h1>Republic v Doe</h1><p>Appeal from the High Court at Nairobi.</p></body></html>",
        );

        let full = document_excerpt(std::slice::from_ref(&html), 1_000).await;
        assert_eq!(full, "[standard]\nRepublic v Doe Appeal from the High Court at Nairobi.");

        let cut = document_excerpt(&[html], 20).await;
        assert_eq!(cut, "[standard]\nRepublic ");
        assert_eq!(cut.chars().count(), 20);
    }

    #[tokio::test]
    async fn test_document_excerpt_skips_unreadable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let broken = artifact(dir.path(), "broken.pdf", "%PDF-1.4 not really a pdf");
        assert_eq!(document_excerpt(std::slice::from_ref(&broken), 100).await, "(no document text available)");

        let text = artifact(dir.path(), "notes.txt", "Court of Appeal ruling");
        assert_eq!(document_excerpt(&[broken, text], 100).await, "[standard]\nCourt of Appeal ruling");
    }

    #[tokio::test]
    async fn test_prompt_carries_document_text() {
        let dir = tempfile::tempdir().unwrap();
        let resource = artifact(dir.path(), "judgment.html", "<html><body><p>Held: appeal dismissed with costs.</p></body></html>");
        let generator = Canned::new("```json\n{\"cases\": []}\n```");
        let analysis = Analysis::new(generator.clone(), ExtractionEngine::new(), "cases").with_text_budget(30);
        let store = CacheStore::open_in_memory();

        analysis.analyze(&WorkItem::new("A v B", "https://x.org/1"), &[resource], &store).await.unwrap();

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Document text:\n[standard]\nHeld: appeal dismis\n"));
        assert!(!prompts[0].contains("with costs"));
    }

    #[test]
    fn test_render_template_single_pass() {
        let rendered = render_template("{title} at {url} {unknown} {", &[("title", "{url}"), ("url", "u")]);
        assert_eq!(rendered, "{url} at u {unknown} {");
    }

    #[test]
    fn test_render_prompt_fills_placeholders() {
        let analysis = Analysis::new(Canned::new(""), ExtractionEngine::new(), "cases")
            .with_template("{title}|{url}|{reference}|{artifacts}|{document}|{field}");
        let item = WorkItem::new("A v B", "https://x.org/1");

        assert_eq!(analysis.render_prompt(&item, &[], "text"), "A v B|https://x.org/1|unknown|(none)|text|cases");
    }

    #[tokio::test]
    async fn test_analyze_merges_and_then_skips() {
        let generator = Canned::new("```json\n{\"cases\": [{\"title\": \"A v B\"}]}\n```");
        let analysis = Analysis::new(generator.clone(), ExtractionEngine::new(), "cases");
        let store = CacheStore::open_in_memory();
        let item = WorkItem::new("A v B", "https://x.org/1");

        let outcome = analysis.analyze(&item, &[], &store).await.unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Analyzed(ref s) if s.strategy == "tagged_block"));

        let record = store.get(&item.cache_key()).await.unwrap();
        assert!(record.flags.analyzed);
        assert_eq!(record.field("analysis").unwrap()["cases"][0]["title"], "A v B");

        let again = analysis.analyze(&item, &[], &store).await.unwrap();
        assert_eq!(again, AnalysisOutcome::Cached);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_exhaustion() {
        let analysis = Analysis::new(Canned::new("sorry, no idea"), ExtractionEngine::new(), "cases");
        let store = CacheStore::open_in_memory();

        let err = analysis.analyze(&WorkItem::new("A v B", "https://x.org/1"), &[], &store).await.unwrap_err();
        assert!(matches!(err, StageError::ExtractionExhausted(_)));
        assert_eq!(store.statistics().await.total, 0);
    }
}
