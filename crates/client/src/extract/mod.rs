//! Structured record recovery from loosely formatted model output.
//!
//! ### Cascade
//! Strategies run in rank order; the first result that is structurally
//! valid wins:
//! 1. Tagged block: a fenced block tagged `json`.
//! 2. Delimited block: any fenced block, regardless of tag.
//! 3. Balanced span: every balanced `{...}` span, longest valid one wins.
//! 4. Bounding span: first `{` to last `}` as one span.
//! 5. Heuristic: records synthesized from line patterns, at low confidence.
//!
//! ### Structural validity
//! A result is valid when it parses as a JSON object and carries the
//! caller's required top-level field. The engine checks this for every
//! strategy, including ones appended with [`ExtractionEngine::with_strategy`].
//!
//! A strategy that finds nothing returns `None`; only exhaustion of the whole
//! cascade is an extraction failure.

pub mod audit;
pub mod discovery;
pub mod document;
pub mod heuristic;
pub mod spans;

pub use audit::AuditLog;
pub use discovery::{DiscoveryMapping, items_from_payload};
pub use document::{DocumentError, DocumentFormat, document_text, text_from_bytes, truncate_chars};
pub use heuristic::{HeuristicRules, KeywordTag};

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Which strategy produced a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    TaggedBlock,
    DelimitedBlock,
    BalancedSpan,
    BoundingSpan,
    Heuristic,
    Custom(String),
}

impl StrategyKind {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyKind::TaggedBlock => "tagged_block",
            StrategyKind::DelimitedBlock => "delimited_block",
            StrategyKind::BalancedSpan => "balanced_span",
            StrategyKind::BoundingSpan => "bounding_span",
            StrategyKind::Heuristic => "heuristic",
            StrategyKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StrategyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One parsing attempt in the cascade. Must not panic on any input.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Confidence attached to results from this strategy, in `[0, 1]`.
    fn confidence(&self) -> f64;

    fn extract(&self, text: &str, required_field: &str) -> Option<Value>;
}

/// Parse `span` as a JSON object carrying `required_field`.
fn parse_valid(span: &str, required_field: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(span.trim()).ok()?;
    is_valid(&value, required_field).then_some(value)
}

fn is_valid(value: &Value, required_field: &str) -> bool {
    value.as_object().is_some_and(|o| o.contains_key(required_field))
}

/// Fenced blocks tagged as structured data.
#[derive(Debug, Clone)]
pub struct TaggedBlock {
    pub tags: Vec<String>,
}

impl Default for TaggedBlock {
    fn default() -> Self {
        Self { tags: vec!["json".to_string()] }
    }
}

impl Strategy for TaggedBlock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TaggedBlock
    }

    fn confidence(&self) -> f64 {
        1.0
    }

    fn extract(&self, text: &str, required_field: &str) -> Option<Value> {
        spans::fenced_blocks(text)
            .into_iter()
            .filter(|b| b.tag.is_some_and(|tag| self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))))
            .find_map(|b| parse_valid(b.body, required_field))
    }
}

/// Any fenced block.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedBlock;

impl Strategy for DelimitedBlock {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DelimitedBlock
    }

    fn confidence(&self) -> f64 {
        0.9
    }

    fn extract(&self, text: &str, required_field: &str) -> Option<Value> {
        spans::fenced_blocks(text)
            .into_iter()
            .find_map(|b| parse_valid(b.body, required_field))
    }
}

/// Longest valid balanced span.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedSpan;

impl Strategy for BalancedSpan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BalancedSpan
    }

    fn confidence(&self) -> f64 {
        0.8
    }

    fn extract(&self, text: &str, required_field: &str) -> Option<Value> {
        spans::balanced_spans(text)
            .into_iter()
            .filter_map(|span| parse_valid(span, required_field).map(|value| (span.len(), value)))
            .max_by_key(|(len, _)| *len)
            .map(|(_, value)| value)
    }
}

/// First opening brace to last closing brace.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingSpan;

impl Strategy for BoundingSpan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BoundingSpan
    }

    fn confidence(&self) -> f64 {
        0.7
    }

    fn extract(&self, text: &str, required_field: &str) -> Option<Value> {
        parse_valid(spans::bounding_span(text)?, required_field)
    }
}

/// Free-text fallback driven by [`HeuristicRules`].
#[derive(Debug, Clone, Default)]
pub struct Heuristic {
    pub rules: HeuristicRules,
}

impl Strategy for Heuristic {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Heuristic
    }

    fn confidence(&self) -> f64 {
        0.3
    }

    fn extract(&self, text: &str, required_field: &str) -> Option<Value> {
        self.rules.synthesize(text, required_field)
    }
}

/// Outcome of one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub success: bool,
    /// Parsed object; `None` when every strategy failed.
    pub payload: Option<Value>,
    pub raw_text: String,
    pub strategy: Option<StrategyKind>,
    pub confidence: f64,
}

impl ExtractionResult {
    fn exhausted(raw_text: &str) -> Self {
        Self { success: false, payload: None, raw_text: raw_text.to_string(), strategy: None, confidence: 0.0 }
    }

    /// Top-level field of the payload.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.as_ref()?.get(name)
    }
}

/// Ordered strategy cascade with an optional audit log.
pub struct ExtractionEngine {
    strategies: Vec<Box<dyn Strategy>>,
    audit: Option<AuditLog>,
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionEngine {
    /// The five built-in strategies with default heuristic rules.
    pub fn new() -> Self {
        Self::with_rules(HeuristicRules::default())
    }

    pub fn with_rules(rules: HeuristicRules) -> Self {
        Self {
            strategies: vec![
                Box::new(TaggedBlock::default()),
                Box::new(DelimitedBlock),
                Box::new(BalancedSpan),
                Box::new(BoundingSpan),
                Box::new(Heuristic { rules }),
            ],
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Append `strategy` after the existing ones.
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Run the cascade without side effects.
    pub fn run(&self, text: &str, required_field: &str) -> ExtractionResult {
        for strategy in &self.strategies {
            let kind = strategy.kind();
            match strategy.extract(text, required_field) {
                Some(value) if is_valid(&value, required_field) => {
                    tracing::info!(strategy = %kind, required_field, "extraction succeeded");
                    return ExtractionResult {
                        success: true,
                        payload: Some(value),
                        raw_text: text.to_string(),
                        strategy: Some(kind),
                        confidence: strategy.confidence().clamp(0.0, 1.0),
                    };
                }
                Some(_) => {
                    tracing::debug!(strategy = %kind, required_field, "result lacks required field");
                }
                None => {
                    tracing::debug!(strategy = %kind, "no result");
                }
            }
        }

        tracing::warn!(required_field, length = text.len(), "all extraction strategies failed");
        ExtractionResult::exhausted(text)
    }

    /// Run the cascade and record the input in the audit log, if any.
    pub async fn extract(&self, text: &str, required_field: &str) -> ExtractionResult {
        let result = self.run(text, required_field);

        if let Some(audit) = &self.audit {
            let strategy = result.strategy.as_ref().map_or("exhausted", StrategyKind::as_str);
            audit.record("extraction", text, strategy, required_field).await;
        }

        result
    }
}
