//! Batch pipeline for docket.
//!
//! Takes a batch of work items through filtering, acquisition and optional
//! analysis, and returns a [`RunReport`] with one entry per item.

pub mod analysis;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod report;

pub use analysis::{
    Analysis, AnalysisOutcome, DEFAULT_DOCUMENT_TEXT_BUDGET, DEFAULT_PROMPT_TEMPLATE, document_excerpt, render_template,
};
pub use coordinator::{Coordinator, PipelineOptions};
pub use error::{PipelineError, StageError};
pub use filter::{AcceptAll, AllOf, HasReference, HostAllowlist, ItemFilter, TitleMatches};
pub use report::{ExtractionSummary, ItemReport, RunOutcome, RunReport, Stage, StageCounters};
