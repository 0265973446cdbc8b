//! Client code for docket.
//!
//! This crate provides the resilient acquisition pipeline, document text
//! extraction, the structured extraction cascade, and the text generation
//! seam used by the pipeline coordinator.

pub mod acquire;
pub mod extract;
pub mod fetch;
pub mod llm;

pub use acquire::{AcquireConfig, AcquireError, Acquirer, AcquisitionOutcome, ResourceFailure, ResourceLink};
pub use extract::{
    AuditLog, DiscoveryMapping, DocumentError, ExtractionEngine, ExtractionResult, HeuristicRules, Strategy, StrategyKind,
    document_text, items_from_payload, truncate_chars,
};
pub use fetch::{
    FetchConfig, FetchRequest, FetchResponse, HttpTransport, IdentityPool, IdentityProfile, PolitenessGate,
    ReqwestTransport, RetryExhausted, RetryPolicy, TransportError,
};
pub use llm::{ChatCompletionsClient, GenerateError, LlmConfig, TextGenerator};
