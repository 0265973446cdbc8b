//! Core types and shared functionality for docket.
//!
//! This crate provides:
//! - Content-addressed result cache backed by a single JSON document
//! - The work item data model shared by acquisition and the pipeline
//! - Unified error types
//! - Layered configuration
//! - URL canonicalization shared by cache keys and fetching

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod url;

pub use cache::{CacheRecord, CacheStatistics, CacheStore, key_for};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use self::url::{UrlError, canonicalize};
pub use model::{AcquireState, AcquiredResource, AnalyzeState, ContentKind, FilterVerdict, ItemStatus, WorkItem};
