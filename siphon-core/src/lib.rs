//! siphon-core - The pattern learning core.
//!
//! Learns the HTTP APIs behind web pages and prefers direct API calls over
//! browser rendering on subsequent visits:
//! - pattern registry with domain and template-type indexes
//! - URL matching and variable extraction
//! - cross-site pattern transfer with confidence decay
//! - failure classification, retry policy, and anti-patterns
//! - language detection and semantic field translation

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod failure;
pub mod lang;
pub mod pattern;
pub mod transfer;

pub use failure::{
    classify_failure, FailureAssessment, FailureCategory, RetryPolicy, RetryStrategy,
};
pub use pattern::{
    AntiPattern, ContentMapping, ExtractionEvent, LearnedPattern, ListenerId, PatternEvent,
    PatternMatch, PatternMetrics, PatternRegistry, ResponseFormat, TemplateType,
    VariableExtractor,
};
pub use transfer::{SimilarityScore, TransferEngine, TransferOutcome};
