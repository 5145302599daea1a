//! Pattern model, matching, and the registry.

pub mod bootstrap;
pub mod events;
pub mod infer;
pub mod matcher;
pub mod registry;
pub mod types;

pub use bootstrap::bootstrap_patterns;
pub use events::{EventBus, Listener, ListenerId, PatternEvent};
pub use matcher::{extract_variable, fill_template, match_pattern};
pub use registry::{open_registry, PatternRegistry, RegistryOptions};
pub use types::{
    AntiPattern, ContentMapping, ExtractedContent, ExtractionEvent, ExtractorSource, FailureEvent,
    LearnedPattern, PatternMatch, PatternMetrics, ResponseFormat, ResponseValidation,
    TemplateType, ValueTransform, VariableExtractor,
};
