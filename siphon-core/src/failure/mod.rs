//! Failure classification, retry policy, and anti-pattern synthesis.

pub mod antipattern;
pub mod classifier;
pub mod health;
pub mod retry;

pub use antipattern::{AntiPatternIndex, AntiPatternKey};
pub use classifier::{
    backoff_delay, classify_failure, parse_rate_limit_reset, parse_retry_after,
    FailureAssessment, FailureCategory, RetryPolicy, RetryStrategy,
};
pub use health::{analyze_health, HealthReport};
pub use retry::{cancellation, run_with_retry, CancelSignal};
