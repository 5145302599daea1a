//! Failure classification and retry strategy selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry waits are capped at this many seconds regardless of what the
/// server asks for.
const MAX_WAIT_SECS: u64 = 60;

/// Response times above this are treated as timeouts during classification.
const SLOW_RESPONSE_MS: u64 = 30_000;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    AuthRequired,
    RateLimited,
    NotFound,
    ServerError,
    Timeout,
    Network,
    Validation,
    Unknown,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthRequired => "auth_required",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FailureCategory {
    /// Categories that indicate a structural problem rather than a
    /// transient one.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Timeout | Self::Network
        )
    }
}

/// How a failed call should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    None,
    Immediate,
    BackoffExponential,
    WaitFixed,
    AfterAuth,
}

/// Result of classifying one failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAssessment {
    pub category: FailureCategory,
    pub should_create_anti_pattern: bool,
    pub should_retry: bool,
    pub retry_strategy: RetryStrategy,
}

/// Classify a failure from its status code, error message, and optional
/// response time.
pub fn classify_failure(
    status: Option<u16>,
    message: &str,
    response_time_ms: Option<u64>,
) -> FailureAssessment {
    let category = categorize(status, message, response_time_ms);

    let (should_create_anti_pattern, should_retry, retry_strategy) = match category {
        FailureCategory::AuthRequired => (true, true, RetryStrategy::AfterAuth),
        FailureCategory::RateLimited => (false, true, RetryStrategy::WaitFixed),
        FailureCategory::NotFound => (true, false, RetryStrategy::None),
        FailureCategory::ServerError => (false, true, RetryStrategy::BackoffExponential),
        FailureCategory::Timeout => (false, true, RetryStrategy::BackoffExponential),
        FailureCategory::Network => (false, true, RetryStrategy::BackoffExponential),
        FailureCategory::Validation => (true, false, RetryStrategy::None),
        FailureCategory::Unknown => (false, false, RetryStrategy::None),
    };

    FailureAssessment {
        category,
        should_create_anti_pattern,
        should_retry,
        retry_strategy,
    }
}

fn categorize(
    status: Option<u16>,
    message: &str,
    response_time_ms: Option<u64>,
) -> FailureCategory {
    if let Some(status) = status {
        match status {
            401 | 403 | 407 => return FailureCategory::AuthRequired,
            429 => return FailureCategory::RateLimited,
            404 | 410 => return FailureCategory::NotFound,
            408 | 504 => return FailureCategory::Timeout,
            400 | 422 => return FailureCategory::Validation,
            500..=599 => return FailureCategory::ServerError,
            _ => {}
        }
    }

    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        return FailureCategory::Timeout;
    }
    if response_time_ms.is_some_and(|ms| ms >= SLOW_RESPONSE_MS) {
        return FailureCategory::Timeout;
    }
    if lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("login required")
    {
        return FailureCategory::AuthRequired;
    }
    if lower.contains("rate limit") || lower.contains("too many requests") {
        return FailureCategory::RateLimited;
    }
    if lower.contains("dns")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("network")
        || lower.contains("econnrefused")
    {
        return FailureCategory::Network;
    }
    if lower.contains("validation") || lower.contains("invalid") || lower.contains("malformed") {
        return FailureCategory::Validation;
    }

    FailureCategory::Unknown
}

/// Exponential backoff wait: `min(2^attempt, 60)` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64
        .checked_pow(attempt)
        .unwrap_or(MAX_WAIT_SECS)
        .min(MAX_WAIT_SECS);
    Duration::from_secs(secs)
}

/// Parse a `Retry-After` header: integer seconds or an HTTP-date.
/// The result is capped at 60 seconds.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let trimmed = value.trim();

    let secs = if let Ok(secs) = trimmed.parse::<i64>() {
        secs
    } else {
        let when = DateTime::parse_from_rfc2822(trimmed).ok()?;
        (when.with_timezone(&Utc) - now).num_seconds()
    };

    Some(Duration::from_secs((secs.max(0) as u64).min(MAX_WAIT_SECS)))
}

/// Parse an `X-RateLimit-Reset` header (Unix seconds), capped at 60 seconds.
pub fn parse_rate_limit_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let reset_at = value.trim().parse::<i64>().ok()?;
    let secs = reset_at - now.timestamp();
    Some(Duration::from_secs((secs.max(0) as u64).min(MAX_WAIT_SECS)))
}

/// Retry policy applying the classifier-chosen strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// Wait before the given attempt, or `None` when retries are
    /// exhausted or the strategy never retries.
    ///
    /// `retry_after` is the server-provided wait for rate-limited
    /// responses, already parsed from headers.
    pub fn next_delay(
        &self,
        assessment: &FailureAssessment,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> Option<Duration> {
        if !assessment.should_retry || attempt >= self.max_attempts {
            return None;
        }

        match assessment.retry_strategy {
            RetryStrategy::None => None,
            RetryStrategy::Immediate => Some(Duration::ZERO),
            RetryStrategy::BackoffExponential => Some(backoff_delay(attempt)),
            RetryStrategy::WaitFixed => {
                Some(retry_after.unwrap_or(Duration::from_secs(MAX_WAIT_SECS)))
            }
            // The caller resolves auth first, then retries immediately.
            RetryStrategy::AfterAuth => Some(Duration::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classify_by_status() {
        assert_eq!(
            classify_failure(Some(401), "", None).category,
            FailureCategory::AuthRequired
        );
        assert_eq!(
            classify_failure(Some(429), "", None).category,
            FailureCategory::RateLimited
        );
        assert_eq!(
            classify_failure(Some(404), "", None).category,
            FailureCategory::NotFound
        );
        assert_eq!(
            classify_failure(Some(503), "", None).category,
            FailureCategory::ServerError
        );
        assert_eq!(
            classify_failure(Some(422), "", None).category,
            FailureCategory::Validation
        );
    }

    #[test]
    fn test_classify_by_message() {
        assert_eq!(
            classify_failure(None, "request timed out", None).category,
            FailureCategory::Timeout
        );
        assert_eq!(
            classify_failure(None, "connection refused", None).category,
            FailureCategory::Network
        );
        assert_eq!(
            classify_failure(None, "something odd", None).category,
            FailureCategory::Unknown
        );
    }

    #[test]
    fn test_classify_slow_response_is_timeout() {
        assert_eq!(
            classify_failure(None, "", Some(45_000)).category,
            FailureCategory::Timeout
        );
    }

    #[test]
    fn test_auth_failures_flag_anti_pattern() {
        let assessment = classify_failure(Some(401), "unauthorized", None);
        assert!(assessment.should_create_anti_pattern);
        assert_eq!(assessment.retry_strategy, RetryStrategy::AfterAuth);
    }

    #[test]
    fn test_server_errors_do_not_flag_anti_pattern() {
        let assessment = classify_failure(Some(500), "", None);
        assert!(!assessment.should_create_anti_pattern);
        assert!(assessment.should_retry);
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(5), Duration::from_secs(32));
        assert_eq!(backoff_delay(10), Duration::from_secs(60));
        assert_eq!(backoff_delay(64), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(
            parse_retry_after("30", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("120", now),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_parse_retry_after_http_date_matches_seconds() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let as_date = parse_retry_after("Sat, 01 Mar 2025 12:00:30 +0000", now);
        let as_secs = parse_retry_after("30", now);
        assert_eq!(as_date, as_secs);
    }

    #[test]
    fn test_parse_retry_after_past_date_is_zero() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after("Sat, 01 Mar 2025 11:00:00 +0000", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_rate_limit_reset() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let reset = (now.timestamp() + 42).to_string();
        assert_eq!(
            parse_rate_limit_reset(&reset, now),
            Some(Duration::from_secs(42))
        );
    }

    #[test]
    fn test_retry_policy_exhaustion() {
        let policy = RetryPolicy::default();
        let assessment = classify_failure(Some(500), "", None);

        assert!(policy.next_delay(&assessment, 0, None).is_some());
        assert!(policy.next_delay(&assessment, 2, None).is_some());
        assert!(policy.next_delay(&assessment, 3, None).is_none());
    }

    #[test]
    fn test_retry_policy_never_retries_not_found() {
        let policy = RetryPolicy::default();
        let assessment = classify_failure(Some(404), "", None);
        assert!(policy.next_delay(&assessment, 0, None).is_none());
    }
}
