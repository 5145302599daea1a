//! Pattern health analysis from failure composition.

use crate::failure::classifier::FailureCategory;
use crate::pattern::types::LearnedPattern;
use serde::Serialize;
use std::collections::HashMap;

/// Minimum ring size before composition rules apply.
const MIN_RING_SAMPLE: usize = 3;

/// Overall failure count that, combined with a failing ratio, retires a
/// pattern.
const WEIGHTED_FAILURE_FLOOR: u64 = 5;

/// Health verdict for one pattern.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub is_healthy: bool,
    pub dominant_failure_type: Option<FailureCategory>,
    pub suggested_action: String,
    pub reason: String,
}

impl HealthReport {
    fn healthy(reason: impl Into<String>) -> Self {
        Self {
            is_healthy: true,
            dominant_failure_type: None,
            suggested_action: "none".to_string(),
            reason: reason.into(),
        }
    }
}

/// Analyze a pattern's recent failures and lifetime counters.
pub fn analyze_health(pattern: &LearnedPattern) -> HealthReport {
    let metrics = &pattern.metrics;
    let ring = &metrics.recent_failures;

    if ring.is_empty() && metrics.failure_count == 0 {
        return HealthReport::healthy("no recorded failures");
    }

    // Composition of the recent ring
    let mut by_category: HashMap<FailureCategory, usize> = HashMap::new();
    for failure in ring {
        *by_category.entry(failure.category).or_insert(0) += 1;
    }
    let dominant = by_category
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(category, count)| (*category, *count));

    if let Some((category, count)) = dominant {
        let non_transient =
            matches!(category, FailureCategory::AuthRequired | FailureCategory::Validation);
        if non_transient && ring.len() >= MIN_RING_SAMPLE && count * 2 >= ring.len() {
            let action = match category {
                FailureCategory::AuthRequired => "reauthenticate",
                _ => "relearn_pattern",
            };
            return HealthReport {
                is_healthy: false,
                dominant_failure_type: Some(category),
                suggested_action: action.to_string(),
                reason: format!(
                    "{count} of the last {} failures are {category}",
                    ring.len()
                ),
            };
        }
    }

    // Lifetime counters weighted against successes
    if metrics.failure_count >= WEIGHTED_FAILURE_FLOOR
        && metrics.failure_count > metrics.success_count * 2
    {
        return HealthReport {
            is_healthy: false,
            dominant_failure_type: dominant.map(|(category, _)| category),
            suggested_action: "retire_pattern".to_string(),
            reason: format!(
                "{} failures against {} successes",
                metrics.failure_count, metrics.success_count
            ),
        };
    }

    HealthReport::healthy("failure composition within thresholds")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::types::{FailureEvent, TemplateType};
    use chrono::Utc;

    fn pattern_with_failures(categories: &[FailureCategory]) -> LearnedPattern {
        let mut pattern = LearnedPattern::new(
            "learned:h",
            TemplateType::QueryApi,
            vec![r"^https?://h\.com/".into()],
            "{url}",
        );
        for category in categories {
            pattern.metrics.record_failure(Some("failed"));
            pattern.metrics.push_recent_failure(
                FailureEvent {
                    category: *category,
                    domain: "h.com".into(),
                    url: "https://h.com/x".into(),
                    status: None,
                    message: "failed".into(),
                    at: Utc::now(),
                },
                20,
            );
        }
        pattern
    }

    #[test]
    fn test_clean_pattern_is_healthy() {
        let mut pattern = pattern_with_failures(&[]);
        pattern.metrics.record_success("h.com", None);
        let report = analyze_health(&pattern);
        assert!(report.is_healthy);
    }

    #[test]
    fn test_auth_dominated_ring_is_unhealthy() {
        let pattern = pattern_with_failures(&[
            FailureCategory::AuthRequired,
            FailureCategory::AuthRequired,
            FailureCategory::AuthRequired,
            FailureCategory::ServerError,
        ]);
        let report = analyze_health(&pattern);
        assert!(!report.is_healthy);
        assert_eq!(
            report.dominant_failure_type,
            Some(FailureCategory::AuthRequired)
        );
        assert_eq!(report.suggested_action, "reauthenticate");
    }

    #[test]
    fn test_transient_failures_stay_healthy() {
        let mut pattern = pattern_with_failures(&[
            FailureCategory::ServerError,
            FailureCategory::Timeout,
            FailureCategory::ServerError,
        ]);
        // Plenty of successes outweigh the transient failures
        for _ in 0..10 {
            pattern.metrics.record_success("h.com", None);
        }
        let report = analyze_health(&pattern);
        assert!(report.is_healthy);
    }

    #[test]
    fn test_lopsided_counters_retire_pattern() {
        let mut pattern = pattern_with_failures(&[
            FailureCategory::ServerError,
            FailureCategory::ServerError,
            FailureCategory::Timeout,
            FailureCategory::ServerError,
            FailureCategory::Network,
            FailureCategory::ServerError,
            FailureCategory::Timeout,
        ]);
        pattern.metrics.record_success("h.com", None);
        let report = analyze_health(&pattern);
        assert!(!report.is_healthy);
        assert_eq!(report.suggested_action, "retire_pattern");
    }

    #[test]
    fn test_validation_dominated_ring_suggests_relearn() {
        let pattern = pattern_with_failures(&[
            FailureCategory::Validation,
            FailureCategory::Validation,
            FailureCategory::Validation,
        ]);
        let report = analyze_health(&pattern);
        assert!(!report.is_healthy);
        assert_eq!(report.suggested_action, "relearn_pattern");
    }
}
