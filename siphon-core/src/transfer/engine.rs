//! Transfer machine: clone a pattern onto a similar domain with
//! decayed confidence, then track how the clone performs.

use crate::pattern::registry::PatternRegistry;
use crate::pattern::types::{LearnedPattern, PatternMetrics};
use crate::transfer::similarity::{score_similarity, SimilarityScore};
use chrono::Utc;
use serde::Serialize;
use siphon_common::config::TransferConfig;
use siphon_common::util::{escape_regex, looks_like_uuid, strip_www};
use siphon_common::{Error, Result};
use std::sync::Arc;
use uuid::Uuid;

/// Confidence multiplier after a successful use of a transferred pattern.
const SUCCESS_BOOST: f64 = 1.3;

/// Confidence multiplier after a failed use of a transferred pattern.
const FAILURE_CUT: f64 = 0.6;

/// Result of a transfer attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub success: bool,
    pub pattern_id: Option<String>,
    pub similarity_score: Option<SimilarityScore>,
    pub reason: String,
}

impl TransferOutcome {
    fn rejected(reason: impl Into<String>, score: Option<SimilarityScore>) -> Self {
        Self {
            success: false,
            pattern_id: None,
            similarity_score: score,
            reason: reason.into(),
        }
    }
}

/// Cross-site transfer engine bound to one registry.
pub struct TransferEngine {
    registry: Arc<PatternRegistry>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(registry: Arc<PatternRegistry>, config: TransferConfig) -> Self {
        Self { registry, config }
    }

    /// Score a source pattern against a target domain.
    pub async fn evaluate(
        &self,
        source_pattern_id: &str,
        target_domain: &str,
    ) -> Result<SimilarityScore> {
        let source = self
            .registry
            .get_pattern(source_pattern_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("pattern {source_pattern_id}")))?;
        let source_domain = primary_domain(&source)?;
        Ok(score_similarity(&source, &source_domain, target_domain))
    }

    /// Transfer a pattern to a target domain.
    ///
    /// Rejects when the target already has indexed patterns or the
    /// similarity score is below the configured minimum. The clone shares
    /// no mutable substructure with its source.
    pub async fn transfer(
        &self,
        source_pattern_id: &str,
        target_domain: &str,
    ) -> Result<TransferOutcome> {
        let source = self
            .registry
            .get_pattern(source_pattern_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("pattern {source_pattern_id}")))?;

        if !self
            .registry
            .get_patterns_for_domain(target_domain)
            .await
            .is_empty()
        {
            return Ok(TransferOutcome::rejected(
                format!("{target_domain} already has indexed patterns"),
                None,
            ));
        }

        let source_domain = primary_domain(&source)?;
        let score = score_similarity(&source, &source_domain, target_domain);
        if score.overall < self.config.min_similarity {
            return Ok(TransferOutcome::rejected(
                format!(
                    "similarity {:.3} below minimum {:.3}",
                    score.overall, self.config.min_similarity
                ),
                Some(score),
            ));
        }

        // Deep clone through serialization: metric updates on the clone
        // must never reach the source
        let serialized = serde_json::to_vec(&source)?;
        let mut clone: LearnedPattern = serde_json::from_slice(&serialized)?;

        let now = Utc::now();
        clone.id = format!("transfer:{}", Uuid::new_v4());
        clone.url_patterns = vec![derive_target_url_pattern(target_domain, &source)];
        clone.metrics = PatternMetrics {
            confidence: source.metrics.confidence * self.config.confidence_decay,
            domains: vec![target_domain.to_string()],
            ..PatternMetrics::default()
        };
        clone.created_at = now;
        clone.updated_at = now;

        let pattern_id = self.registry.learn_pattern(clone).await?;
        tracing::info!(
            source = %source_pattern_id,
            target = %target_domain,
            pattern = %pattern_id,
            similarity = score.overall,
            "Transferred pattern"
        );

        Ok(TransferOutcome {
            success: true,
            pattern_id: Some(pattern_id),
            similarity_score: Some(score),
            reason: "transferred".to_string(),
        })
    }

    /// Record how a transferred pattern performed: normal metric updates,
    /// then a validation boost or cut on top.
    pub async fn record_outcome(
        &self,
        pattern_id: &str,
        success: bool,
        domain: &str,
        response_time_ms: Option<u64>,
        failure_reason: Option<&str>,
    ) -> Result<f64> {
        self.registry
            .update_pattern_metrics(pattern_id, success, domain, response_time_ms, failure_reason)
            .await?;

        let factor = if success { SUCCESS_BOOST } else { FAILURE_CUT };
        self.registry.scale_confidence(pattern_id, factor).await
    }

    /// Try transferring the best-scoring candidates onto a new domain,
    /// stopping at the first success. At most `max_candidates` are tried.
    pub async fn auto_transfer(&self, target_domain: &str) -> Result<TransferOutcome> {
        let mut candidates: Vec<(String, SimilarityScore)> = Vec::new();
        for pattern in self.registry.export().await {
            let Ok(source_domain) = primary_domain(&pattern) else {
                continue;
            };
            if source_domain == target_domain {
                continue;
            }
            let score = score_similarity(&pattern, &source_domain, target_domain);
            if score.overall >= self.config.min_similarity {
                candidates.push((pattern.id.clone(), score));
            }
        }

        candidates.sort_by(|a, b| {
            b.1.overall
                .partial_cmp(&a.1.overall)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut last_reason = format!("no candidate above {:.3}", self.config.min_similarity);
        for (pattern_id, _) in candidates.into_iter().take(self.config.max_candidates) {
            let outcome = self.transfer(&pattern_id, target_domain).await?;
            if outcome.success {
                return Ok(outcome);
            }
            last_reason = outcome.reason;
        }

        Ok(TransferOutcome::rejected(last_reason, None))
    }
}

fn primary_domain(pattern: &LearnedPattern) -> Result<String> {
    pattern
        .metrics
        .domains
        .first()
        .cloned()
        .ok_or_else(|| Error::InvalidInput(format!("pattern {} has no domains", pattern.id)))
}

/// Build the URL predicate for the transferred pattern: escaped target
/// host plus the source's path shape, with concrete numeric or
/// UUID-looking segments generalized to `[^/]+`.
fn derive_target_url_pattern(target_domain: &str, source: &LearnedPattern) -> String {
    let path = source
        .url_patterns
        .first()
        .and_then(|p| p.find("://").map(|i| &p[i + 3..]))
        .and_then(|rest| rest.find('/').map(|j| rest[j..].to_string()))
        .unwrap_or_default();

    let path: String = path
        .split('/')
        .map(|segment| {
            if !segment.is_empty()
                && (segment.chars().all(|c| c.is_ascii_digit()) || looks_like_uuid(segment))
            {
                "[^/]+".to_string()
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    format!(
        r"^https?://(www\.)?{}{}",
        escape_regex(strip_www(target_domain)),
        path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::registry::RegistryOptions;

    async fn engine() -> TransferEngine {
        let registry = Arc::new(PatternRegistry::in_memory(RegistryOptions::default()));
        registry.initialize().await.unwrap();
        TransferEngine::new(registry, TransferConfig::default())
    }

    #[tokio::test]
    async fn test_transfer_to_sibling_forum() {
        let engine = engine().await;
        let outcome = engine
            .transfer("bootstrap:stackexchange", "serverfault.com")
            .await
            .unwrap();

        assert!(outcome.success, "reason: {}", outcome.reason);
        let score = outcome.similarity_score.unwrap();
        assert!(score.overall >= 0.795);

        let pattern_id = outcome.pattern_id.unwrap();
        assert!(pattern_id.starts_with("transfer:"));

        let transferred = engine.registry.get_pattern(&pattern_id).await.unwrap();
        assert!((transferred.metrics.confidence - 0.5).abs() < 1e-12);
        assert_eq!(transferred.metrics.domains, vec!["serverfault.com"]);
        assert_eq!(transferred.metrics.success_count, 0);

        // The transferred predicate matches the target site
        let matches = engine
            .registry
            .find_matching_patterns("https://serverfault.com/questions/999/title")
            .await;
        assert!(matches.iter().any(|m| m.pattern.id == pattern_id));
    }

    #[tokio::test]
    async fn test_transfer_rejects_low_similarity() {
        let engine = engine().await;
        let outcome = engine
            .transfer("bootstrap:stackexchange", "example.com")
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.similarity_score.is_some());
        assert!(outcome.reason.contains("below minimum"));
    }

    #[tokio::test]
    async fn test_transfer_rejects_indexed_target() {
        let engine = engine().await;
        let outcome = engine
            .transfer("bootstrap:stackexchange", "reddit.com")
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.reason.contains("already has indexed patterns"));
    }

    #[tokio::test]
    async fn test_clone_is_deep() {
        let engine = engine().await;
        let outcome = engine
            .transfer("bootstrap:stackexchange", "serverfault.com")
            .await
            .unwrap();
        let pattern_id = outcome.pattern_id.unwrap();

        engine
            .record_outcome(&pattern_id, false, "serverfault.com", None, Some("404"))
            .await
            .unwrap();

        // The source is untouched by the clone's metric updates
        let source = engine
            .registry
            .get_pattern("bootstrap:stackexchange")
            .await
            .unwrap();
        assert_eq!(source.metrics.failure_count, 0);
        assert_eq!(source.metrics.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_outcome_boost_and_cut() {
        let engine = engine().await;
        let outcome = engine
            .transfer("bootstrap:stackexchange", "serverfault.com")
            .await
            .unwrap();
        let pattern_id = outcome.pattern_id.unwrap();

        // Success: ratio says 1.0, boost keeps it capped at 1.0
        let confidence = engine
            .record_outcome(&pattern_id, true, "serverfault.com", Some(90), None)
            .await
            .unwrap();
        assert_eq!(confidence, 1.0);

        // Failure: ratio drops to 0.5, cut takes it to 0.3
        let confidence = engine
            .record_outcome(&pattern_id, false, "serverfault.com", None, Some("500"))
            .await
            .unwrap();
        assert!((confidence - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_auto_transfer_picks_best_candidate() {
        let engine = engine().await;
        let outcome = engine.auto_transfer("superuser.com").await.unwrap();
        assert!(outcome.success, "reason: {}", outcome.reason);

        let pattern_id = outcome.pattern_id.unwrap();
        let transferred = engine.registry.get_pattern(&pattern_id).await.unwrap();
        // The qa_forums seed is the best-scoring source
        assert_eq!(
            transferred.template_type,
            crate::pattern::types::TemplateType::QueryApi
        );
    }

    #[tokio::test]
    async fn test_auto_transfer_unknown_domain_fails() {
        let engine = engine().await;
        let outcome = engine.auto_transfer("totally-unknown.example").await.unwrap();
        assert!(!outcome.success);
    }
}
