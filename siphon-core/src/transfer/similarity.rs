//! Similarity scoring between a source pattern and a target domain.

use crate::pattern::types::{ExtractorSource, LearnedPattern, ResponseFormat};
use crate::transfer::groups::group_of;
use serde::Serialize;

const WEIGHT_URL_STRUCTURE: f64 = 0.25;
const WEIGHT_RESPONSE_FORMAT: f64 = 0.15;
const WEIGHT_TEMPLATE_TYPE: f64 = 0.35;
const WEIGHT_DOMAIN_GROUP: f64 = 0.25;

/// Weighted similarity breakdown; every sub-score lies in [0, 1].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityScore {
    pub url_structure: f64,
    pub response_format: f64,
    pub template_type: f64,
    pub domain_group: f64,
    pub overall: f64,
}

/// Score how well a source pattern is expected to carry over to a
/// target domain.
pub fn score_similarity(
    source: &LearnedPattern,
    source_domain: &str,
    target_domain: &str,
) -> SimilarityScore {
    let source_group = group_of(source_domain);
    let target_group = group_of(target_domain);
    let same_group = match (source_group, target_group) {
        (Some(a), Some(b)) => a.name == b.name,
        _ => false,
    };

    let has_path = pattern_exposes_path(source);
    let url_structure = if same_group && has_path {
        0.8
    } else if has_path {
        0.3
    } else {
        0.0
    };

    let response_format = if source.response_format == ResponseFormat::Json {
        0.8
    } else {
        0.5
    };

    let template_type = match target_group {
        Some(group) if group.common_template_types.contains(&source.template_type) => 1.0,
        _ => 0.0,
    };

    let domain_group = if same_group {
        1.0
    } else if source_group.is_some() != target_group.is_some() {
        0.2
    } else {
        0.0
    };

    let overall = WEIGHT_URL_STRUCTURE * url_structure
        + WEIGHT_RESPONSE_FORMAT * response_format
        + WEIGHT_TEMPLATE_TYPE * template_type
        + WEIGHT_DOMAIN_GROUP * domain_group;

    SimilarityScore {
        url_structure,
        response_format,
        template_type,
        domain_group,
        overall,
    }
}

/// Whether the pattern keys off a path component of the URL.
fn pattern_exposes_path(pattern: &LearnedPattern) -> bool {
    if pattern
        .extractors
        .iter()
        .any(|e| e.source == ExtractorSource::Path)
    {
        return true;
    }
    // A path portion in the URL predicate counts too
    pattern.url_patterns.iter().any(|p| {
        p.find("://")
            .map(|i| p[i + 3..].contains('/'))
            .unwrap_or_else(|| p.contains('/'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::bootstrap::bootstrap_patterns;
    use crate::pattern::types::TemplateType;

    fn stackexchange_seed() -> LearnedPattern {
        bootstrap_patterns()
            .into_iter()
            .find(|p| p.id == "bootstrap:stackexchange")
            .unwrap()
    }

    #[test]
    fn test_same_group_similarity() {
        let source = stackexchange_seed();
        let score = score_similarity(&source, "stackoverflow.com", "serverfault.com");

        assert!(score.url_structure >= 0.3);
        assert_eq!(score.response_format, 0.8);
        assert_eq!(score.template_type, 1.0);
        assert_eq!(score.domain_group, 1.0);
        // Lower bound from the conservative sub-scores
        assert!(score.overall >= 0.795, "overall was {}", score.overall);
    }

    #[test]
    fn test_ungrouped_target_scores_low() {
        let source = stackexchange_seed();
        let score = score_similarity(&source, "stackoverflow.com", "example.com");

        assert_eq!(score.template_type, 0.0);
        assert_eq!(score.domain_group, 0.2);
        assert!(score.overall < 0.3);
    }

    #[test]
    fn test_cross_group_template_mismatch() {
        let source = stackexchange_seed();
        // Both grouped, but npm's group does not list query-api
        let score = score_similarity(&source, "stackoverflow.com", "npmjs.com");
        assert_eq!(score.template_type, 0.0);
        assert_eq!(score.domain_group, 0.0);
    }

    #[test]
    fn test_pathless_pattern_url_structure_is_zero() {
        let pattern = LearnedPattern::new(
            "learned:hostonly",
            TemplateType::QueryApi,
            vec![r"^https?://example\.com".into()],
            "{url}",
        );
        let score = score_similarity(&pattern, "example.com", "other.com");
        assert_eq!(score.url_structure, 0.0);
    }
}
