//! Learned pattern data types.

use crate::failure::FailureCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default capacity of the per-pattern recent-failure ring.
pub const RECENT_FAILURES_CAP: usize = 20;

/// Family of API shape a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateType {
    /// Append `.json` to the page URL.
    JsonSuffix,
    /// Separate API host (package registries and similar).
    RegistryLookup,
    /// Path segments map onto a versioned REST resource.
    RestResource,
    /// Extract an id, call `/{id}.json` on a Firebase-style host.
    FirebaseRest,
    /// Extract an id, call an API with query parameters.
    QueryApi,
    Graphql,
    JsonRpc,
    Websocket,
    ServerAction,
}

impl std::fmt::Display for TemplateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::JsonSuffix => "json-suffix",
            Self::RegistryLookup => "registry-lookup",
            Self::RestResource => "rest-resource",
            Self::FirebaseRest => "firebase-rest",
            Self::QueryApi => "query-api",
            Self::Graphql => "graphql",
            Self::JsonRpc => "json-rpc",
            Self::Websocket => "websocket",
            Self::ServerAction => "server-action",
        };
        write!(f, "{s}")
    }
}

/// Expected response body format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Html,
    Xml,
}

/// URL component an extractor reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorSource {
    Path,
    Query,
    Subdomain,
    Hostname,
}

/// Optional transform applied to an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTransform {
    Lowercase,
    Uppercase,
    Urlencode,
    Urldecode,
}

/// Named rule capturing a substring from a URL component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariableExtractor {
    pub name: String,
    pub source: ExtractorSource,
    /// ECMAScript-compatible regex applied to the selected component.
    pub pattern: String,
    /// Capture group index holding the value.
    #[serde(default = "default_group")]
    pub group: usize,
    #[serde(default)]
    pub transform: Option<ValueTransform>,
}

fn default_group() -> usize {
    1
}

impl VariableExtractor {
    /// Shorthand for a path extractor with group 1 and no transform.
    pub fn path(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ExtractorSource::Path,
            pattern: pattern.into(),
            group: 1,
            transform: None,
        }
    }

    /// Shorthand for a query extractor with group 1 and no transform.
    pub fn query(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ExtractorSource::Query,
            pattern: pattern.into(),
            group: 1,
            transform: None,
        }
    }
}

/// Symbolic paths selecting content fields from the JSON response.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentMapping {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Response validation rules.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseValidation {
    #[serde(default)]
    pub required_fields: Vec<String>,
    pub min_body_length: Option<usize>,
}

/// One entry in the recent-failure ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEvent {
    pub category: FailureCategory,
    pub domain: String,
    pub url: String,
    pub status: Option<u16>,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Usage metrics for a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatternMetrics {
    pub success_count: u64,
    pub failure_count: u64,
    /// `successCount / (successCount + failureCount)`, or 0 when both are 0.
    pub confidence: f64,
    /// Domains this pattern has been applied to (set semantics).
    #[serde(default)]
    pub domains: Vec<String>,
    /// Rolling mean over successful response times, in milliseconds.
    pub avg_response_time: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_failure_reason: Option<String>,
    #[serde(default)]
    pub failures_by_category: HashMap<FailureCategory, u64>,
    #[serde(default)]
    pub recent_failures: VecDeque<FailureEvent>,
    #[serde(default)]
    pub active_anti_patterns: Vec<String>,
}

impl PatternMetrics {
    /// Recompute confidence from the counters.
    pub fn recompute_confidence(&mut self) {
        let total = self.success_count + self.failure_count;
        self.confidence = if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        };
    }

    /// Record a success: counters, timestamps, rolling response-time mean,
    /// and the domain set.
    pub fn record_success(&mut self, domain: &str, response_time_ms: Option<f64>) {
        self.success_count += 1;
        self.last_success = Some(Utc::now());
        if let Some(rt) = response_time_ms {
            // Rolling mean: mu += (x - mu) / n with n = successCount
            let n = self.success_count as f64;
            self.avg_response_time += (rt - self.avg_response_time) / n;
        }
        self.add_domain(domain);
        self.recompute_confidence();
    }

    /// Record a failure: counters, timestamps, reason.
    pub fn record_failure(&mut self, reason: Option<&str>) {
        self.failure_count += 1;
        self.last_failure = Some(Utc::now());
        if let Some(reason) = reason {
            self.last_failure_reason = Some(reason.to_string());
        }
        self.recompute_confidence();
    }

    /// Append a domain, de-duplicating.
    pub fn add_domain(&mut self, domain: &str) {
        if !domain.is_empty() && !self.domains.iter().any(|d| d == domain) {
            self.domains.push(domain.to_string());
        }
    }

    /// Push into the bounded recent-failure ring, dropping the oldest.
    pub fn push_recent_failure(&mut self, event: FailureEvent, cap: usize) {
        *self.failures_by_category.entry(event.category).or_insert(0) += 1;
        self.recent_failures.push_back(event);
        while self.recent_failures.len() > cap {
            self.recent_failures.pop_front();
        }
    }

    /// Count ring entries in the given category.
    pub fn recent_failures_in(&self, category: FailureCategory) -> usize {
        self.recent_failures
            .iter()
            .filter(|f| f.category == category)
            .count()
    }
}

/// Stored description of one API shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPattern {
    /// Unique id, scheme-prefixed by provenance
    /// (`bootstrap:`, `learned:`, `transfer:`, `openapi:`, ...).
    pub id: String,
    pub template_type: TemplateType,
    /// A URL matches if any entry matches (case-insensitive).
    pub url_patterns: Vec<String>,
    /// Template with `{name}` placeholders; the literal `{url}` means
    /// "use the original URL unchanged".
    pub endpoint_template: String,
    #[serde(default)]
    pub extractors: Vec<VariableExtractor>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub content_mapping: ContentMapping,
    #[serde(default)]
    pub validation: ResponseValidation,
    #[serde(default)]
    pub metrics: PatternMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl LearnedPattern {
    /// Create a pattern with empty metrics and the given id.
    pub fn new(
        id: impl Into<String>,
        template_type: TemplateType,
        url_patterns: Vec<String>,
        endpoint_template: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            template_type,
            url_patterns,
            endpoint_template: endpoint_template.into(),
            extractors: Vec::new(),
            method: default_method(),
            headers: HashMap::new(),
            response_format: ResponseFormat::Json,
            content_mapping: ContentMapping::default(),
            validation: ResponseValidation::default(),
            metrics: PatternMetrics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Provenance scheme: the id prefix before the first `:`.
    pub fn provenance(&self) -> &str {
        self.id.split(':').next().unwrap_or("")
    }

    /// Pre-seeded pattern for a canonical site.
    pub fn is_bootstrap(&self) -> bool {
        self.provenance() == "bootstrap"
    }

    /// Pattern created by cross-site transfer.
    pub fn is_transferred(&self) -> bool {
        self.provenance() == "transfer"
    }
}

/// Negative rule derived from repeated failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AntiPattern {
    pub id: String,
    pub source_pattern_id: String,
    pub failure_category: FailureCategory,
    #[serde(default)]
    pub domains: Vec<String>,
    /// URL-shape predicate (regex, case-insensitive).
    pub url_pattern: String,
    pub failure_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AntiPattern {
    /// Active iff `now < expiresAt`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Check whether a URL matches the shape predicate.
    pub fn matches_url(&self, url: &str) -> bool {
        regex::RegexBuilder::new(&self.url_pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(url))
            .unwrap_or(false)
    }
}

/// Result of matching a URL against the registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub pattern: LearnedPattern,
    pub confidence: f64,
    pub extracted_variables: HashMap<String, String>,
    /// Endpoint with variables substituted.
    pub api_endpoint: String,
    pub match_reason: String,
}

/// Content pulled out of a successful extraction, used for learning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

/// A successful API extraction reported back to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionEvent {
    /// Page URL the user asked for.
    pub source_url: String,
    /// API URL that produced the content.
    pub api_url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Structured response the content was extracted from.
    pub response: serde_json::Value,
    #[serde(default)]
    pub content: ExtractedContent,
    /// Explicit strategy used, when the caller knows it.
    pub strategy: Option<TemplateType>,
    pub response_time_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance() {
        let p = LearnedPattern::new(
            "bootstrap:reddit",
            TemplateType::JsonSuffix,
            vec![r"^https?://reddit\.com/".into()],
            "{url}.json",
        );
        assert_eq!(p.provenance(), "bootstrap");
        assert!(p.is_bootstrap());
        assert!(!p.is_transferred());
    }

    #[test]
    fn test_confidence_recurrence() {
        let mut metrics = PatternMetrics::default();
        assert_eq!(metrics.confidence, 0.0);

        metrics.record_success("a.com", None);
        assert_eq!(metrics.confidence, 1.0);

        metrics.record_failure(Some("boom"));
        assert!((metrics.confidence - 0.5).abs() < f64::EPSILON);

        metrics.record_success("a.com", None);
        assert!((metrics.confidence - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_average_is_arithmetic_mean() {
        let mut metrics = PatternMetrics::default();
        let samples = [120.0, 80.0, 100.0, 240.0];
        for s in samples {
            metrics.record_success("a.com", Some(s));
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((metrics.avg_response_time - mean).abs() < 1e-9);
    }

    #[test]
    fn test_domains_are_a_set() {
        let mut metrics = PatternMetrics::default();
        metrics.record_success("a.com", None);
        metrics.record_success("a.com", None);
        metrics.record_success("b.com", None);
        assert_eq!(metrics.domains, vec!["a.com", "b.com"]);
    }

    #[test]
    fn test_recent_failures_ring_is_bounded() {
        let mut metrics = PatternMetrics::default();
        for i in 0..10 {
            metrics.push_recent_failure(
                FailureEvent {
                    category: FailureCategory::ServerError,
                    domain: "a.com".into(),
                    url: format!("https://a.com/{i}"),
                    status: Some(500),
                    message: "server error".into(),
                    at: Utc::now(),
                },
                4,
            );
        }
        assert_eq!(metrics.recent_failures.len(), 4);
        // Oldest entries were dropped
        assert_eq!(metrics.recent_failures[0].url, "https://a.com/6");
        // Category counters track every event, not just the ring
        assert_eq!(
            metrics.failures_by_category[&FailureCategory::ServerError],
            10
        );
    }

    #[test]
    fn test_anti_pattern_activity() {
        let now = Utc::now();
        let anti = AntiPattern {
            id: "anti:1".into(),
            source_pattern_id: "learned:x".into(),
            failure_category: FailureCategory::AuthRequired,
            domains: vec!["x.com".into()],
            url_pattern: r"^https?://x\.com/".into(),
            failure_count: 3,
            first_seen: now,
            last_seen: now,
            expires_at: now + chrono::Duration::hours(24),
        };
        assert!(anti.is_active(now));
        assert!(!anti.is_active(now + chrono::Duration::hours(25)));
        assert!(anti.matches_url("https://x.com/y"));
        assert!(!anti.matches_url("https://other.com/y"));
    }

    #[test]
    fn test_pattern_serde_roundtrip() {
        let mut p = LearnedPattern::new(
            "learned:abc",
            TemplateType::QueryApi,
            vec![r"^https?://example\.com/item".into()],
            "https://api.example.com/items/{id}",
        );
        p.extractors.push(VariableExtractor::query("id", r"id=(\d+)"));
        p.metrics.record_success("example.com", Some(42.0));

        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"templateType\":\"query-api\""));
        assert!(json.contains("\"successCount\":1"));

        let back: LearnedPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, p.id);
        assert_eq!(back.template_type, TemplateType::QueryApi);
        assert_eq!(back.extractors, p.extractors);
    }
}
