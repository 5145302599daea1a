//! Discovery data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siphon_core::LearnedPattern;
use std::collections::HashMap;

/// Fixed set of documentation sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    Openapi,
    Graphql,
    Asyncapi,
    /// RAML, API Blueprint, or WADL.
    AltSpec,
    /// RFC 8288 `Link` headers and HATEOAS `_links`.
    Links,
    /// Developer documentation HTML pages.
    DocsPage,
    /// Patterns learned from observed traffic; never probed directly.
    Observed,
    /// `robots.txt` and sitemap hints.
    RobotsSitemap,
}

impl DiscoverySource {
    /// Merge priority; higher wins.
    pub const fn priority(&self) -> u32 {
        match self {
            Self::Openapi => 100,
            Self::Graphql => 90,
            Self::Asyncapi => 80,
            Self::AltSpec => 75,
            Self::Links => 60,
            Self::DocsPage => 50,
            Self::Observed => 40,
            Self::RobotsSitemap => 30,
        }
    }

    /// Confidence assigned to patterns this source produces.
    pub const fn confidence(&self) -> f64 {
        match self {
            Self::Openapi => 0.95,
            Self::Graphql => 0.90,
            Self::Asyncapi => 0.85,
            Self::AltSpec => 0.80,
            Self::Links => 0.70,
            Self::DocsPage => 0.60,
            Self::Observed => 0.50,
            Self::RobotsSitemap => 0.40,
        }
    }

    /// Parse a source name. `raml` is a legacy alias for `alt-spec` and
    /// is accepted on input but never emitted.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openapi" | "swagger" => Some(Self::Openapi),
            "graphql" => Some(Self::Graphql),
            "asyncapi" => Some(Self::Asyncapi),
            "alt-spec" | "raml" => Some(Self::AltSpec),
            "links" => Some(Self::Links),
            "docs-page" => Some(Self::DocsPage),
            "observed" => Some(Self::Observed),
            "robots-sitemap" => Some(Self::RobotsSitemap),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Openapi => "openapi",
            Self::Graphql => "graphql",
            Self::Asyncapi => "asyncapi",
            Self::AltSpec => "alt-spec",
            Self::Links => "links",
            Self::DocsPage => "docs-page",
            Self::Observed => "observed",
            Self::RobotsSitemap => "robots-sitemap",
        };
        write!(f, "{s}")
    }
}

/// Result from probing one source for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub source: DiscoverySource,
    pub found: bool,
    #[serde(default)]
    pub patterns: Vec<LearnedPattern>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub confidence: f64,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl SourceResult {
    /// Successful probe with patterns and metadata.
    pub fn found(
        source: DiscoverySource,
        patterns: Vec<LearnedPattern>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            source,
            found: true,
            patterns,
            metadata,
            confidence: source.confidence(),
            elapsed_ms: 0,
            error: None,
        }
    }

    /// Probe that found nothing (or failed; carry the error).
    pub fn not_found(source: DiscoverySource, error: Option<String>) -> Self {
        Self {
            source,
            found: false,
            patterns: Vec::new(),
            metadata: HashMap::new(),
            confidence: source.confidence(),
            elapsed_ms: 0,
            error,
        }
    }
}

/// Aggregated discovery for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainDiscovery {
    pub domain: String,
    /// Per-source results, in merge order.
    pub sources: Vec<SourceResult>,
    /// Deduplicated patterns across all sources, best source first.
    pub patterns: Vec<LearnedPattern>,
    /// Metadata from the first source that found anything.
    pub metadata: HashMap<String, String>,
    pub discovered_at: DateTime<Utc>,
}

impl DomainDiscovery {
    /// True when at least one source found something.
    pub fn any_found(&self) -> bool {
        self.sources.iter().any(|s| s.found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        let mut sources = [
            DiscoverySource::RobotsSitemap,
            DiscoverySource::Openapi,
            DiscoverySource::Links,
            DiscoverySource::Graphql,
        ];
        sources.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        assert_eq!(sources[0], DiscoverySource::Openapi);
        assert_eq!(sources[1], DiscoverySource::Graphql);
        assert_eq!(sources[3], DiscoverySource::RobotsSitemap);
    }

    #[test]
    fn test_raml_alias_parses_to_alt_spec() {
        assert_eq!(
            DiscoverySource::parse("raml"),
            Some(DiscoverySource::AltSpec)
        );
        assert_eq!(
            DiscoverySource::parse("alt-spec"),
            Some(DiscoverySource::AltSpec)
        );
        // The alias is never emitted
        assert_eq!(DiscoverySource::AltSpec.to_string(), "alt-spec");
    }

    #[test]
    fn test_fixed_confidences() {
        assert_eq!(DiscoverySource::Openapi.confidence(), 0.95);
        assert_eq!(DiscoverySource::Graphql.confidence(), 0.90);
        assert_eq!(DiscoverySource::RobotsSitemap.confidence(), 0.40);
    }
}
