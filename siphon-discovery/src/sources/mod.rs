//! Documentation source probes.

pub mod altspec;
pub mod asyncapi;
pub mod docs_page;
pub mod graphql;
pub mod links;
pub mod openapi;
pub mod robots;

use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use siphon_common::util::escape_regex;
use siphon_common::{Fetcher, Result};
use siphon_core::{LearnedPattern, TemplateType};

/// One probeable documentation source.
#[async_trait]
pub trait SourceProbe: Send + Sync {
    fn source(&self) -> DiscoverySource;

    /// Probe a domain. Errors are captured by the orchestrator into a
    /// `found: false` result; probes may return them freely.
    async fn probe(&self, domain: &str, fetcher: &dyn Fetcher) -> Result<SourceResult>;
}

/// The full probe set, in priority order.
pub fn default_probes() -> Vec<Box<dyn SourceProbe>> {
    vec![
        Box::new(openapi::OpenapiProbe),
        Box::new(graphql::GraphqlProbe),
        Box::new(asyncapi::AsyncapiProbe),
        Box::new(altspec::AltSpecProbe),
        Box::new(links::LinksProbe),
        Box::new(docs_page::DocsPageProbe),
        Box::new(robots::RobotsProbe),
    ]
}

/// Base URL for a domain. Accepts a bare host (assumed https) or a full
/// origin (used by tests against local servers).
pub(crate) fn base_url(domain: &str) -> String {
    if domain.contains("://") {
        domain.trim_end_matches('/').to_string()
    } else {
        format!("https://{domain}")
    }
}

/// Host portion of a domain or origin, for ids and URL predicates.
pub(crate) fn host_of(domain: &str) -> String {
    let stripped = domain
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(domain);
    stripped
        .split('/')
        .next()
        .unwrap_or(stripped)
        .to_string()
}

/// Build a pattern for a discovered endpoint, carrying the source's
/// fixed confidence.
pub(crate) fn discovered_pattern(
    id: String,
    source: DiscoverySource,
    template_type: TemplateType,
    endpoint: String,
    method: &str,
    domain: &str,
) -> LearnedPattern {
    let host = host_of(domain);
    let mut pattern = LearnedPattern::new(
        id,
        template_type,
        vec![format!(r"^https?://(www\.)?{}/", escape_regex(&host))],
        endpoint,
    );
    pattern.method = method.to_string();
    pattern.metrics.confidence = source.confidence();
    pattern.metrics.add_domain(&host);
    pattern
}
