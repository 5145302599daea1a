//! Developer documentation page scraping.
//!
//! The weakest structured source: fetch likely docs pages and pull out
//! endpoint-looking strings.

use crate::sources::{base_url, discovered_pattern, host_of, SourceProbe};
use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use siphon_common::{FetchOptions, Fetcher, Result};
use siphon_core::TemplateType;
use std::collections::HashMap;

const CANDIDATE_PAGES: &[&str] = &["/developers", "/docs/api", "/docs", "/api-docs", "/developer"];

const MAX_ENDPOINTS: usize = 10;

/// `GET /api/things/{id}`-style strings in documentation prose.
static METHOD_AND_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(GET|POST|PUT|DELETE|PATCH)\s+(/[\w/{}.~-]+)").unwrap());

/// Absolute API URLs mentioned in the page.
static ABSOLUTE_API_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[\w.-]+/api/[\w/{}.~-]*").unwrap());

pub struct DocsPageProbe;

#[async_trait]
impl SourceProbe for DocsPageProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::DocsPage
    }

    async fn probe(&self, domain: &str, fetcher: &dyn Fetcher) -> Result<SourceResult> {
        let base = base_url(domain);

        for page in CANDIDATE_PAGES {
            let url = format!("{base}{page}");
            let Ok(response) = fetcher.fetch(&url, FetchOptions::get()).await else {
                continue;
            };
            if !response.is_success() {
                continue;
            }
            let html = response.text();
            if !html.to_lowercase().contains("api") {
                continue;
            }

            let host = host_of(domain);
            let mut seen = Vec::new();
            let mut patterns = Vec::new();

            for captures in METHOD_AND_PATH.captures_iter(&html) {
                let method = captures[1].to_string();
                let path = captures[2].to_string();
                let key = format!("{method} {path}");
                if seen.contains(&key) || patterns.len() >= MAX_ENDPOINTS {
                    continue;
                }
                seen.push(key);
                patterns.push(discovered_pattern(
                    format!("learned:docs:{host}:{}", patterns.len()),
                    self.source(),
                    TemplateType::RestResource,
                    format!("{base}{path}"),
                    &method,
                    domain,
                ));
            }

            for found in ABSOLUTE_API_URL.find_iter(&html) {
                if patterns.len() >= MAX_ENDPOINTS {
                    break;
                }
                let endpoint = found.as_str().to_string();
                if seen.contains(&endpoint) {
                    continue;
                }
                seen.push(endpoint.clone());
                patterns.push(discovered_pattern(
                    format!("learned:docs:{host}:{}", patterns.len()),
                    self.source(),
                    TemplateType::RestResource,
                    endpoint,
                    "GET",
                    domain,
                ));
            }

            if patterns.is_empty() {
                continue;
            }

            let metadata = HashMap::from([("page".to_string(), url)]);
            return Ok(SourceResult::found(self.source(), patterns, metadata));
        }

        Ok(SourceResult::not_found(self.source(), None))
    }
}
