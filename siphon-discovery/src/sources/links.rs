//! Link-based discovery: RFC 8288 `Link` headers and HATEOAS `_links`.

use crate::sources::{base_url, discovered_pattern, host_of, SourceProbe};
use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use siphon_common::{FetchOptions, Fetcher, Result};
use siphon_core::TemplateType;
use std::collections::HashMap;

static LINK_HEADER_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="?([^";,]+)"?"#).unwrap());

pub struct LinksProbe;

#[async_trait]
impl SourceProbe for LinksProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Links
    }

    async fn probe(&self, domain: &str, fetcher: &dyn Fetcher) -> Result<SourceResult> {
        let base = base_url(domain);
        let response = fetcher.fetch(&base, FetchOptions::get()).await?;

        let mut discovered: Vec<(String, String)> = Vec::new();

        if let Some(header) = response.header("link") {
            for captures in LINK_HEADER_ENTRY.captures_iter(header) {
                let href = captures[1].to_string();
                let rel = captures[2].to_string();
                discovered.push((rel, href));
            }
        }

        // HATEOAS documents expose their relations under `_links`
        if let Ok(body) = response.json_value() {
            if let Some(links) = body.get("_links").and_then(|v| v.as_object()) {
                for (rel, entry) in links {
                    if let Some(href) = entry.get("href").and_then(|v| v.as_str()) {
                        discovered.push((rel.clone(), href.to_string()));
                    }
                }
            }
        }

        if discovered.is_empty() {
            return Ok(SourceResult::not_found(self.source(), None));
        }

        let host = host_of(domain);
        let mut metadata = HashMap::new();
        let mut patterns = Vec::new();
        for (index, (rel, href)) in discovered.iter().enumerate() {
            metadata.insert(format!("rel:{rel}"), href.clone());

            let api_like = rel.contains("api") || href.contains("/api/");
            if api_like {
                let endpoint = if href.starts_with("http") {
                    href.clone()
                } else {
                    format!("{base}{href}")
                };
                patterns.push(discovered_pattern(
                    format!("learned:links:{host}:{index}"),
                    self.source(),
                    TemplateType::RestResource,
                    endpoint,
                    "GET",
                    domain,
                ));
            }
        }

        Ok(SourceResult::found(self.source(), patterns, metadata))
    }
}
