//! robots.txt and sitemap hints.
//!
//! Hints only: the lowest-priority source never produces patterns, just
//! metadata pointing at API paths and sitemaps.

use crate::sources::{base_url, SourceProbe};
use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use siphon_common::{FetchOptions, Fetcher, Result};
use std::collections::HashMap;

pub struct RobotsProbe;

#[async_trait]
impl SourceProbe for RobotsProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::RobotsSitemap
    }

    async fn probe(&self, domain: &str, fetcher: &dyn Fetcher) -> Result<SourceResult> {
        let url = format!("{}/robots.txt", base_url(domain));
        let response = fetcher.fetch(&url, FetchOptions::get()).await?;
        if !response.is_success() {
            return Ok(SourceResult::not_found(self.source(), None));
        }

        let mut metadata = HashMap::new();
        let mut api_paths = Vec::new();
        let mut sitemaps = Vec::new();

        for line in response.text().lines() {
            let line = line.trim();
            if let Some(sitemap) = line.strip_prefix("Sitemap:") {
                sitemaps.push(sitemap.trim().to_string());
            } else if let Some((directive, value)) = line.split_once(':') {
                let directive = directive.trim().to_lowercase();
                let value = value.trim();
                if (directive == "allow" || directive == "disallow")
                    && value.to_lowercase().contains("api")
                {
                    api_paths.push(value.to_string());
                }
            }
        }

        if api_paths.is_empty() && sitemaps.is_empty() {
            return Ok(SourceResult::not_found(self.source(), None));
        }

        if !api_paths.is_empty() {
            metadata.insert("api_paths".to_string(), api_paths.join(","));
        }
        if !sitemaps.is_empty() {
            metadata.insert("sitemaps".to_string(), sitemaps.join(","));
        }

        Ok(SourceResult::found(self.source(), Vec::new(), metadata))
    }
}
