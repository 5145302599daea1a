//! OpenAPI / Swagger document discovery.

use crate::sources::{base_url, discovered_pattern, SourceProbe};
use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use siphon_common::{FetchOptions, Fetcher, Result};
use siphon_core::TemplateType;
use std::collections::HashMap;

/// Paths OpenAPI documents are commonly served from.
const WELL_KNOWN_PATHS: &[&str] = &[
    "/openapi.json",
    "/swagger.json",
    "/api/openapi.json",
    "/.well-known/openapi.json",
    "/api-docs",
];

/// Endpoints taken from one document, at most.
const MAX_ENDPOINTS: usize = 25;

pub struct OpenapiProbe;

#[async_trait]
impl SourceProbe for OpenapiProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Openapi
    }

    async fn probe(&self, domain: &str, fetcher: &dyn Fetcher) -> Result<SourceResult> {
        let base = base_url(domain);

        for path in WELL_KNOWN_PATHS {
            let url = format!("{base}{path}");
            let Ok(response) = fetcher.fetch(&url, FetchOptions::get()).await else {
                continue;
            };
            if !response.is_success() {
                continue;
            }
            let Ok(document) = response.json_value() else {
                continue;
            };
            if document.get("openapi").is_none() && document.get("swagger").is_none() {
                continue;
            }

            return Ok(self.parse_document(domain, &base, &document));
        }

        Ok(SourceResult::not_found(self.source(), None))
    }
}

impl OpenapiProbe {
    fn parse_document(
        &self,
        domain: &str,
        base: &str,
        document: &serde_json::Value,
    ) -> SourceResult {
        let mut metadata = HashMap::new();
        if let Some(title) = document.pointer("/info/title").and_then(|v| v.as_str()) {
            metadata.insert("title".to_string(), title.to_string());
        }
        if let Some(version) = document.pointer("/info/version").and_then(|v| v.as_str()) {
            metadata.insert("version".to_string(), version.to_string());
        }
        metadata.insert(
            "spec".to_string(),
            if document.get("openapi").is_some() {
                "openapi".to_string()
            } else {
                "swagger".to_string()
            },
        );

        let mut patterns = Vec::new();
        if let Some(paths) = document.get("paths").and_then(|v| v.as_object()) {
            for (path, operations) in paths.iter().take(MAX_ENDPOINTS) {
                let Some(operations) = operations.as_object() else {
                    continue;
                };
                for method in ["get", "post", "put", "delete", "patch"] {
                    if operations.contains_key(method) {
                        patterns.push(discovered_pattern(
                            format!("openapi:{}:{}:{path}", super::host_of(domain), method),
                            self.source(),
                            TemplateType::RestResource,
                            format!("{base}{path}"),
                            &method.to_uppercase(),
                            domain,
                        ));
                    }
                }
            }
        }

        SourceResult::found(self.source(), patterns, metadata)
    }
}
