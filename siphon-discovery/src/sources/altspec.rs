//! Alternative spec formats: RAML, API Blueprint, WADL.
//!
//! Detection only; these formats are recorded in metadata so the caller
//! can decide whether deeper parsing is worth it.

use crate::sources::{base_url, SourceProbe};
use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use siphon_common::{FetchOptions, Fetcher, Result};
use std::collections::HashMap;

const CANDIDATES: &[(&str, &str, &str)] = &[
    ("/api.raml", "#%RAML", "raml"),
    ("/apiary.apib", "FORMAT: 1A", "api-blueprint"),
    ("/application.wadl", "<application", "wadl"),
];

pub struct AltSpecProbe;

#[async_trait]
impl SourceProbe for AltSpecProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::AltSpec
    }

    async fn probe(&self, domain: &str, fetcher: &dyn Fetcher) -> Result<SourceResult> {
        let base = base_url(domain);

        for (path, signature, format) in CANDIDATES {
            let url = format!("{base}{path}");
            let Ok(response) = fetcher.fetch(&url, FetchOptions::get()).await else {
                continue;
            };
            if !response.is_success() {
                continue;
            }
            if !response.text().contains(signature) {
                continue;
            }

            let metadata = HashMap::from([
                ("format".to_string(), format.to_string()),
                ("url".to_string(), url),
            ]);
            return Ok(SourceResult::found(self.source(), Vec::new(), metadata));
        }

        Ok(SourceResult::not_found(self.source(), None))
    }
}
