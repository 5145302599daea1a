//! GraphQL endpoint discovery via a minimal introspection probe.

use crate::sources::{base_url, host_of, SourceProbe};
use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use siphon_common::{FetchOptions, Fetcher, Result};
use siphon_core::{ContentMapping, LearnedPattern, TemplateType};
use std::collections::HashMap;

const CANDIDATE_PATHS: &[&str] = &["/graphql", "/api/graphql"];

const INTROSPECTION_QUERY: &str = r#"{"query":"{ __schema { queryType { name } } }"}"#;

pub struct GraphqlProbe;

#[async_trait]
impl SourceProbe for GraphqlProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Graphql
    }

    async fn probe(&self, domain: &str, fetcher: &dyn Fetcher) -> Result<SourceResult> {
        let base = base_url(domain);

        for path in CANDIDATE_PATHS {
            let url = format!("{base}{path}");
            let options = FetchOptions::post_json(INTROSPECTION_QUERY.as_bytes().to_vec());
            let Ok(response) = fetcher.fetch(&url, options).await else {
                continue;
            };
            if !response.is_success() {
                continue;
            }
            let Ok(body) = response.json_value() else {
                continue;
            };
            if body.pointer("/data/__schema").is_none() {
                continue;
            }

            let host = host_of(domain);
            let mut pattern = LearnedPattern::new(
                format!("graphql:{host}"),
                TemplateType::QueryApi,
                vec![format!(
                    r"^https?://(www\.)?{}/",
                    siphon_common::util::escape_regex(&host)
                )],
                url.clone(),
            );
            pattern.method = "POST".to_string();
            pattern
                .headers
                .insert("Content-Type".to_string(), "application/json".to_string());
            // GraphQL responses root their payload under `data`
            pattern.content_mapping = ContentMapping {
                title: None,
                description: None,
                body: Some("data".to_string()),
                metadata: HashMap::new(),
            };
            pattern.metrics.confidence = self.source().confidence();
            pattern.metrics.add_domain(&host);

            let metadata = HashMap::from([("endpoint".to_string(), url)]);
            return Ok(SourceResult::found(self.source(), vec![pattern], metadata));
        }

        Ok(SourceResult::not_found(self.source(), None))
    }
}
