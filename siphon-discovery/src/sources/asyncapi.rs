//! AsyncAPI document discovery for WebSocket-style APIs.

use crate::sources::{base_url, discovered_pattern, host_of, SourceProbe};
use crate::types::{DiscoverySource, SourceResult};
use async_trait::async_trait;
use siphon_common::{FetchOptions, Fetcher, Result};
use siphon_core::TemplateType;
use std::collections::HashMap;

const WELL_KNOWN_PATHS: &[&str] = &["/asyncapi.json", "/.well-known/asyncapi.json"];

const MAX_CHANNELS: usize = 20;

pub struct AsyncapiProbe;

#[async_trait]
impl SourceProbe for AsyncapiProbe {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Asyncapi
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
            if document.get("asyncapi").is_none() {
                continue;
            }

            let mut metadata = HashMap::new();
            if let Some(title) = document.pointer("/info/title").and_then(|v| v.as_str()) {
                metadata.insert("title".to_string(), title.to_string());
            }

            let host = host_of(domain);
            let mut patterns = Vec::new();
            if let Some(channels) = document.get("channels").and_then(|v| v.as_object()) {
                for (channel, _) in channels.iter().take(MAX_CHANNELS) {
                    patterns.push(discovered_pattern(
                        format!("ws:{host}:{channel}"),
                        self.source(),
                        TemplateType::Websocket,
                        format!("wss://{host}/{}", channel.trim_start_matches('/')),
                        "GET",
                        domain,
                    ));
                }
            }

            return Ok(SourceResult::found(self.source(), patterns, metadata));
        }

        Ok(SourceResult::not_found(self.source(), None))
    }
}
