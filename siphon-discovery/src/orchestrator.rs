//! Discovery orchestrator: parallel fan-out, caching, and result merging.

use crate::cache::DiscoveryCache;
use crate::sources::{default_probes, SourceProbe};
use crate::types::{DiscoverySource, DomainDiscovery, SourceResult};
use chrono::Utc;
use futures::future::join_all;
use siphon_common::config::DiscoveryConfig;
use siphon_common::Fetcher;
use siphon_core::LearnedPattern;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options for one discovery run.
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Bypass the aggregate cache.
    pub force_refresh: bool,
    /// Sources to skip this run.
    pub skip_sources: Vec<DiscoverySource>,
}

/// Runs all documentation sources per domain and merges the results.
pub struct DiscoveryOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    probes: Vec<Box<dyn SourceProbe>>,
    cache: DiscoveryCache,
    source_timeout: Duration,
}

impl DiscoveryOrchestrator {
    /// Orchestrator over the default probe set.
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &DiscoveryConfig) -> Self {
        Self::with_probes(fetcher, config, default_probes())
    }

    /// Orchestrator over a custom probe set (used by tests).
    pub fn with_probes(
        fetcher: Arc<dyn Fetcher>,
        config: &DiscoveryConfig,
        probes: Vec<Box<dyn SourceProbe>>,
    ) -> Self {
        Self {
            fetcher,
            probes,
            cache: DiscoveryCache::new(Duration::from_secs(config.cache_ttl_secs)),
            source_timeout: Duration::from_secs(config.source_timeout_secs),
        }
    }

    /// Discover API documentation for a domain.
    ///
    /// All non-skipped sources run concurrently; none short-circuits. A
    /// source failure or timeout becomes a `found: false` result carrying
    /// the error. The aggregate is cached when anything was found.
    pub async fn discover(&self, domain: &str, options: DiscoverOptions) -> DomainDiscovery {
        if !options.force_refresh {
            if let Some(cached) = self.cache.get(domain).await {
                tracing::debug!(domain, "Discovery cache hit");
                return cached;
            }
        }

        let futures = self
            .probes
            .iter()
            .filter(|probe| !options.skip_sources.contains(&probe.source()))
            .map(|probe| self.run_probe(probe.as_ref(), domain));
        let mut results = join_all(futures).await;

        // Merge order: priority first, confidence as tiebreak
        results.sort_by(|a, b| {
            b.source
                .priority()
                .cmp(&a.source.priority())
                .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
        });

        let mut patterns: Vec<LearnedPattern> = Vec::new();
        let mut metadata: HashMap<String, String> = HashMap::new();
        for result in &results {
            if !result.found {
                continue;
            }
            if metadata.is_empty() {
                metadata = result.metadata.clone();
            }
            for pattern in &result.patterns {
                // First source to claim an id wins
                if !patterns.iter().any(|p| p.id == pattern.id) {
                    patterns.push(pattern.clone());
                }
            }
        }

        let discovery = DomainDiscovery {
            domain: domain.to_string(),
            sources: results,
            patterns,
            metadata,
            discovered_at: Utc::now(),
        };

        if discovery.any_found() {
            self.cache.put(domain, discovery.clone()).await;
        }

        discovery
    }

    /// Invalidate the cached aggregate for a domain.
    pub async fn invalidate(&self, domain: &str) {
        self.cache.invalidate(domain).await;
    }

    async fn run_probe(&self, probe: &dyn SourceProbe, domain: &str) -> SourceResult {
        let source = probe.source();
        // Record the start before awaiting so a failed probe still
        // reports accurate elapsed time
        let start = Instant::now();

        let outcome =
            tokio::time::timeout(self.source_timeout, probe.probe(domain, self.fetcher.as_ref()))
                .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::debug!(%source, domain, error = %e, "Discovery source failed");
                SourceResult::not_found(source, Some(e.to_string()))
            }
            Err(_) => SourceResult::not_found(
                source,
                Some(format!("timed out after {:?}", self.source_timeout)),
            ),
        };
        result.elapsed_ms = elapsed_ms;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use siphon_common::{Error, FetchOptions, FetchResponse, Result};
    use siphon_core::TemplateType;

    /// Fetcher that always fails; probes under test never reach it.
    struct NullFetcher;

    #[async_trait]
    impl Fetcher for NullFetcher {
        async fn fetch(&self, _url: &str, _options: FetchOptions) -> Result<FetchResponse> {
            Err(Error::External("no network in tests".into()))
        }
    }

    struct FixedProbe {
        source: DiscoverySource,
        pattern_ids: Vec<&'static str>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl SourceProbe for FixedProbe {
        fn source(&self) -> DiscoverySource {
            self.source
        }

        async fn probe(&self, domain: &str, _fetcher: &dyn Fetcher) -> Result<SourceResult> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::External("probe exploded".into()));
            }
            let patterns = self
                .pattern_ids
                .iter()
                .map(|id| {
                    let mut p = LearnedPattern::new(
                        id.to_string(),
                        TemplateType::RestResource,
                        vec![format!(r"^https?://{domain}/")],
                        format!("https://{domain}/api"),
                    );
                    p.metrics.confidence = self.source.confidence();
                    p.metrics.add_domain(domain);
                    p
                })
                .collect();
            Ok(SourceResult::found(
                self.source,
                patterns,
                HashMap::from([(format!("from:{}", self.source), "yes".to_string())]),
            ))
        }
    }

    fn orchestrator(probes: Vec<Box<dyn SourceProbe>>) -> DiscoveryOrchestrator {
        let config = DiscoveryConfig {
            cache_ttl_secs: 3600,
            source_timeout_secs: 1,
        };
        DiscoveryOrchestrator::with_probes(Arc::new(NullFetcher), &config, probes)
    }

    #[tokio::test]
    async fn test_merge_priority_and_dedup() {
        let orchestrator = orchestrator(vec![
            Box::new(FixedProbe {
                source: DiscoverySource::DocsPage,
                pattern_ids: vec!["shared:1", "docs:only"],
                delay: Duration::ZERO,
                fail: false,
            }),
            Box::new(FixedProbe {
                source: DiscoverySource::Openapi,
                pattern_ids: vec!["shared:1", "openapi:only"],
                delay: Duration::ZERO,
                fail: false,
            }),
        ]);

        let discovery = orchestrator
            .discover("example.com", DiscoverOptions::default())
            .await;

        // Higher-priority source appears first and wins the duplicate id
        assert_eq!(discovery.sources[0].source, DiscoverySource::Openapi);
        let ids: Vec<&str> = discovery.patterns.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["shared:1", "openapi:only", "docs:only"]);
        assert_eq!(
            discovery.patterns[0].metrics.confidence,
            DiscoverySource::Openapi.confidence()
        );
        // Metadata comes from the first found source
        assert!(discovery.metadata.contains_key("from:openapi"));
    }

    #[tokio::test]
    async fn test_failed_source_becomes_not_found() {
        let orchestrator = orchestrator(vec![
            Box::new(FixedProbe {
                source: DiscoverySource::Openapi,
                pattern_ids: vec!["openapi:a"],
                delay: Duration::ZERO,
                fail: false,
            }),
            Box::new(FixedProbe {
                source: DiscoverySource::Graphql,
                pattern_ids: vec![],
                delay: Duration::from_millis(10),
                fail: true,
            }),
        ]);

        let discovery = orchestrator
            .discover("example.com", DiscoverOptions::default())
            .await;

        let graphql = discovery
            .sources
            .iter()
            .find(|s| s.source == DiscoverySource::Graphql)
            .unwrap();
        assert!(!graphql.found);
        assert!(graphql.error.as_deref().unwrap().contains("probe exploded"));
        // A failed probe still reports its elapsed time
        assert!(graphql.elapsed_ms >= 10);

        // The failure never aborted the sibling source
        assert_eq!(discovery.patterns.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let orchestrator = orchestrator(vec![Box::new(FixedProbe {
            source: DiscoverySource::DocsPage,
            pattern_ids: vec!["docs:a"],
            delay: Duration::from_secs(5),
            fail: false,
        })]);

        let discovery = orchestrator
            .discover("example.com", DiscoverOptions::default())
            .await;

        assert!(!discovery.sources[0].found);
        assert!(discovery.sources[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_aggregate_is_cached() {
        let orchestrator = orchestrator(vec![Box::new(FixedProbe {
            source: DiscoverySource::Openapi,
            pattern_ids: vec!["openapi:a"],
            delay: Duration::ZERO,
            fail: false,
        })]);

        let first = orchestrator
            .discover("example.com", DiscoverOptions::default())
            .await;
        let second = orchestrator
            .discover("example.com", DiscoverOptions::default())
            .await;

        assert_eq!(first.discovered_at, second.discovered_at);

        let refreshed = orchestrator
            .discover(
                "example.com",
                DiscoverOptions {
                    force_refresh: true,
                    ..Default::default()
                },
            )
            .await;
        assert_ne!(first.discovered_at, refreshed.discovered_at);
    }

    #[tokio::test]
    async fn test_skip_sources() {
        let orchestrator = orchestrator(vec![
            Box::new(FixedProbe {
                source: DiscoverySource::Openapi,
                pattern_ids: vec!["openapi:a"],
                delay: Duration::ZERO,
                fail: false,
            }),
            Box::new(FixedProbe {
                source: DiscoverySource::RobotsSitemap,
                pattern_ids: vec![],
                delay: Duration::ZERO,
                fail: false,
            }),
        ]);

        let discovery = orchestrator
            .discover(
                "example.com",
                DiscoverOptions {
                    skip_sources: vec![DiscoverySource::RobotsSitemap],
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(discovery.sources.len(), 1);
        assert_eq!(discovery.sources[0].source, DiscoverySource::Openapi);
    }

    #[tokio::test]
    async fn test_nothing_found_is_not_cached() {
        let orchestrator = orchestrator(vec![Box::new(FixedProbe {
            source: DiscoverySource::Graphql,
            pattern_ids: vec![],
            delay: Duration::ZERO,
            fail: true,
        })]);

        let first = orchestrator
            .discover("example.com", DiscoverOptions::default())
            .await;
        assert!(!first.any_found());

        let second = orchestrator
            .discover("example.com", DiscoverOptions::default())
            .await;
        // A second run re-probed rather than serving a cached failure
        assert_ne!(first.discovered_at, second.discovered_at);
    }
}
