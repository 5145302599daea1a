//! Pattern registry: the owning store for learned patterns and
//! anti-patterns.
//!
//! Three indexes are kept coherent under one lock: the pattern map, the
//! domain index, and the template-type index. Anti-patterns live here too
//! so persistence and lifecycle are unified.

use crate::failure::{classify_failure, AntiPatternIndex, FailureAssessment, FailureCategory};
use crate::pattern::bootstrap::bootstrap_patterns;
use crate::pattern::events::{EventBus, Listener, ListenerId, PatternEvent};
use crate::pattern::infer::{
    derive_url_pattern, infer_content_mapping, infer_template_type,
};
use crate::pattern::matcher::match_pattern;
use crate::pattern::types::{
    AntiPattern, ExtractionEvent, FailureEvent, LearnedPattern, PatternMatch, TemplateType,
};
use chrono::{Duration, Utc};
use siphon_common::config::{FailureConfig, RegistryConfig};
use siphon_common::util::{hostname_of, strip_www};
use siphon_common::{Error, Result};
use siphon_store::JsonStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Tuning for the registry, combining registry and failure settings.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub archive_after_days: i64,
    pub confidence_floor: f64,
    pub confidence_epsilon: f64,
    pub recent_failures_cap: usize,
    pub anti_pattern_threshold: usize,
    pub anti_pattern_ttl_hours: i64,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self::from_config(&RegistryConfig::default(), &FailureConfig::default())
    }
}

impl RegistryOptions {
    pub fn from_config(registry: &RegistryConfig, failure: &FailureConfig) -> Self {
        Self {
            archive_after_days: registry.archive_after_days,
            confidence_floor: registry.confidence_floor,
            confidence_epsilon: registry.confidence_epsilon,
            recent_failures_cap: failure.recent_failures_cap,
            anti_pattern_threshold: failure.anti_pattern_threshold,
            anti_pattern_ttl_hours: failure.anti_pattern_ttl_hours,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    patterns: HashMap<String, LearnedPattern>,
    /// Pattern ids in insertion order; tier-two scans and exports follow it.
    insertion_order: Vec<String>,
    domain_index: HashMap<String, Vec<String>>,
    type_index: HashMap<TemplateType, Vec<String>>,
    anti: AntiPatternIndex,
}

impl RegistryState {
    fn insert(&mut self, pattern: LearnedPattern) {
        let id = pattern.id.clone();

        if !self.patterns.contains_key(&id) {
            self.insertion_order.push(id.clone());
        }

        for domain in &pattern.metrics.domains {
            index_id(self.domain_index.entry(domain.clone()).or_default(), &id);
        }
        index_id(
            self.type_index.entry(pattern.template_type).or_default(),
            &id,
        );

        self.patterns.insert(id, pattern);
    }

    fn remove(&mut self, id: &str) -> Option<LearnedPattern> {
        let pattern = self.patterns.remove(id)?;
        self.insertion_order.retain(|pid| pid != id);
        for ids in self.domain_index.values_mut() {
            ids.retain(|pid| pid != id);
        }
        self.domain_index.retain(|_, ids| !ids.is_empty());
        if let Some(ids) = self.type_index.get_mut(&pattern.template_type) {
            ids.retain(|pid| pid != id);
        }
        self.type_index.retain(|_, ids| !ids.is_empty());
        Some(pattern)
    }

    /// Keep the domain index in sync after a metrics update added a domain.
    fn reindex_domain(&mut self, id: &str, domain: &str) {
        if self.patterns.contains_key(id) {
            index_id(
                self.domain_index.entry(domain.to_string()).or_default(),
                id,
            );
        }
    }

    fn export(&self) -> Vec<LearnedPattern> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.patterns.get(id))
            .cloned()
            .collect()
    }

    fn export_anti_patterns(&self) -> Vec<AntiPattern> {
        self.anti.export()
    }

    /// Drop expired anti-patterns from both index sides and from every
    /// pattern's active list.
    fn purge_expired_anti_patterns(&mut self) -> usize {
        let removed = self.anti.purge_expired(Utc::now());
        for anti in &removed {
            if let Some(pattern) = self.patterns.get_mut(&anti.source_pattern_id) {
                pattern
                    .metrics
                    .active_anti_patterns
                    .retain(|aid| aid != &anti.id);
            }
        }
        removed.len()
    }
}

fn index_id(ids: &mut Vec<String>, id: &str) {
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

/// The pattern registry.
pub struct PatternRegistry {
    state: RwLock<RegistryState>,
    bus: EventBus,
    store: Option<JsonStore>,
    anti_store: Option<JsonStore>,
    options: RegistryOptions,
}

impl PatternRegistry {
    /// In-memory registry (no persistence); used by tests and embedders
    /// that handle persistence themselves.
    pub fn in_memory(options: RegistryOptions) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            bus: EventBus::new(),
            store: None,
            anti_store: None,
            options,
        }
    }

    /// Registry persisted through the given stores.
    pub fn with_store(options: RegistryOptions, store: JsonStore, anti_store: JsonStore) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            bus: EventBus::new(),
            store: Some(store),
            anti_store: Some(anti_store),
            options,
        }
    }

    /// Load persisted patterns; seed bootstrap patterns when empty.
    ///
    /// A corrupt pattern file logs and is treated as empty; a failure to
    /// persist the bootstrap seeds is fatal.
    pub async fn initialize(&self) -> Result<()> {
        let loaded: Vec<LearnedPattern> = match &self.store {
            Some(store) => match store.load_json().await {
                Ok(Some(patterns)) => patterns,
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable pattern file");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let anti_loaded: Vec<AntiPattern> = match &self.anti_store {
            Some(store) => match store.load_json().await {
                Ok(Some(antis)) => antis,
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable anti-pattern file");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let seeded;
        {
            let mut state = self.state.write().await;
            if loaded.is_empty() {
                for pattern in bootstrap_patterns() {
                    state.insert(pattern);
                }
                seeded = true;
            } else {
                for pattern in loaded {
                    state.insert(pattern);
                }
                seeded = false;
            }

            for anti in anti_loaded {
                state.anti.insert(anti);
            }
            state.purge_expired_anti_patterns();
        }

        if seeded {
            tracing::info!("Seeded bootstrap patterns");
            // Bootstrap failures are fatal at init time
            self.persist().await?;
            self.flush().await?;
        }

        Ok(())
    }

    /// Number of stored patterns.
    pub async fn pattern_count(&self) -> usize {
        self.state.read().await.patterns.len()
    }

    /// Fetch a pattern by id.
    pub async fn get_pattern(&self, id: &str) -> Option<LearnedPattern> {
        self.state.read().await.patterns.get(id).cloned()
    }

    /// All patterns indexed under a domain.
    pub async fn get_patterns_for_domain(&self, domain: &str) -> Vec<LearnedPattern> {
        let state = self.state.read().await;
        let mut ids: Vec<&String> = Vec::new();
        if let Some(found) = state.domain_index.get(domain) {
            ids.extend(found);
        }
        let stripped = strip_www(domain);
        if stripped != domain {
            if let Some(found) = state.domain_index.get(stripped) {
                ids.extend(found);
            }
        }
        ids.iter()
            .filter_map(|id| state.patterns.get(*id))
            .cloned()
            .collect()
    }

    /// All patterns of a template type.
    pub async fn get_patterns_by_type(&self, template_type: TemplateType) -> Vec<LearnedPattern> {
        let state = self.state.read().await;
        state
            .type_index
            .get(&template_type)
            .into_iter()
            .flatten()
            .filter_map(|id| state.patterns.get(id))
            .cloned()
            .collect()
    }

    /// Match a URL against the registry.
    ///
    /// Tier one scans only patterns indexed under the URL's hostname;
    /// tier two falls back to the remaining patterns (cross-domain
    /// discovery). Results are ordered by descending confidence; ties
    /// keep index insertion order. Patterns blocked by an active
    /// anti-pattern for this URL are skipped.
    pub async fn find_matching_patterns(&self, url: &str) -> Vec<PatternMatch> {
        let mut state = self.state.write().await;
        state.purge_expired_anti_patterns();

        let now = Utc::now();
        let blocked: Vec<String> = state
            .anti
            .values()
            .filter(|a| a.is_active(now) && a.matches_url(url))
            .map(|a| a.source_pattern_id.clone())
            .collect();

        let host = hostname_of(url);

        let tier_one_ids: Vec<String> = match &host {
            Some(host) => {
                let mut ids: Vec<String> = Vec::new();
                if let Some(found) = state.domain_index.get(host.as_str()) {
                    ids.extend(found.iter().cloned());
                }
                let stripped = strip_www(host);
                if stripped != host {
                    if let Some(found) = state.domain_index.get(stripped) {
                        for id in found {
                            index_id(&mut ids, id);
                        }
                    }
                }
                ids
            }
            // Hostname extraction failed: scan everything
            None => state.insertion_order.clone(),
        };

        let mut matches = self.match_ids(&state, &tier_one_ids, &blocked, url);

        if matches.is_empty() && host.is_some() {
            let remaining: Vec<String> = state
                .insertion_order
                .iter()
                .filter(|id| !tier_one_ids.contains(*id))
                .cloned()
                .collect();
            matches = self.match_ids(&state, &remaining, &blocked, url);
        }

        // Stable sort keeps insertion order for equal confidences
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }

    fn match_ids(
        &self,
        state: &RegistryState,
        ids: &[String],
        blocked: &[String],
        url: &str,
    ) -> Vec<PatternMatch> {
        ids.iter()
            .filter(|id| !blocked.contains(*id))
            .filter_map(|id| state.patterns.get(id))
            .filter_map(|pattern| match_pattern(url, pattern))
            .collect()
    }

    /// Store a new pattern, index it, and emit `pattern_learned`.
    pub async fn learn_pattern(&self, pattern: LearnedPattern) -> Result<String> {
        let id = pattern.id.clone();
        let event = PatternEvent::PatternLearned {
            pattern_id: id.clone(),
            template_type: pattern.template_type,
            domain: pattern
                .metrics
                .domains
                .first()
                .cloned()
                .unwrap_or_default(),
        };

        {
            let mut state = self.state.write().await;
            state.insert(pattern);
        }

        self.bus.emit(&event);
        self.persist().await?;
        Ok(id)
    }

    /// Apply a success or failure outcome to a pattern's metrics.
    pub async fn update_pattern_metrics(
        &self,
        id: &str,
        success: bool,
        domain: &str,
        response_time_ms: Option<u64>,
        failure_reason: Option<&str>,
    ) -> Result<()> {
        let mut events = Vec::new();

        {
            let mut state = self.state.write().await;
            let pattern = state
                .patterns
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("pattern {id}")))?;

            let confidence_before = pattern.metrics.confidence;

            if success {
                pattern
                    .metrics
                    .record_success(domain, response_time_ms.map(|ms| ms as f64));
            } else {
                pattern.metrics.record_failure(failure_reason);
            }
            pattern.updated_at = Utc::now();

            let confidence_after = pattern.metrics.confidence;
            events.push(PatternEvent::PatternApplied {
                pattern_id: id.to_string(),
                domain: domain.to_string(),
                success,
                confidence: confidence_after,
            });
            if (confidence_after - confidence_before).abs() > self.options.confidence_epsilon {
                events.push(PatternEvent::ConfidenceDecayed {
                    pattern_id: id.to_string(),
                    from: confidence_before,
                    to: confidence_after,
                });
            }

            if success {
                state.reindex_domain(id, domain);
            }
        }

        for event in &events {
            self.bus.emit(event);
        }
        self.persist().await
    }

    /// Multiply a pattern's confidence by a factor, clamped to [0, 1].
    ///
    /// Used by transfer outcome tracking, where validation boosts or cuts
    /// confidence beyond the plain success ratio.
    pub async fn scale_confidence(&self, id: &str, factor: f64) -> Result<f64> {
        let mut event = None;
        let scaled;

        {
            let mut state = self.state.write().await;
            let pattern = state
                .patterns
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("pattern {id}")))?;

            let before = pattern.metrics.confidence;
            scaled = (before * factor).clamp(0.0, 1.0);
            pattern.metrics.confidence = scaled;
            pattern.updated_at = Utc::now();

            if (scaled - before).abs() > self.options.confidence_epsilon {
                event = Some(PatternEvent::ConfidenceDecayed {
                    pattern_id: id.to_string(),
                    from: before,
                    to: scaled,
                });
            }
        }

        if let Some(event) = event {
            self.bus.emit(&event);
        }
        self.persist().await?;
        Ok(scaled)
    }

    /// Learn from a successful API extraction.
    ///
    /// When a pattern already matches the source URL, only its metrics
    /// move. Otherwise a new pattern is created with inferred template
    /// type and content mapping, at initial confidence 0.5.
    pub async fn learn_from_extraction(&self, event: &ExtractionEvent) -> Result<String> {
        let domain = hostname_of(&event.source_url).unwrap_or_default();

        let existing = self
            .find_matching_patterns(&event.source_url)
            .await
            .into_iter()
            .next();

        if let Some(found) = existing {
            self.update_pattern_metrics(
                &found.pattern.id,
                true,
                &domain,
                event.response_time_ms,
                None,
            )
            .await?;
            return Ok(found.pattern.id);
        }

        let template_type =
            infer_template_type(&event.source_url, &event.api_url, event.strategy);

        let url_pattern = derive_url_pattern(&event.source_url)
            .ok_or_else(|| Error::InvalidInput(format!("Unparseable URL: {}", event.source_url)))?;

        let endpoint_template = match template_type {
            TemplateType::JsonSuffix => "{url}.json".to_string(),
            _ => event.api_url.clone(),
        };

        let mut pattern = LearnedPattern::new(
            format!("learned:{}", Uuid::new_v4()),
            template_type,
            vec![url_pattern],
            endpoint_template,
        );
        pattern.method = event.method.clone();
        pattern.content_mapping = infer_content_mapping(&event.response, &event.content);
        pattern.metrics.success_count = 1;
        pattern.metrics.confidence = 0.5;
        pattern.metrics.last_success = Some(Utc::now());
        pattern.metrics.add_domain(&domain);
        if let Some(rt) = event.response_time_ms {
            pattern.metrics.avg_response_time = rt as f64;
        }

        self.learn_pattern(pattern).await
    }

    /// Record a failure against a pattern: classify it, update metrics and
    /// the recent-failure ring, and synthesize an anti-pattern when the
    /// category count crosses the threshold.
    pub async fn record_pattern_failure(
        &self,
        id: &str,
        domain: &str,
        url: &str,
        status: Option<u16>,
        message: &str,
    ) -> Result<FailureAssessment> {
        let assessment = classify_failure(status, message, None);
        let mut events = Vec::new();

        {
            let mut state = self.state.write().await;
            let pattern = state
                .patterns
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("pattern {id}")))?;

            let confidence_before = pattern.metrics.confidence;
            pattern.metrics.record_failure(Some(message));
            pattern.metrics.push_recent_failure(
                FailureEvent {
                    category: assessment.category,
                    domain: domain.to_string(),
                    url: url.to_string(),
                    status,
                    message: message.to_string(),
                    at: Utc::now(),
                },
                self.options.recent_failures_cap,
            );
            pattern.updated_at = Utc::now();

            let confidence_after = pattern.metrics.confidence;
            events.push(PatternEvent::PatternApplied {
                pattern_id: id.to_string(),
                domain: domain.to_string(),
                success: false,
                confidence: confidence_after,
            });
            if (confidence_before - confidence_after).abs() > self.options.confidence_epsilon {
                events.push(PatternEvent::ConfidenceDecayed {
                    pattern_id: id.to_string(),
                    from: confidence_before,
                    to: confidence_after,
                });
            }

            let category_count = pattern.metrics.recent_failures_in(assessment.category);
            if assessment.should_create_anti_pattern
                && category_count >= self.options.anti_pattern_threshold
            {
                if let Some(event) =
                    self.upsert_anti_pattern(&mut state, id, domain, url, assessment.category)
                {
                    events.push(event);
                }
            }
        }

        for event in &events {
            self.bus.emit(event);
        }
        self.persist().await?;
        Ok(assessment)
    }

    /// Create or refresh the anti-pattern keyed by `(pattern, category)`.
    fn upsert_anti_pattern(
        &self,
        state: &mut RegistryState,
        pattern_id: &str,
        domain: &str,
        url: &str,
        category: FailureCategory,
    ) -> Option<PatternEvent> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.options.anti_pattern_ttl_hours);

        if let Some(anti) = state.anti.get_by_key_mut(pattern_id, category) {
            anti.failure_count += 1;
            anti.last_seen = now;
            anti.expires_at = expires_at;
            if !anti.domains.iter().any(|d| d == domain) {
                anti.domains.push(domain.to_string());
            }
            return None;
        }

        let url_pattern = derive_url_pattern(url)
            .unwrap_or_else(|| format!("^{}", siphon_common::util::escape_regex(url)));
        let anti = AntiPattern {
            id: format!("anti:{}", Uuid::new_v4()),
            source_pattern_id: pattern_id.to_string(),
            failure_category: category,
            domains: vec![domain.to_string()],
            url_pattern,
            failure_count: self.options.anti_pattern_threshold as u64,
            first_seen: now,
            last_seen: now,
            expires_at,
        };

        let anti_id = anti.id.clone();
        state.anti.insert(anti);
        if let Some(pattern) = state.patterns.get_mut(pattern_id) {
            pattern.metrics.active_anti_patterns.push(anti_id.clone());
        }

        Some(PatternEvent::AntiPatternCreated {
            anti_pattern_id: anti_id,
            source_pattern_id: pattern_id.to_string(),
            category,
        })
    }

    /// Active anti-patterns matching a URL. Expired entries are purged.
    pub async fn check_anti_patterns(&self, url: &str) -> Vec<AntiPattern> {
        let mut state = self.state.write().await;
        state.purge_expired_anti_patterns();
        let now = Utc::now();
        state
            .anti
            .values()
            .filter(|a| a.is_active(now) && a.matches_url(url))
            .cloned()
            .collect()
    }

    /// Fetch an anti-pattern by its `(pattern, category)` key.
    pub async fn get_anti_pattern_for(
        &self,
        pattern_id: &str,
        category: FailureCategory,
    ) -> Option<AntiPattern> {
        let state = self.state.read().await;
        state.anti.get_by_key(pattern_id, category).cloned()
    }

    /// Register an event listener; returns a handle for `unsubscribe`.
    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        self.bus.subscribe(listener)
    }

    /// Remove an event listener.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.bus.unsubscribe(id)
    }

    /// Archive stale and low-confidence patterns.
    pub async fn cleanup(&self) -> Result<usize> {
        let archive_cutoff = Utc::now() - Duration::days(self.options.archive_after_days);
        let mut events = Vec::new();

        {
            let mut state = self.state.write().await;
            state.purge_expired_anti_patterns();

            let stale: Vec<String> = state
                .patterns
                .values()
                .filter(|p| {
                    let last_used = p.metrics.last_success.unwrap_or(p.created_at);
                    last_used < archive_cutoff
                        || p.metrics.confidence < self.options.confidence_floor
                })
                .map(|p| p.id.clone())
                .collect();

            for id in stale {
                if let Some(pattern) = state.remove(&id) {
                    let reason = if pattern.metrics.confidence < self.options.confidence_floor {
                        "confidence below floor"
                    } else {
                        "unused past archive threshold"
                    };
                    events.push(PatternEvent::PatternArchived {
                        pattern_id: id,
                        reason: reason.to_string(),
                    });
                }
            }
        }

        for event in &events {
            self.bus.emit(event);
        }
        if !events.is_empty() {
            self.persist().await?;
        }
        Ok(events.len())
    }

    /// Snapshot all patterns in insertion order (the on-disk format).
    pub async fn export(&self) -> Vec<LearnedPattern> {
        self.state.read().await.export()
    }

    /// Replace registry contents with the given patterns.
    pub async fn import(&self, patterns: Vec<LearnedPattern>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state = RegistryState::default();
            for pattern in patterns {
                state.insert(pattern);
            }
        }
        self.persist().await
    }

    /// Queue a persistence write for current state.
    async fn persist(&self) -> Result<()> {
        let (patterns, antis) = {
            let state = self.state.read().await;
            (state.export(), state.export_anti_patterns())
        };
        if let Some(store) = &self.store {
            store.save_json(&patterns).await?;
        }
        if let Some(store) = &self.anti_store {
            store.save_json(&antis).await?;
        }
        Ok(())
    }

    /// Force pending persistence writes to disk.
    pub async fn flush(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.flush().await?;
        }
        if let Some(store) = &self.anti_store {
            store.flush().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PatternRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRegistry")
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

/// Convenience constructor wiring registry and stores from config.
pub async fn open_registry(
    config: &siphon_common::SiphonConfig,
) -> Result<Arc<PatternRegistry>> {
    let options = RegistryOptions::from_config(&config.registry, &config.failure);
    let store = JsonStore::new(config.data_dir.join("patterns.json"))?
        .with_debounce(std::time::Duration::from_millis(config.store.debounce_ms));
    let anti_store = JsonStore::new(config.data_dir.join("anti-patterns.json"))?
        .with_debounce(std::time::Duration::from_millis(config.store.debounce_ms));

    let registry = Arc::new(PatternRegistry::with_store(options, store, anti_store));
    registry.initialize().await?;
    Ok(registry)
}
