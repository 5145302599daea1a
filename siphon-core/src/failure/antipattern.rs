//! Anti-pattern storage.
//!
//! The primary map (`id -> AntiPattern`) and the secondary index
//! (`(sourcePatternId, category) -> id`) are mutated together, always.
//! Every insertion updates both; every removal removes from both;
//! expiration sweeps remove from both.

use crate::failure::classifier::FailureCategory;
use crate::pattern::types::AntiPattern;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Secondary index key.
pub type AntiPatternKey = (String, FailureCategory);

/// Map plus secondary index, kept bisimilar.
#[derive(Debug, Default)]
pub struct AntiPatternIndex {
    by_id: HashMap<String, AntiPattern>,
    by_key: HashMap<AntiPatternKey, String>,
}

impl AntiPatternIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an anti-pattern, updating both structures. Replaces any
    /// entry already stored under the same `(pattern, category)` key.
    pub fn insert(&mut self, anti: AntiPattern) {
        let key = (anti.source_pattern_id.clone(), anti.failure_category);
        if let Some(previous_id) = self.by_key.insert(key, anti.id.clone()) {
            if previous_id != anti.id {
                self.by_id.remove(&previous_id);
            }
        }
        self.by_id.insert(anti.id.clone(), anti);
    }

    /// O(1) lookup through the secondary index.
    pub fn get_by_key(&self, pattern_id: &str, category: FailureCategory) -> Option<&AntiPattern> {
        let id = self.by_key.get(&(pattern_id.to_string(), category))?;
        self.by_id.get(id)
    }

    /// Mutable lookup through the secondary index.
    pub fn get_by_key_mut(
        &mut self,
        pattern_id: &str,
        category: FailureCategory,
    ) -> Option<&mut AntiPattern> {
        let id = self.by_key.get(&(pattern_id.to_string(), category))?.clone();
        self.by_id.get_mut(&id)
    }

    /// Lookup by id.
    pub fn get(&self, id: &str) -> Option<&AntiPattern> {
        self.by_id.get(id)
    }

    /// Remove by id, updating both structures.
    pub fn remove(&mut self, id: &str) -> Option<AntiPattern> {
        let anti = self.by_id.remove(id)?;
        self.by_key
            .remove(&(anti.source_pattern_id.clone(), anti.failure_category));
        Some(anti)
    }

    /// Drop expired entries from both structures; returns what was removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<AntiPattern> {
        let expired_ids: Vec<String> = self
            .by_id
            .values()
            .filter(|a| !a.is_active(now))
            .map(|a| a.id.clone())
            .collect();

        expired_ids
            .iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    /// All stored anti-patterns.
    pub fn values(&self) -> impl Iterator<Item = &AntiPattern> {
        self.by_id.values()
    }

    /// Snapshot for persistence.
    pub fn export(&self) -> Vec<AntiPattern> {
        self.by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Check both structures agree; used by tests to pin the invariant.
    #[cfg(test)]
    pub fn is_bisimilar(&self) -> bool {
        self.by_key.len() == self.by_id.len()
            && self.by_key.iter().all(|((pid, cat), id)| {
                self.by_id
                    .get(id)
                    .is_some_and(|a| &a.source_pattern_id == pid && a.failure_category == *cat)
            })
            && self.by_id.values().all(|a| {
                self.by_key
                    .get(&(a.source_pattern_id.clone(), a.failure_category))
                    == Some(&a.id)
            })
    }
}
