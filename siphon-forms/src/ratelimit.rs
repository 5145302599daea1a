//! Per-domain rate-limit tracking.
//!
//! `Retry-After` and `X-RateLimit-*` headers are parsed on every
//! response; further submissions to a limited domain are blocked until
//! the reset.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use siphon_common::{Error, Result};
use siphon_core::failure::{parse_rate_limit_reset, parse_retry_after};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Blocking waits never exceed this, whatever the server asks.
const MAX_BLOCK_SECS: i64 = 60;

/// Rate-limit state for one domain.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
    pub retry_after_secs: Option<u64>,
    pub last_rate_limit: Option<DateTime<Utc>>,
    pub rate_limit_count: u32,
}

impl RateLimitRecord {
    /// Instant until which submissions are blocked, if any.
    fn blocked_until(&self) -> Option<DateTime<Utc>> {
        let last = self.last_rate_limit?;
        let wait = self
            .retry_after_secs
            .map(|s| Duration::seconds(s as i64))
            .or_else(|| {
                self.reset_at
                    .map(|reset| (reset - last).max(Duration::zero()))
            })?;
        Some(last + wait.min(Duration::seconds(MAX_BLOCK_SECS)))
    }
}

/// Rate-limit table, keyed by domain.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    table: RwLock<HashMap<String, RateLimitRecord>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rate-limit headers off a response. A 429 marks the domain
    /// blocked; other statuses only refresh the observed quota.
    pub async fn observe(&self, domain: &str, status: u16, headers: &HashMap<String, String>) {
        let header = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };

        let now = Utc::now();
        let mut table = self.table.write().await;
        let record = table.entry(domain.to_string()).or_default();

        if let Some(value) = header("x-ratelimit-limit") {
            record.limit = value.trim().parse().ok();
        }
        if let Some(value) = header("x-ratelimit-remaining") {
            record.remaining = value.trim().parse().ok();
        }
        if let Some(value) = header("x-ratelimit-reset") {
            if let Some(wait) = parse_rate_limit_reset(value, now) {
                record.reset_at = Some(now + Duration::from_std(wait).unwrap_or_default());
            }
        }
        if let Some(value) = header("retry-after") {
            record.retry_after_secs = parse_retry_after(value, now).map(|d| d.as_secs());
        }

        if status == 429 {
            record.last_rate_limit = Some(now);
            record.rate_limit_count += 1;
            if record.retry_after_secs.is_none() && record.reset_at.is_none() {
                // No server guidance; fall back to the cap
                record.retry_after_secs = Some(MAX_BLOCK_SECS as u64);
            }
            tracing::warn!(
                domain,
                count = record.rate_limit_count,
                retry_after = ?record.retry_after_secs,
                "Rate limited"
            );
        }
    }

    /// Reject with `Error::RateLimited` while the domain is blocked.
    pub async fn check(&self, domain: &str) -> Result<()> {
        let table = self.table.read().await;
        let Some(record) = table.get(domain) else {
            return Ok(());
        };
        let Some(until) = record.blocked_until() else {
            return Ok(());
        };

        let now = Utc::now();
        if now < until {
            let retry_after_secs = (until - now).num_seconds().max(1) as u64;
            return Err(Error::RateLimited { retry_after_secs });
        }
        Ok(())
    }

    /// Snapshot of one domain's record.
    pub async fn get(&self, domain: &str) -> Option<RateLimitRecord> {
        self.table.read().await.get(domain).cloned()
    }
}
