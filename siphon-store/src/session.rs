//! Persisted browser session state.
//!
//! One serialized session object per site: cookies, web storage, and an
//! authentication flag. Shares the atomic-rename and encryption rules of
//! the pattern file.

use crate::store::JsonStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siphon_common::Result;
use std::collections::HashMap;
use std::path::Path;

/// A single cookie captured from the browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Expiry as Unix seconds; session cookies carry none.
    pub expires: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Serialized session state for one site.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default)]
    pub cookies: Vec<CookieRecord>,
    #[serde(default)]
    pub local_storage: HashMap<String, String>,
    #[serde(default)]
    pub session_storage: HashMap<String, String>,
    #[serde(default)]
    pub is_authenticated: bool,
    pub last_used: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// True when no cookie is past its expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.cookies
            .iter()
            .all(|c| c.expires.map_or(true, |exp| exp > now.timestamp()))
    }
}

/// Store for a single session file.
pub struct SessionStore {
    store: JsonStore,
}

impl SessionStore {
    /// Open a session store at the given path, picking up the encryption
    /// key from the environment if configured.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            store: JsonStore::new(path)?,
        })
    }

    /// Open with an explicit backing store (used by tests).
    pub fn with_store(store: JsonStore) -> Self {
        Self { store }
    }

    /// Load the persisted session. A corrupt file logs a warning and
    /// yields `None` so a fresh session can be established.
    pub async fn load(&self) -> Result<Option<SessionRecord>> {
        let Some(bytes) = self.store.load().await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(
                    path = %self.store.path().display(),
                    error = %e,
                    "Discarding corrupt session file"
                );
                Ok(None)
            }
        }
    }

    /// Persist the session, stamping `last_used`.
    pub async fn save(&self, mut record: SessionRecord) -> Result<()> {
        record.last_used = Some(Utc::now());
        self.store.save_json(&record).await
    }

    /// Force any pending write to disk.
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn session_store(path: impl AsRef<Path>) -> SessionStore {
        SessionStore::with_store(
            JsonStore::with_key(path, None).with_debounce(Duration::from_millis(10)),
        )
    }

    fn sample_record() -> SessionRecord {
        SessionRecord {
            cookies: vec![CookieRecord {
                name: "sid".into(),
                value: "abc123".into(),
                domain: "example.com".into(),
                path: "/".into(),
                expires: None,
                secure: true,
                http_only: true,
            }],
            local_storage: HashMap::from([("theme".to_string(), "dark".to_string())]),
            session_storage: HashMap::new(),
            is_authenticated: true,
            last_used: None,
        }
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let dir = tempdir().unwrap();
        let store = session_store(dir.path().join("session.json"));

        store.save(sample_record()).await.unwrap();
        store.flush().await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert!(loaded.is_authenticated);
        assert_eq!(loaded.cookies[0].name, "sid");
        assert!(loaded.last_used.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_session_yields_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = session_store(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[test]
    fn test_session_freshness() {
        let mut record = sample_record();
        assert!(record.is_fresh(Utc::now()));

        record.cookies[0].expires = Some(Utc::now().timestamp() - 60);
        assert!(!record.is_fresh(Utc::now()));
    }
}
