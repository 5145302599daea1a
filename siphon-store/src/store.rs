//! Debounced write-behind JSON store with atomic renames.
//!
//! Multiple `save` calls within the debounce window coalesce into a single
//! on-disk write; the last payload wins. Every on-disk write goes through a
//! unique temp file in the same directory followed by a rename, so readers
//! never observe a partially written file.

use crate::crypto::{self, EncryptionKey};
use siphon_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Default debounce window for write-behind saves.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Default)]
struct Pending {
    payload: Option<Vec<u8>>,
    write_scheduled: bool,
}

struct StoreInner {
    path: PathBuf,
    key: Option<EncryptionKey>,
    pending: Mutex<Pending>,
    // Serializes temp-file writes so at most one rename is in flight.
    disk: Mutex<()>,
}

impl StoreInner {
    async fn flush_pending(self: &Arc<Self>) -> Result<()> {
        let payload = {
            let mut pending = self.pending.lock().await;
            pending.write_scheduled = false;
            pending.payload.take()
        };

        match payload {
            Some(bytes) => self.write_to_disk(&bytes).await,
            None => Ok(()),
        }
    }

    async fn write_to_disk(&self, payload: &[u8]) -> Result<()> {
        let data = match &self.key {
            Some(key) => key.encrypt(payload)?,
            None => payload.to_vec(),
        };

        let _guard = self.disk.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        if let Err(e) = tokio::fs::write(&temp_path, &data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::Persistence(format!(
                "Failed to write {}: {e}",
                temp_path.display()
            )));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::Persistence(format!(
                "Failed to rename {} into place: {e}",
                temp_path.display()
            )));
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        self.path
            .with_file_name(format!("{file_name}.{}.tmp", Uuid::new_v4()))
    }
}

/// Persistent blob store backing one file on disk.
pub struct JsonStore {
    inner: Arc<StoreInner>,
    debounce: Duration,
}

impl JsonStore {
    /// Open a store for the given file, picking up the encryption key from
    /// the environment if configured.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let key = EncryptionKey::from_env()?;
        Ok(Self::with_key(path, key))
    }

    /// Open a store with an explicit (or explicitly absent) encryption key.
    pub fn with_key(path: impl AsRef<Path>, key: Option<EncryptionKey>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.as_ref().to_path_buf(),
                key,
                pending: Mutex::new(Pending::default()),
                disk: Mutex::new(()),
            }),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Override the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Load the stored payload, or `None` if the file does not exist.
    ///
    /// Plaintext files are transparently re-encrypted on read when a key is
    /// configured (migration on read).
    pub async fn load(&self) -> Result<Option<Vec<u8>>> {
        let content = match tokio::fs::read(&self.inner.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if crypto::is_encrypted(&content) {
            let key = self.inner.key.as_ref().ok_or_else(|| {
                Error::Persistence(format!(
                    "{} is encrypted but {} is not set",
                    self.inner.path.display(),
                    crypto::encryption_env_var()
                ))
            })?;
            return Ok(Some(key.decrypt(&content)?));
        }

        if self.inner.key.is_some() {
            tracing::info!(path = %self.inner.path.display(), "Re-encrypting plaintext store file");
            self.inner.write_to_disk(&content).await?;
        }

        Ok(Some(content))
    }

    /// Queue a payload for writing. Calls within the debounce window
    /// coalesce; the final payload supersedes prior ones.
    pub async fn save(&self, payload: Vec<u8>) {
        let mut pending = self.inner.pending.lock().await;
        pending.payload = Some(payload);

        if !pending.write_scheduled {
            pending.write_scheduled = true;
            let inner = Arc::clone(&self.inner);
            let debounce = self.debounce;
            tokio::spawn(async move {
                tokio::time::sleep(debounce).await;
                if let Err(e) = inner.flush_pending().await {
                    tracing::error!(error = %e, "Debounced store write failed");
                }
            });
        }
    }

    /// Write any pending payload to disk immediately.
    pub async fn flush(&self) -> Result<()> {
        self.inner.flush_pending().await
    }

    /// Serialize a value and queue it for writing.
    pub async fn save_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.save(bytes).await;
        Ok(())
    }

    /// Load and deserialize the stored value, if present.
    pub async fn load_json<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.load().await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fast_store(path: impl AsRef<Path>) -> JsonStore {
        JsonStore::with_key(path, None).with_debounce(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let store = fast_store(dir.path().join("missing.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_flush_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = fast_store(dir.path().join("patterns.json"));

        store.save(b"[1,2,3]".to_vec()).await;
        store.flush().await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, b"[1,2,3]");
    }

    #[tokio::test]
    async fn test_debounce_last_save_wins() {
        let dir = tempdir().unwrap();
        let store = fast_store(dir.path().join("patterns.json"));

        store.save(b"first".to_vec()).await;
        store.save(b"second".to_vec()).await;
        store.save(b"third".to_vec()).await;
        store.flush().await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, b"third");
    }

    #[tokio::test]
    async fn test_debounced_write_lands_without_flush() {
        let dir = tempdir().unwrap();
        let store = fast_store(dir.path().join("patterns.json"));

        store.save(b"payload".to_vec()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, b"payload");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = fast_store(dir.path().join("patterns.json"));

        store.save(b"data".to_vec()).await;
        store.flush().await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_encrypted_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        let key = EncryptionKey::new([5u8; 32]);
        let store = JsonStore::with_key(&path, Some(key.clone()))
            .with_debounce(Duration::from_millis(10));

        store.save(br#"{"hello":"world"}"#.to_vec()).await;
        store.flush().await.unwrap();

        // On-disk content is the envelope, not the payload
        let raw = std::fs::read(&path).unwrap();
        assert!(crypto::is_encrypted(&raw));

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, br#"{"hello":"world"}"#);
    }

    #[tokio::test]
    async fn test_plaintext_migrates_on_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        std::fs::write(&path, b"[]").unwrap();

        let key = EncryptionKey::new([5u8; 32]);
        let store = JsonStore::with_key(&path, Some(key)).with_debounce(Duration::from_millis(10));

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, b"[]");

        let raw = std::fs::read(&path).unwrap();
        assert!(crypto::is_encrypted(&raw));
    }

    #[tokio::test]
    async fn test_encrypted_file_without_key_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patterns.json");

        let key = EncryptionKey::new([5u8; 32]);
        let writer =
            JsonStore::with_key(&path, Some(key)).with_debounce(Duration::from_millis(10));
        writer.save(b"secret".to_vec()).await;
        writer.flush().await.unwrap();

        let reader = JsonStore::with_key(&path, None);
        assert!(reader.load().await.is_err());
    }

    #[tokio::test]
    async fn test_save_json_load_json() {
        let dir = tempdir().unwrap();
        let store = fast_store(dir.path().join("value.json"));

        store.save_json(&vec![1u32, 2, 3]).await.unwrap();
        store.flush().await.unwrap();

        let back: Vec<u32> = store.load_json().await.unwrap().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
