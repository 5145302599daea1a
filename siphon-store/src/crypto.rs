//! At-rest encryption for store files.
//!
//! Payloads are wrapped in a versioned envelope so that loading can
//! distinguish encrypted content from plaintext:
//!
//! ```text
//! v1:<base64 nonce>:<base64 ciphertext+tag>
//! ```
//!
//! Uses AES-256-GCM with a random 96-bit nonce per write.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use siphon_common::{Error, Result};

/// Name of the environment variable holding the at-rest encryption key.
const ENCRYPTION_KEY_ENV: &str = "SIPHON_ENCRYPTION_KEY";

/// Envelope magic distinguishing encrypted files from plaintext.
const ENVELOPE_MAGIC: &str = "v1:";

/// Name of the environment variable that enables at-rest encryption.
pub fn encryption_env_var() -> &'static str {
    ENCRYPTION_KEY_ENV
}

/// A 256-bit key for at-rest encryption.
#[derive(Clone)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    /// Build a key from raw bytes.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Parse a key from a hex- or base64-encoded string.
    pub fn parse(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim();

        let bytes = if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(trimmed)
                .map_err(|e| Error::Config(format!("Invalid hex encryption key: {e}")))?
        } else {
            general_purpose::STANDARD
                .decode(trimmed)
                .map_err(|e| Error::Config(format!("Invalid base64 encryption key: {e}")))?
        };

        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            Error::Config(format!(
                "Encryption key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;

        Ok(Self::new(key))
    }

    /// Read the key from the environment, if configured.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(ENCRYPTION_KEY_ENV) {
            Ok(value) if !value.is_empty() => Self::parse(&value).map(Some),
            _ => Ok(None),
        }
    }

    /// Encrypt a payload into the versioned envelope.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new((&self.key).into());
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::Persistence("Encryption failed".into()))?;

        let envelope = format!(
            "{}{}:{}",
            ENVELOPE_MAGIC,
            general_purpose::STANDARD.encode(nonce),
            general_purpose::STANDARD.encode(ciphertext),
        );
        Ok(envelope.into_bytes())
    }

    /// Decrypt a versioned envelope back into the payload.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(envelope)
            .map_err(|_| Error::Persistence("Encrypted file is not valid UTF-8".into()))?;
        let body = text
            .strip_prefix(ENVELOPE_MAGIC)
            .ok_or_else(|| Error::Persistence("Missing encryption envelope header".into()))?;

        let (nonce_b64, ct_b64) = body
            .split_once(':')
            .ok_or_else(|| Error::Persistence("Malformed encryption envelope".into()))?;

        let nonce_bytes = general_purpose::STANDARD
            .decode(nonce_b64)
            .map_err(|e| Error::Persistence(format!("Invalid nonce encoding: {e}")))?;
        let ciphertext = general_purpose::STANDARD
            .decode(ct_b64)
            .map_err(|e| Error::Persistence(format!("Invalid ciphertext encoding: {e}")))?;

        if nonce_bytes.len() != 12 {
            return Err(Error::Persistence("Invalid nonce length".into()));
        }

        let cipher = Aes256Gcm::new((&self.key).into());
        let nonce = Nonce::from_slice(&nonce_bytes);
        cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| Error::Persistence("Decryption failed - wrong key?".into()))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("EncryptionKey").finish_non_exhaustive()
    }
}

/// Check whether file content carries the encryption envelope header.
pub fn is_encrypted(content: &[u8]) -> bool {
    content.starts_with(ENVELOPE_MAGIC.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey::new([7u8; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = br#"[{"id":"bootstrap:reddit"}]"#;

        let envelope = key.encrypt(plaintext).unwrap();
        assert!(is_encrypted(&envelope));

        let decrypted = key.decrypt(&envelope).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = test_key().encrypt(b"secret").unwrap();
        let other = EncryptionKey::new([9u8; 32]);
        assert!(other.decrypt(&envelope).is_err());
    }

    #[test]
    fn test_nonce_is_random() {
        let key = test_key();
        let a = key.encrypt(b"same").unwrap();
        let b = key.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_hex_key() {
        let hex_key = "00".repeat(32);
        assert!(EncryptionKey::parse(&hex_key).is_ok());
    }

    #[test]
    fn test_parse_base64_key() {
        let b64 = general_purpose::STANDARD.encode([3u8; 32]);
        assert!(EncryptionKey::parse(&b64).is_ok());
    }

    #[test]
    fn test_parse_bad_length() {
        let b64 = general_purpose::STANDARD.encode([3u8; 16]);
        assert!(EncryptionKey::parse(&b64).is_err());
    }

    #[test]
    fn test_plaintext_is_not_encrypted() {
        assert!(!is_encrypted(b"[]"));
        assert!(!is_encrypted(b""));
    }
}
