//! HTTP fetch seam.
//!
//! The learning core never manages cookies or sessions itself; it calls
//! through a [`Fetcher`] supplied by the embedding application. A default
//! [`HttpFetcher`] built on `reqwest` is provided for standalone use and
//! for the documentation discovery probes.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Options for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl FetchOptions {
    /// GET with default settings.
    pub fn get() -> Self {
        Self::default()
    }

    /// POST with a JSON body.
    pub fn post_json(body: Vec<u8>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            method: "POST".to_string(),
            headers,
            body: Some(body),
            ..Self::default()
        }
    }

    /// Set a header, replacing any existing value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Response from a fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl FetchResponse {
    /// Build a response from raw parts.
    pub fn new(
        status: u16,
        status_text: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            status,
            status_text,
            headers,
            body,
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Raw body bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    /// Body as a dynamic JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value> {
        self.json()
    }
}

/// Cookie-aware HTTP fetch supplied by the embedding application.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: FetchOptions) -> Result<FetchResponse>;
}

/// Default fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: FetchOptions) -> Result<FetchResponse> {
        let method = reqwest::Method::from_bytes(options.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("Invalid HTTP method: {}", options.method)))?;

        let mut request = self.client.request(method, url);

        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = options.body {
            request = request.body(body);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::External(format!("Request to {url} failed: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::External(format!("Failed to read body from {url}: {e}")))?
            .to_vec();

        Ok(FetchResponse::new(status, status_text, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), "30".to_string());
        let response = FetchResponse::new(429, "Too Many Requests".into(), headers, Vec::new());

        assert_eq!(response.header("retry-after"), Some("30"));
        assert_eq!(response.header("RETRY-AFTER"), Some("30"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn test_response_json() {
        let response = FetchResponse::new(
            200,
            "OK".into(),
            HashMap::new(),
            br#"{"name":"lodash"}"#.to_vec(),
        );
        let value = response.json_value().unwrap();
        assert_eq!(value["name"], "lodash");
    }

    #[test]
    fn test_fetch_options_builders() {
        let options = FetchOptions::post_json(b"{}".to_vec()).with_header("X-Custom", "1");
        assert_eq!(options.method, "POST");
        assert_eq!(options.headers.get("Content-Type").unwrap(), "application/json");
        assert_eq!(options.headers.get("X-Custom").unwrap(), "1");
    }
}
