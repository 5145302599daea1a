//! Captured network traffic from a browser session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One captured request, including its body for mutation methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub at: DateTime<Utc>,
}

impl CapturedRequest {
    /// POST/PUT/PATCH/DELETE carry form submissions.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self.method.to_uppercase().as_str(),
            "POST" | "PUT" | "PATCH" | "DELETE"
        )
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Content type, lowercased, without parameters.
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type")
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
    }

    /// Body as UTF-8 text.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// Body parsed as JSON.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(self.body.as_deref()?).ok()
    }

    /// Body parsed as `application/x-www-form-urlencoded` pairs.
    pub fn body_form_pairs(&self) -> Option<Vec<(String, String)>> {
        let text = self.body_text()?;
        let pairs = text
            .split('&')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                Some((
                    urlencoding::decode(k).ok()?.into_owned(),
                    urlencoding::decode(v).ok()?.into_owned(),
                ))
            })
            .collect::<Vec<_>>();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs)
        }
    }
}

/// Captured response paired with a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl CapturedResponse {
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(self.body.as_deref()?).ok()
    }
}

/// WebSocket frame direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsDirection {
    Sent,
    Received,
}

/// One WebSocket frame observed through the CDP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedWsFrame {
    pub url: String,
    pub direction: WsDirection,
    pub payload: String,
    pub at: DateTime<Utc>,
}

/// Everything captured while a form was filled and submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormCapture {
    #[serde(default)]
    pub requests: Vec<(CapturedRequest, Option<CapturedResponse>)>,
    #[serde(default)]
    pub ws_frames: Vec<CapturedWsFrame>,
    /// URL the page settled on after navigation.
    pub final_url: Option<String>,
}

impl FormCapture {
    /// Mutation requests carrying a body, newest first.
    pub fn mutation_requests(&self) -> Vec<&(CapturedRequest, Option<CapturedResponse>)> {
        let mut requests: Vec<_> = self
            .requests
            .iter()
            .filter(|(req, _)| req.is_mutation() && req.body.is_some())
            .collect();
        requests.sort_by(|a, b| b.0.at.cmp(&a.0.at));
        requests
    }

    /// Frames the browser sent.
    pub fn sent_frames(&self) -> Vec<&CapturedWsFrame> {
        self.ws_frames
            .iter()
            .filter(|f| f.direction == WsDirection::Sent)
            .collect()
    }
}
