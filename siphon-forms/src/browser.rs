//! Browser driver contract and form detection results.
//!
//! The headless driver itself is an external collaborator; this module
//! defines the surface the learner consumes and the shapes the in-page
//! detection script reports back.

use crate::capture::FormCapture;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siphon_common::Result;

/// One visible form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedField {
    pub name: String,
    /// Input type attribute (`text`, `email`, `hidden`, ...).
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    pub value: Option<String>,
    /// Stable selector: id, then name, then tag position.
    pub selector: String,
}

/// A file input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileField {
    pub name: String,
    pub selector: String,
    pub accept: Option<String>,
    #[serde(default)]
    pub multiple: bool,
}

/// A form located in the page.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectedForm {
    pub selector: String,
    #[serde(default)]
    pub fields: Vec<DetectedField>,
    #[serde(default)]
    pub file_fields: Vec<FileField>,
    /// Hidden fields whose names mention csrf/token/authenticity.
    #[serde(default)]
    pub csrf_candidates: Vec<DetectedField>,
    /// First submit button (or any button) in the form.
    pub submit_selector: Option<String>,
    /// Declared `enctype`, if any.
    pub enctype: Option<String>,
}

impl DetectedForm {
    /// Names of fillable fields.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Effective encoding: multipart is forced when file fields exist.
    pub fn effective_enctype(&self) -> String {
        if !self.file_fields.is_empty() {
            return "multipart/form-data".to_string();
        }
        self.enctype
            .clone()
            .unwrap_or_else(|| "application/x-www-form-urlencoded".to_string())
    }

    /// Whether a hidden field name marks a CSRF candidate.
    pub fn is_csrf_name(name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.contains("csrf") || lower.contains("token") || lower.contains("authenticity")
    }
}

/// The browser page surface consumed while learning a form.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to a URL and wait for load.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Run the in-page detection script; an optional selector narrows
    /// the search to one form.
    async fn detect_forms(&self, selector: Option<&str>) -> Result<Vec<DetectedForm>>;

    /// Fill a field by selector.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Click an element by selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Wait for navigation to settle; returns the final URL if it moved.
    async fn wait_for_navigation(&self) -> Result<Option<String>>;

    /// Begin capturing requests (with POST bodies) and WebSocket frames.
    async fn start_capture(&self) -> Result<()>;

    /// Stop capturing and hand back everything observed.
    async fn stop_capture(&self) -> Result<FormCapture>;
}
