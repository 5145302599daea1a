//! Form pattern: a replayable description of one form submission.

use crate::fields::DynamicField;
use crate::otp::OtpDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the submission travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormTransport {
    Rest,
    Graphql,
    JsonRpc,
    ServerAction,
    Websocket,
}

/// How the body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormEncoding {
    Urlencoded,
    Multipart,
    Json,
}

impl FormEncoding {
    /// Map a content type onto an encoding.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.contains("json") {
            Self::Json
        } else if content_type.contains("multipart") {
            Self::Multipart
        } else {
            Self::Urlencoded
        }
    }

    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Urlencoded => "application/x-www-form-urlencoded",
            Self::Multipart => "multipart/form-data",
            Self::Json => "application/json",
        }
    }
}

/// Server-action framework family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerActionKind {
    NextJs,
    Remix,
}

/// Next.js / Remix server-action details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerActionDescriptor {
    pub kind: ServerActionKind,
    /// `Next-Action` header value (Next.js) or `_action` field value (Remix).
    pub action_id: Option<String>,
}

/// GraphQL mutation details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlDescriptor {
    pub mutation_name: Option<String>,
    /// The captured mutation document, replayed with fresh variables.
    pub query: String,
}

/// JSON-RPC call details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JsonRpcDescriptor {
    pub method: String,
    /// `jsonrpc: "2.0"` was present.
    pub version2: bool,
}

/// WebSocket sub-protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WsProtocol {
    SocketIo,
    Sockjs,
    Raw,
}

/// WebSocket emission details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebsocketDescriptor {
    pub url: String,
    pub protocol: WsProtocol,
    /// Event name for Socket.IO-style emissions.
    pub event: Option<String>,
    /// The captured frame, replayed with fresh field values.
    pub payload_template: String,
}

/// CSRF token extraction plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsrfExtractor {
    /// Wire field the token is sent as.
    pub field_name: String,
    /// DOM selector to read the current token from.
    pub dom_selector: String,
}

/// What a successful response looks like.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuccessIndicators {
    #[serde(default)]
    pub status_codes: Vec<u16>,
    /// Top-level fields expected in the response body.
    #[serde(default)]
    pub response_fields: Vec<String>,
}

impl SuccessIndicators {
    /// Check a response against the indicators.
    pub fn matches(&self, status: u16, body: Option<&serde_json::Value>) -> bool {
        if !self.status_codes.is_empty() && !self.status_codes.contains(&status) {
            return false;
        }
        if !self.response_fields.is_empty() {
            let Some(body) = body.and_then(|b| b.as_object()) else {
                return false;
            };
            if !self.response_fields.iter().any(|f| body.contains_key(f)) {
                return false;
            }
        }
        true
    }
}

/// Replayable description of one form submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPattern {
    /// `form:<uuid>` or `ws:<uuid>` by transport.
    pub id: String,
    pub page_url: String,
    pub form_selector: Option<String>,
    pub submit_url: String,
    pub method: String,
    pub transport: FormTransport,
    pub encoding: FormEncoding,
    /// Form field name -> wire field name.
    #[serde(default)]
    pub field_mapping: HashMap<String, String>,
    #[serde(default)]
    pub file_fields: Vec<crate::browser::FileField>,
    pub csrf: Option<CsrfExtractor>,
    #[serde(default)]
    pub dynamic_fields: Vec<DynamicField>,
    pub server_action: Option<ServerActionDescriptor>,
    pub graphql: Option<GraphqlDescriptor>,
    pub json_rpc: Option<JsonRpcDescriptor>,
    pub websocket: Option<WebsocketDescriptor>,
    pub otp: Option<OtpDescriptor>,
    #[serde(default)]
    pub success_indicators: SuccessIndicators,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FormPattern {
    /// New pattern with empty mappings.
    pub fn new(
        page_url: impl Into<String>,
        submit_url: impl Into<String>,
        transport: FormTransport,
        encoding: FormEncoding,
    ) -> Self {
        let now = Utc::now();
        let prefix = if transport == FormTransport::Websocket {
            "ws"
        } else {
            "form"
        };
        Self {
            id: format!("{prefix}:{}", uuid::Uuid::new_v4()),
            page_url: page_url.into(),
            form_selector: None,
            submit_url: submit_url.into(),
            method: "POST".to_string(),
            transport,
            encoding,
            field_mapping: HashMap::new(),
            file_fields: Vec::new(),
            csrf: None,
            dynamic_fields: Vec::new(),
            server_action: None,
            graphql: None,
            json_rpc: None,
            websocket: None,
            otp: None,
            success_indicators: SuccessIndicators::default(),
            headers: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Patterns with file fields cannot replay without files.
    pub fn requires_files(&self) -> bool {
        !self.file_fields.is_empty()
    }
}
