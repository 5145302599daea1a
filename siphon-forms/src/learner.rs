//! Build a replayable form pattern from one browser capture.

use crate::browser::DetectedForm;
use crate::capture::{CapturedRequest, CapturedResponse, FormCapture};
use crate::fields::{infer_dynamic_fields, json_body_keys, map_fields};
use crate::otp::{detect_otp_challenge, OtpDescriptor};
use crate::pattern::{CsrfExtractor, FormEncoding, FormPattern, FormTransport, SuccessIndicators};
use crate::transport::{detect_transport, detect_ws_submission};
use siphon_common::{Error, Result};
use std::collections::HashMap;

/// Response fields recorded as success indicators, at most.
const MAX_INDICATOR_FIELDS: usize = 5;

/// Analyzes captures into form patterns.
pub struct FormLearner;

impl FormLearner {
    /// Analyze a capture taken while `form` was filled and submitted on
    /// `page_url`.
    ///
    /// The submit request is the captured mutation whose body mentions
    /// the most form fields; when none qualifies, captured WebSocket
    /// frames are scored instead.
    pub fn analyze(
        page_url: &str,
        form: &DetectedForm,
        capture: &FormCapture,
    ) -> Result<FormPattern> {
        let field_names = form.field_names();

        if let Some((request, response)) = Self::pick_submission(capture, &field_names) {
            return Self::analyze_http(page_url, form, request, response.as_ref());
        }

        let sent = capture.sent_frames();
        if let Some(descriptor) = detect_ws_submission(&sent, &field_names) {
            let mut pattern = FormPattern::new(
                page_url,
                descriptor.url.clone(),
                FormTransport::Websocket,
                FormEncoding::Json,
            );
            pattern.form_selector = Some(form.selector.clone());
            pattern.field_mapping = Self::map_against_payload(form, &descriptor.payload_template);
            pattern.websocket = Some(descriptor);
            pattern.dynamic_fields = infer_dynamic_fields(form, &HashMap::new());
            return Ok(pattern);
        }

        Err(Error::NotFound(
            "no submission request found in capture".into(),
        ))
    }

    /// Choose the mutation request whose body mentions the most form
    /// fields; newest wins ties.
    fn pick_submission<'a>(
        capture: &'a FormCapture,
        field_names: &[String],
    ) -> Option<&'a (CapturedRequest, Option<CapturedResponse>)> {
        let candidates = capture.mutation_requests();
        if candidates.is_empty() {
            return None;
        }

        let mut best: Option<(usize, &(CapturedRequest, Option<CapturedResponse>))> = None;
        for entry in candidates {
            let body = entry.0.body_text().unwrap_or_default();
            let score = field_names
                .iter()
                .filter(|name| body.contains(name.as_str()))
                .count();
            if best.map_or(true, |(b, _)| score > b) {
                best = Some((score, entry));
            }
        }

        best.map(|(_, entry)| entry)
    }

    fn analyze_http(
        page_url: &str,
        form: &DetectedForm,
        request: &CapturedRequest,
        response: Option<&CapturedResponse>,
    ) -> Result<FormPattern> {
        let detection = detect_transport(page_url, request);
        let content_type = request.content_type().unwrap_or_default();
        let encoding = if content_type.is_empty() {
            FormEncoding::from_content_type(&form.effective_enctype())
        } else {
            FormEncoding::from_content_type(&content_type)
        };

        let mut pattern = FormPattern::new(page_url, &request.url, detection.transport, encoding);
        pattern.form_selector = Some(form.selector.clone());
        pattern.method = request.method.to_uppercase();
        pattern.server_action = detection.server_action;
        pattern.graphql = detection.graphql;
        pattern.json_rpc = detection.json_rpc;
        pattern.file_fields = form.file_fields.clone();

        pattern.field_mapping = Self::map_for_transport(&pattern, form, request);

        // CSRF candidates become an extraction plan
        if let Some(candidate) = form.csrf_candidates.first() {
            let dom_selector = if candidate.selector.is_empty() {
                r#"meta[name="csrf-token"]"#.to_string()
            } else {
                candidate.selector.clone()
            };
            pattern.csrf = Some(CsrfExtractor {
                field_name: candidate.name.clone(),
                dom_selector,
            });
        }

        pattern.dynamic_fields = infer_dynamic_fields(form, &HashMap::new());

        if let Some(response) = response {
            pattern.success_indicators = Self::success_indicators(response);

            if let Some(body) = response.body_text() {
                if let Some(challenge) = detect_otp_challenge(response.status, &body) {
                    pattern.otp = Some(OtpDescriptor {
                        indicators: challenge.indicators.clone(),
                        verification_endpoint: challenge
                            .verification_endpoint
                            .clone()
                            .unwrap_or_else(|| request.url.clone()),
                        code_field: "code".to_string(),
                        method: "POST".to_string(),
                        kind: challenge.kind,
                    });
                }
            }
        }

        // Replay needs the non-ambient request headers
        for (name, value) in &request.headers {
            let lower = name.to_lowercase();
            if matches!(lower.as_str(), "content-type" | "next-action" | "x-requested-with") {
                pattern.headers.insert(name.clone(), value.clone());
            }
        }

        Ok(pattern)
    }

    /// Field mapping targets differ by transport: GraphQL maps into
    /// `variables`, JSON-RPC into `params`, server actions exclude the
    /// `_action` discriminator.
    fn map_for_transport(
        pattern: &FormPattern,
        form: &DetectedForm,
        request: &CapturedRequest,
    ) -> HashMap<String, String> {
        let keys: Vec<String> = match pattern.transport {
            FormTransport::Graphql => request
                .body_json()
                .and_then(|b| b.get("variables").map(|v| flatten_keys(v)))
                .unwrap_or_default(),
            FormTransport::JsonRpc => request
                .body_json()
                .and_then(|b| b.get("params").map(|v| flatten_keys(v)))
                .unwrap_or_default(),
            _ => {
                if let Some(body) = request.body_json() {
                    json_body_keys(&body)
                } else if let Some(pairs) = request.body_form_pairs() {
                    pairs
                        .into_iter()
                        .map(|(k, _)| k)
                        .filter(|k| k != "_action")
                        .collect()
                } else {
                    Vec::new()
                }
            }
        };

        map_fields(&form.fields, &keys)
    }

    fn map_against_payload(form: &DetectedForm, payload: &str) -> HashMap<String, String> {
        let keys: Vec<String> = serde_json::from_str::<serde_json::Value>(payload)
            .ok()
            .map(|v| flatten_keys(&v))
            .unwrap_or_default();
        map_fields(&form.fields, &keys)
    }

    fn success_indicators(response: &CapturedResponse) -> SuccessIndicators {
        let response_fields = response
            .body_json()
            .and_then(|body| {
                body.as_object().map(|object| {
                    object
                        .keys()
                        .take(MAX_INDICATOR_FIELDS)
                        .cloned()
                        .collect::<Vec<_>>()
                })
            })
            .unwrap_or_default();

        SuccessIndicators {
            status_codes: vec![response.status],
            response_fields,
        }
    }
}

/// Keys of an object, one level of nesting deep.
fn flatten_keys(value: &serde_json::Value) -> Vec<String> {
    let Some(object) = value.as_object() else {
        return Vec::new();
    };
    let mut keys = Vec::new();
    for (key, child) in object {
        keys.push(key.clone());
        if let Some(nested) = child.as_object() {
            keys.extend(nested.keys().cloned());
        }
    }
    keys
}
