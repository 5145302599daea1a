//! Form submission: direct replay with browser fallback.

use crate::browser::BrowserPage;
use crate::fields::ExtractionStrategy;
use crate::learner::FormLearner;
use crate::otp::{code_submission_body, detect_otp_challenge, OtpChallenge};
use crate::pattern::{FormEncoding, FormPattern, FormTransport, ServerActionKind};
use crate::ratelimit::RateLimitTracker;
use async_trait::async_trait;
use serde_json::{json, Value};
use siphon_common::util::hostname_of;
use siphon_common::{Error, FetchOptions, Fetcher, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// How the submission was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMethod {
    Browser,
    Api,
}

/// Result of `submit_form`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub success: bool,
    pub method: SubmissionMethod,
    pub response_url: Option<String>,
    pub response_data: Option<Value>,
    pub duration_ms: u64,
    /// A new pattern was learned during this submission.
    pub learned: bool,
    pub error: Option<String>,
    pub otp_required: bool,
    pub otp_challenge: Option<OtpChallenge>,
}

impl SubmissionOutcome {
    fn new(method: SubmissionMethod) -> Self {
        Self {
            success: false,
            method,
            response_url: None,
            response_data: None,
            duration_ms: 0,
            learned: false,
            error: None,
            otp_required: false,
            otp_challenge: None,
        }
    }
}

/// A file attached to a submission.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Options for one submission.
#[derive(Default)]
pub struct SubmitOptions {
    pub url: String,
    pub form_selector: Option<String>,
    pub files: HashMap<String, FileUpload>,
}

/// WebSocket client supplied by the embedding application.
#[async_trait]
pub trait WsClient: Send + Sync {
    /// Send one frame and return the first response frame.
    async fn send(&self, url: &str, payload: &str) -> Result<String>;
}

/// Callback for obtaining a verification code.
#[async_trait]
pub trait OtpPrompt: Send + Sync {
    /// Return a code, or `None` to cancel the submission.
    async fn prompt(&self, challenge: &OtpChallenge) -> Result<Option<String>>;
}

/// Submits forms, preferring learned direct calls and falling back to a
/// captured browser run that learns a fresh pattern.
pub struct FormSubmitter {
    fetcher: Arc<dyn Fetcher>,
    ws_client: Option<Arc<dyn WsClient>>,
    otp_prompt: Option<Arc<dyn OtpPrompt>>,
    rate_limits: RateLimitTracker,
    patterns: RwLock<HashMap<(String, String), FormPattern>>,
}

impl FormSubmitter {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            ws_client: None,
            otp_prompt: None,
            rate_limits: RateLimitTracker::new(),
            patterns: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_ws_client(mut self, client: Arc<dyn WsClient>) -> Self {
        self.ws_client = Some(client);
        self
    }

    pub fn with_otp_prompt(mut self, prompt: Arc<dyn OtpPrompt>) -> Self {
        self.otp_prompt = Some(prompt);
        self
    }

    /// Store a pattern for `(url, selector)`.
    pub async fn remember_pattern(&self, pattern: FormPattern) {
        let key = (
            pattern.page_url.clone(),
            pattern.form_selector.clone().unwrap_or_default(),
        );
        self.patterns.write().await.insert(key, pattern);
    }

    /// Look up a learned pattern.
    pub async fn pattern_for(&self, url: &str, selector: Option<&str>) -> Option<FormPattern> {
        let key = (url.to_string(), selector.unwrap_or_default().to_string());
        self.patterns.read().await.get(&key).cloned()
    }

    /// Rate-limit state for a domain.
    pub async fn rate_limit_for(&self, domain: &str) -> Option<crate::ratelimit::RateLimitRecord> {
        self.rate_limits.get(domain).await
    }

    /// Submit form data, trying the learned pattern first and falling
    /// back to a captured browser submission that learns a new one.
    pub async fn submit_form(
        &self,
        data: &HashMap<String, String>,
        page: &dyn BrowserPage,
        options: &SubmitOptions,
    ) -> SubmissionOutcome {
        let start = Instant::now();

        if let Some(pattern) = self
            .pattern_for(&options.url, options.form_selector.as_deref())
            .await
        {
            match self.try_direct(&pattern, data, options).await {
                DirectResult::Done(mut outcome) => {
                    outcome.duration_ms = start.elapsed().as_millis() as u64;
                    return outcome;
                }
                DirectResult::FallBack(reason) => {
                    tracing::debug!(url = %options.url, reason, "Direct submission fell back to browser");
                }
            }
        }

        let mut outcome = self.submit_via_browser(data, page, options).await;
        outcome.duration_ms = start.elapsed().as_millis() as u64;
        outcome
    }

    async fn try_direct(
        &self,
        pattern: &FormPattern,
        data: &HashMap<String, String>,
        options: &SubmitOptions,
    ) -> DirectResult {
        let mut outcome = SubmissionOutcome::new(SubmissionMethod::Api);
        let domain = hostname_of(&pattern.submit_url).unwrap_or_default();

        if let Err(e) = self.rate_limits.check(&domain).await {
            outcome.error = Some(e.to_string());
            return DirectResult::Done(outcome);
        }

        if pattern.requires_files() && options.files.is_empty() {
            outcome.error = Some(format!(
                "form requires file upload for {:?} but no files were provided",
                pattern
                    .file_fields
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
            ));
            return DirectResult::Done(outcome);
        }

        if pattern.transport == FormTransport::Websocket {
            return self.try_websocket(pattern, data, outcome).await;
        }

        let wire_data = self.wire_data(pattern, data);
        let (body, content_type) = match build_body(pattern, &wire_data, &options.files) {
            Ok(built) => built,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return DirectResult::Done(outcome);
            }
        };

        let mut fetch_options = FetchOptions {
            method: pattern.method.clone(),
            ..FetchOptions::default()
        };
        fetch_options.headers.insert("Content-Type".to_string(), content_type);
        for (name, value) in &pattern.headers {
            fetch_options.headers.insert(name.clone(), value.clone());
        }
        fetch_options.body = Some(body);

        let response = match self.fetcher.fetch(&pattern.submit_url, fetch_options).await {
            Ok(response) => response,
            Err(e) => return DirectResult::FallBack(format!("request failed: {e}")),
        };

        self.rate_limits
            .observe(&domain, response.status, &response.headers)
            .await;

        if response.status == 429 {
            let retry = self
                .rate_limits
                .get(&domain)
                .await
                .and_then(|r| r.retry_after_secs)
                .unwrap_or(60);
            outcome.error = Some(format!("rate limited; retry after {retry}s"));
            return DirectResult::Done(outcome);
        }

        let body_text = response.text();
        if let Some(challenge) = detect_otp_challenge(response.status, &body_text) {
            return self.resolve_otp(pattern, challenge, outcome).await;
        }

        let body_json = response.json_value().ok();
        if pattern
            .success_indicators
            .matches(response.status, body_json.as_ref())
        {
            outcome.success = true;
            outcome.response_url = Some(pattern.submit_url.clone());
            outcome.response_data = body_json;
            return DirectResult::Done(outcome);
        }

        DirectResult::FallBack(format!(
            "response (status {}) did not satisfy success indicators",
            response.status
        ))
    }

    async fn try_websocket(
        &self,
        pattern: &FormPattern,
        data: &HashMap<String, String>,
        mut outcome: SubmissionOutcome,
    ) -> DirectResult {
        let Some(descriptor) = &pattern.websocket else {
            return DirectResult::FallBack("websocket pattern missing descriptor".into());
        };
        let Some(client) = &self.ws_client else {
            return DirectResult::FallBack("no websocket client configured".into());
        };

        let payload = fill_ws_payload(&descriptor.payload_template, &self.wire_data(pattern, data));
        match client.send(&descriptor.url, &payload).await {
            Ok(reply) => {
                outcome.success = true;
                outcome.response_url = Some(descriptor.url.clone());
                outcome.response_data = serde_json::from_str(&reply).ok();
                DirectResult::Done(outcome)
            }
            Err(e) => DirectResult::FallBack(format!("websocket send failed: {e}")),
        }
    }

    async fn resolve_otp(
        &self,
        pattern: &FormPattern,
        challenge: OtpChallenge,
        mut outcome: SubmissionOutcome,
    ) -> DirectResult {
        outcome.otp_required = true;

        let Some(prompt) = &self.otp_prompt else {
            outcome.error = Some(
                "verification code required but no OTP callback is configured".to_string(),
            );
            outcome.otp_challenge = Some(challenge);
            return DirectResult::Done(outcome);
        };

        let code = match prompt.prompt(&challenge).await {
            Ok(Some(code)) => code,
            Ok(None) => {
                outcome.error = Some("verification cancelled by caller".to_string());
                outcome.otp_challenge = Some(challenge);
                return DirectResult::Done(outcome);
            }
            Err(e) => {
                outcome.error = Some(format!("OTP callback failed: {e}"));
                outcome.otp_challenge = Some(challenge);
                return DirectResult::Done(outcome);
            }
        };

        let descriptor = pattern.otp.clone().unwrap_or(crate::otp::OtpDescriptor {
            indicators: challenge.indicators.clone(),
            verification_endpoint: challenge
                .verification_endpoint
                .clone()
                .unwrap_or_else(|| pattern.submit_url.clone()),
            code_field: "code".to_string(),
            method: "POST".to_string(),
            kind: challenge.kind,
        });

        let body = code_submission_body(&descriptor, &code);
        let fetch_options = FetchOptions::post_json(body.to_string().into_bytes());
        match self
            .fetcher
            .fetch(&descriptor.verification_endpoint, fetch_options)
            .await
        {
            Ok(response) if response.is_success() => {
                outcome.success = true;
                outcome.otp_required = false;
                outcome.response_url = Some(descriptor.verification_endpoint.clone());
                outcome.response_data = response.json_value().ok();
                DirectResult::Done(outcome)
            }
            Ok(response) => {
                outcome.error = Some(format!(
                    "verification failed with status {}",
                    response.status
                ));
                outcome.otp_challenge = Some(challenge);
                DirectResult::Done(outcome)
            }
            Err(e) => {
                outcome.error = Some(format!("verification request failed: {e}"));
                outcome.otp_challenge = Some(challenge);
                DirectResult::Done(outcome)
            }
        }
    }

    /// Map form data onto wire names and resolve computable dynamic
    /// fields. DOM/cookie strategies need the browser and are left to
    /// the caller's data.
    fn wire_data(&self, pattern: &FormPattern, data: &HashMap<String, String>) -> HashMap<String, String> {
        let mut wire = HashMap::new();
        for (name, value) in data {
            let target = pattern
                .field_mapping
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.clone());
            wire.insert(target, value.clone());
        }

        for dynamic in &pattern.dynamic_fields {
            if wire.contains_key(&dynamic.name) {
                continue;
            }
            if let ExtractionStrategy::Computed { producer } = &dynamic.extraction {
                let value = match producer.as_str() {
                    "now" => chrono::Utc::now().timestamp().to_string(),
                    "uuid4" => uuid::Uuid::new_v4().to_string(),
                    _ => continue,
                };
                wire.insert(dynamic.name.clone(), value);
            }
        }

        wire
    }

    async fn submit_via_browser(
        &self,
        data: &HashMap<String, String>,
        page: &dyn BrowserPage,
        options: &SubmitOptions,
    ) -> SubmissionOutcome {
        let mut outcome = SubmissionOutcome::new(SubmissionMethod::Browser);

        let result: Result<SubmissionOutcome> = async {
            page.navigate(&options.url).await?;
            let forms = page
                .detect_forms(options.form_selector.as_deref())
                .await?;
            let form = forms
                .into_iter()
                .next()
                .ok_or_else(|| Error::NotFound("no form found on page".into()))?;

            page.start_capture().await?;

            for field in &form.fields {
                if let Some(value) = data.get(&field.name) {
                    page.fill(&field.selector, value).await?;
                }
            }

            if let Some(submit) = &form.submit_selector {
                page.click(submit).await?;
            }
            let final_url = page.wait_for_navigation().await?;
            let mut capture = page.stop_capture().await?;
            capture.final_url = final_url.clone();

            let mut done = SubmissionOutcome::new(SubmissionMethod::Browser);
            done.response_url = final_url;

            match FormLearner::analyze(&options.url, &form, &capture) {
                Ok(mut pattern) => {
                    pattern.form_selector = options.form_selector.clone();
                    if let Some((_, Some(response))) = capture.mutation_requests().first() {
                        done.success = pattern
                            .success_indicators
                            .matches(response.status, response.body_json().as_ref());
                        done.response_data = response.body_json();
                    } else {
                        // Navigation without a visible failure counts
                        done.success = true;
                    }
                    done.learned = true;
                    self.remember_pattern(pattern).await;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "No pattern learned from capture");
                    done.success = capture.final_url.is_some();
                }
            }

            Ok(done)
        }
        .await;

        match result {
            Ok(done) => done,
            Err(e) => {
                outcome.error = Some(e.to_string());
                outcome
            }
        }
    }
}

enum DirectResult {
    Done(SubmissionOutcome),
    FallBack(String),
}

/// Build the request body for a pattern's transport and encoding.
fn build_body(
    pattern: &FormPattern,
    wire_data: &HashMap<String, String>,
    files: &HashMap<String, FileUpload>,
) -> Result<(Vec<u8>, String)> {
    match pattern.transport {
        FormTransport::Graphql => {
            let descriptor = pattern
                .graphql
                .as_ref()
                .ok_or_else(|| Error::Internal("graphql pattern missing descriptor".into()))?;
            let body = json!({
                "query": descriptor.query,
                "variables": wire_data,
            });
            Ok((body.to_string().into_bytes(), "application/json".into()))
        }
        FormTransport::JsonRpc => {
            let descriptor = pattern
                .json_rpc
                .as_ref()
                .ok_or_else(|| Error::Internal("json-rpc pattern missing descriptor".into()))?;
            let mut body = serde_json::Map::new();
            if descriptor.version2 {
                body.insert("jsonrpc".into(), json!("2.0"));
            }
            body.insert("method".into(), json!(descriptor.method));
            body.insert("params".into(), json!(wire_data));
            body.insert("id".into(), json!(1));
            Ok((
                Value::Object(body).to_string().into_bytes(),
                "application/json".into(),
            ))
        }
        FormTransport::ServerAction => {
            let kind = pattern
                .server_action
                .as_ref()
                .map(|a| a.kind)
                .unwrap_or(ServerActionKind::Remix);
            match kind {
                ServerActionKind::NextJs => {
                    // The Next-Action header in pattern.headers routes it
                    Ok((
                        json!(wire_data).to_string().into_bytes(),
                        "application/json".into(),
                    ))
                }
                ServerActionKind::Remix => {
                    let mut pairs: Vec<(String, String)> = Vec::new();
                    if let Some(action) = pattern
                        .server_action
                        .as_ref()
                        .and_then(|a| a.action_id.clone())
                    {
                        pairs.push(("_action".to_string(), action));
                    }
                    for (k, v) in wire_data {
                        pairs.push((k.clone(), v.clone()));
                    }
                    Ok((
                        encode_form_pairs(&pairs).into_bytes(),
                        "application/x-www-form-urlencoded".into(),
                    ))
                }
            }
        }
        FormTransport::Rest | FormTransport::Websocket => match pattern.encoding {
            FormEncoding::Json => Ok((
                json!(wire_data).to_string().into_bytes(),
                "application/json".into(),
            )),
            FormEncoding::Urlencoded => {
                let pairs: Vec<(String, String)> = wire_data
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Ok((
                    encode_form_pairs(&pairs).into_bytes(),
                    "application/x-www-form-urlencoded".into(),
                ))
            }
            FormEncoding::Multipart => {
                let boundary = format!("----siphon{}", uuid::Uuid::new_v4().simple());
                let body = multipart_body(&boundary, wire_data, files);
                Ok((body, format!("multipart/form-data; boundary={boundary}")))
            }
        },
    }
}

fn encode_form_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k),
                urlencoding::encode(v)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn multipart_body(
    boundary: &str,
    fields: &HashMap<String, String>,
    files: &HashMap<String, FileUpload>,
) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    for (name, file) in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\n",
                file.filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        body.extend_from_slice(&file.bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Substitute fresh values into a captured WebSocket payload.
fn fill_ws_payload(template: &str, wire_data: &HashMap<String, String>) -> String {
    // Socket.IO event frames keep their "42" prefix
    let (prefix, json_part) = if let Some(stripped) = template.strip_prefix("42") {
        ("42", stripped)
    } else {
        ("", template)
    };

    let Ok(mut value) = serde_json::from_str::<Value>(json_part) else {
        return template.to_string();
    };

    fn substitute(value: &mut Value, wire_data: &HashMap<String, String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    if let Some(fresh) = wire_data.get(key) {
                        *child = Value::String(fresh.clone());
                    } else {
                        substitute(child, wire_data);
                    }
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    substitute(child, wire_data);
                }
            }
            _ => {}
        }
    }

    substitute(&mut value, wire_data);
    format!("{prefix}{value}")
}
