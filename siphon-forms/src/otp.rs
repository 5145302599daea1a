//! One-time-password challenge detection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Statuses that commonly accompany a verification challenge.
const CHALLENGE_STATUSES: &[u16] = &[202, 401, 403, 428];

/// Response fields that flag a second factor.
static FIELD_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(requires2FA|requiresOTP|twoFactorRequired|mfaRequired|verification_required|challenge_type)""#,
    )
    .unwrap()
});

/// Message phrasings that flag a second factor.
static MESSAGE_INDICATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(verification code|2FA|\bOTP\b|authentication code|one-time password)")
        .unwrap()
});

/// Kind of second factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpKind {
    Totp,
    Sms,
    Email,
    Unknown,
}

/// Learned description of a site's verification step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OtpDescriptor {
    /// Indicators that fired when this was learned.
    #[serde(default)]
    pub indicators: Vec<String>,
    pub verification_endpoint: String,
    pub code_field: String,
    pub method: String,
    pub kind: OtpKind,
}

/// A live challenge interrupting a submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallenge {
    pub status: u16,
    pub indicators: Vec<String>,
    pub kind: OtpKind,
    /// Where to send the code, when the response revealed it.
    pub verification_endpoint: Option<String>,
}

/// Examine a response for an OTP challenge.
///
/// A structural field indicator is decisive on its own; a message-level
/// indicator only counts alongside a challenge status.
pub fn detect_otp_challenge(status: u16, body: &str) -> Option<OtpChallenge> {
    let mut end = body.len().min(16 * 1024);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    let head = &body[..end];

    let mut indicators = Vec::new();
    if let Some(found) = FIELD_INDICATOR.captures(head) {
        indicators.push(format!("field:{}", &found[1]));
    }
    if let Some(found) = MESSAGE_INDICATOR.find(head) {
        indicators.push(format!("message:{}", found.as_str()));
    }

    let status_hit = CHALLENGE_STATUSES.contains(&status);
    let field_hit = indicators.iter().any(|i| i.starts_with("field:"));

    if !field_hit && !(status_hit && !indicators.is_empty()) {
        return None;
    }

    let kind = infer_kind(head);
    let verification_endpoint = find_endpoint(head);

    Some(OtpChallenge {
        status,
        indicators,
        kind,
        verification_endpoint,
    })
}

fn infer_kind(body: &str) -> OtpKind {
    let lower = body.to_lowercase();
    if lower.contains("authenticator") || lower.contains("totp") {
        OtpKind::Totp
    } else if lower.contains("sms") || lower.contains("text message") || lower.contains("phone") {
        OtpKind::Sms
    } else if lower.contains("email") {
        OtpKind::Email
    } else {
        OtpKind::Unknown
    }
}

static ENDPOINT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:verification_url|verificationUrl|verify_endpoint|verifyEndpoint)"\s*:\s*"([^"]+)""#)
        .unwrap()
});

fn find_endpoint(body: &str) -> Option<String> {
    ENDPOINT_HINT
        .captures(body)
        .map(|captures| captures[1].to_string())
}

/// The body for submitting a code: `{<codeField>: code}`.
pub fn code_submission_body(descriptor: &OtpDescriptor, code: &str) -> serde_json::Value {
    serde_json::json!({ descriptor.code_field.clone(): code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_indicator_detects() {
        let challenge = detect_otp_challenge(401, r#"{"requires2FA": true}"#).unwrap();
        assert!(challenge.indicators[0].contains("requires2FA"));
    }

    #[test]
    fn test_field_indicator_wins_even_on_200() {
        assert!(detect_otp_challenge(200, r#"{"mfaRequired": true}"#).is_some());
    }

    #[test]
    fn test_message_needs_challenge_status() {
        let body = r#"{"message": "Enter the verification code we sent you"}"#;
        assert!(detect_otp_challenge(428, body).is_some());
        assert!(detect_otp_challenge(200, body).is_none());
    }

    #[test]
    fn test_plain_401_is_not_otp() {
        assert!(detect_otp_challenge(401, r#"{"error": "bad credentials"}"#).is_none());
    }

    #[test]
    fn test_kind_inference() {
        let sms = detect_otp_challenge(428, r#"{"requiresOTP": true, "message": "code sent by SMS"}"#)
            .unwrap();
        assert_eq!(sms.kind, OtpKind::Sms);

        let totp =
            detect_otp_challenge(428, r#"{"requiresOTP": true, "hint": "open your authenticator"}"#)
                .unwrap();
        assert_eq!(totp.kind, OtpKind::Totp);
    }

    #[test]
    fn test_endpoint_hint() {
        let challenge = detect_otp_challenge(
            428,
            r#"{"requiresOTP": true, "verification_url": "https://example.com/verify"}"#,
        )
        .unwrap();
        assert_eq!(
            challenge.verification_endpoint.as_deref(),
            Some("https://example.com/verify")
        );
    }

    #[test]
    fn test_code_submission_body() {
        let descriptor = OtpDescriptor {
            indicators: vec![],
            verification_endpoint: "https://example.com/verify".into(),
            code_field: "otp_code".into(),
            method: "POST".into(),
            kind: OtpKind::Sms,
        };
        let body = code_submission_body(&descriptor, "123456");
        assert_eq!(body["otp_code"], "123456");
    }
}
