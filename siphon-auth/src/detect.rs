//! Auth challenge detection from response shape.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

/// Body bytes scanned for auth phrases.
const BODY_SCAN_LIMIT: usize = 10 * 1024;

/// Challenge classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthChallengeKind {
    #[serde(rename = "http_401")]
    Http401,
    #[serde(rename = "http_403")]
    Http403,
    LoginRedirect,
    SessionExpired,
    AuthMessage,
    CaptchaRequired,
}

/// A detected challenge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallenge {
    pub kind: AuthChallengeKind,
    pub status: u16,
    /// Redirect target for login redirects.
    pub location: Option<String>,
    /// Phrase that fired for message-based detection.
    pub matched_phrase: Option<String>,
}

/// Response facts the detector inspects.
pub struct ChallengeInput<'a> {
    pub status: u16,
    pub headers: &'a HashMap<String, String>,
    pub body: &'a str,
    /// Session-store health for the domain, when known.
    pub session_healthy: Option<bool>,
}

/// Path fragments identifying a login page.
const LOGIN_PATH_HINTS: &[&str] = &[
    "/login",
    "/signin",
    "/sign-in",
    "/auth",
    "/sso",
    "/account/login",
    "/session/new",
    "/oauth/authorize",
];

/// Query parameters that carry a post-login destination.
const REDIRECT_PARAM_HINTS: &[&str] = &["redirect", "redirect_uri", "return", "returnurl", "next", "continue"];

/// Body phrases that signal a login wall.
static AUTH_PHRASES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "please log in",
        "please sign in",
        "sign in to continue",
        "login required",
        "authentication required",
        "you must be logged in",
        "session expired",
        "session has expired",
        "unauthorized access",
    ]
});

static CAPTCHA_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(recaptcha|hcaptcha|h-captcha|cf-challenge|challenge-platform|turnstile|\bcaptcha\b)")
        .unwrap()
});

/// Classify a response as an auth challenge, if it is one.
pub fn detect_challenge(input: &ChallengeInput<'_>) -> Option<AuthChallenge> {
    let head = scan_window(input.body);

    // Captcha walls come with assorted statuses; the body is decisive
    if CAPTCHA_MARKERS.is_match(head) {
        return Some(AuthChallenge {
            kind: AuthChallengeKind::CaptchaRequired,
            status: input.status,
            location: None,
            matched_phrase: CAPTCHA_MARKERS
                .find(head)
                .map(|m| m.as_str().to_lowercase()),
        });
    }

    match input.status {
        401 => {
            return Some(AuthChallenge {
                kind: AuthChallengeKind::Http401,
                status: 401,
                location: None,
                matched_phrase: None,
            })
        }
        403 => {
            return Some(AuthChallenge {
                kind: AuthChallengeKind::Http403,
                status: 403,
                location: None,
                matched_phrase: None,
            })
        }
        300..=399 => {
            if let Some(location) = header(input.headers, "location") {
                if is_login_url(location) {
                    return Some(AuthChallenge {
                        kind: AuthChallengeKind::LoginRedirect,
                        status: input.status,
                        location: Some(location.to_string()),
                        matched_phrase: None,
                    });
                }
            }
        }
        _ => {}
    }

    if input.session_healthy == Some(false) {
        return Some(AuthChallenge {
            kind: AuthChallengeKind::SessionExpired,
            status: input.status,
            location: None,
            matched_phrase: None,
        });
    }

    let lower = head.to_lowercase();
    for phrase in AUTH_PHRASES.iter() {
        if lower.contains(phrase) {
            return Some(AuthChallenge {
                kind: AuthChallengeKind::AuthMessage,
                status: input.status,
                location: None,
                matched_phrase: Some(phrase.to_string()),
            });
        }
    }

    None
}

fn scan_window(body: &str) -> &str {
    let mut end = body.len().min(BODY_SCAN_LIMIT);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A redirect target counts as a login URL when its path mentions a
/// login page or it carries a post-login destination parameter.
pub fn is_login_url(location: &str) -> bool {
    let path_hit = |path: &str| {
        let lower = path.to_lowercase();
        LOGIN_PATH_HINTS.iter().any(|hint| lower.contains(hint))
    };

    if let Ok(parsed) = Url::parse(location) {
        if path_hit(parsed.path()) {
            return true;
        }
        return parsed.query_pairs().any(|(key, _)| {
            let key = key.to_lowercase();
            REDIRECT_PARAM_HINTS.iter().any(|hint| key == *hint)
        });
    }

    // Relative redirect
    path_hit(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        status: u16,
        headers: &'a HashMap<String, String>,
        body: &'a str,
    ) -> ChallengeInput<'a> {
        ChallengeInput {
            status,
            headers,
            body,
            session_healthy: None,
        }
    }

    #[test]
    fn test_http_401() {
        let headers = HashMap::new();
        let challenge = detect_challenge(&input(401, &headers, "")).unwrap();
        assert_eq!(challenge.kind, AuthChallengeKind::Http401);
    }

    #[test]
    fn test_http_403() {
        let headers = HashMap::new();
        let challenge = detect_challenge(&input(403, &headers, "")).unwrap();
        assert_eq!(challenge.kind, AuthChallengeKind::Http403);
    }

    #[test]
    fn test_login_redirect_by_path() {
        let headers = HashMap::from([(
            "Location".to_string(),
            "https://example.com/login?next=%2Fdashboard".to_string(),
        )]);
        let challenge = detect_challenge(&input(302, &headers, "")).unwrap();
        assert_eq!(challenge.kind, AuthChallengeKind::LoginRedirect);
        assert!(challenge.location.unwrap().contains("/login"));
    }

    #[test]
    fn test_login_redirect_by_return_param() {
        let headers = HashMap::from([(
            "location".to_string(),
            "https://sso.example.com/start?returnUrl=%2Fapp".to_string(),
        )]);
        let challenge = detect_challenge(&input(303, &headers, "")).unwrap();
        assert_eq!(challenge.kind, AuthChallengeKind::LoginRedirect);
    }

    #[test]
    fn test_ordinary_redirect_is_not_a_challenge() {
        let headers = HashMap::from([(
            "Location".to_string(),
            "https://example.com/new-home".to_string(),
        )]);
        assert!(detect_challenge(&input(301, &headers, "")).is_none());
    }

    #[test]
    fn test_auth_message_in_body() {
        let headers = HashMap::new();
        let body = "<html><body><h1>Please log in to continue</h1></body></html>";
        let challenge = detect_challenge(&input(200, &headers, body)).unwrap();
        assert_eq!(challenge.kind, AuthChallengeKind::AuthMessage);
        assert_eq!(challenge.matched_phrase.as_deref(), Some("please log in"));
    }

    #[test]
    fn test_phrase_beyond_scan_window_is_ignored() {
        let headers = HashMap::new();
        let mut body = "x".repeat(BODY_SCAN_LIMIT);
        body.push_str("please log in");
        assert!(detect_challenge(&input(200, &headers, &body)).is_none());
    }

    #[test]
    fn test_captcha_wins_over_status() {
        let headers = HashMap::new();
        let body = r#"<div class="g-recaptcha" data-sitekey="x"></div>"#;
        let challenge = detect_challenge(&input(403, &headers, body)).unwrap();
        assert_eq!(challenge.kind, AuthChallengeKind::CaptchaRequired);
    }

    #[test]
    fn test_session_expired_via_health() {
        let headers = HashMap::new();
        let challenge = detect_challenge(&ChallengeInput {
            status: 200,
            headers: &headers,
            body: "",
            session_healthy: Some(false),
        })
        .unwrap();
        assert_eq!(challenge.kind, AuthChallengeKind::SessionExpired);
    }

    #[test]
    fn test_clean_response_is_none() {
        let headers = HashMap::new();
        assert!(detect_challenge(&input(200, &headers, "<html>welcome</html>")).is_none());
    }
}
