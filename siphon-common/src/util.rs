//! Utility functions shared across Siphon crates.

use url::Url;

/// Extract the lowercased hostname from a URL string, if it parses.
pub fn hostname_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Strip a leading `www.` from a hostname.
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Check if a string looks like a UUID (8-4-4-4-12 hex groups).
pub fn looks_like_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.chars().enumerate().all(|(i, c)| {
        if matches!(i, 8 | 13 | 18 | 23) {
            c == '-'
        } else {
            c.is_ascii_hexdigit()
        }
    })
}

/// Check if a string looks like a Unix timestamp in seconds or milliseconds.
pub fn looks_like_timestamp(s: &str) -> bool {
    (10..=13).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

/// Convert a snake_case or kebab-case identifier to camelCase.
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' || c == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a camelCase identifier to snake_case.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape regex metacharacters in a literal string.
pub fn escape_regex(s: &str) -> String {
    regex::escape(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_of() {
        assert_eq!(
            hostname_of("https://Example.COM/path?x=1"),
            Some("example.com".to_string())
        );
        assert_eq!(hostname_of("not a url"), None);
    }

    #[test]
    fn test_looks_like_uuid() {
        assert!(looks_like_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!looks_like_uuid("550e8400e29b41d4a716446655440000"));
        assert!(!looks_like_uuid("hello"));
    }

    #[test]
    fn test_looks_like_timestamp() {
        assert!(looks_like_timestamp("1714003200"));
        assert!(looks_like_timestamp("1714003200123"));
        assert!(!looks_like_timestamp("12345"));
        assert!(!looks_like_timestamp("17140032zz"));
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_camel_case("email_addr"), "emailAddr");
        assert_eq!(to_camel_case("full-name"), "fullName");
        assert_eq!(to_snake_case("emailAddr"), "email_addr");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }
}
