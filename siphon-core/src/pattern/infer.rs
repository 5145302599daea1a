//! Inference used when learning patterns from successful extractions.

use crate::pattern::types::{ContentMapping, ExtractedContent, TemplateType};
use serde_json::Value;
use siphon_common::util::{escape_regex, looks_like_uuid};
use url::Url;

/// Levels of nesting searched when recovering content paths.
const MAX_SEARCH_DEPTH: usize = 4;

/// Keys examined per object level during path recovery.
const MAX_KEYS_PER_LEVEL: usize = 50;

/// Infer the template type relating a page URL to the API URL that
/// served its content. The explicit strategy wins when provided.
pub fn infer_template_type(
    source_url: &str,
    api_url: &str,
    strategy: Option<TemplateType>,
) -> TemplateType {
    if let Some(strategy) = strategy {
        return strategy;
    }

    if format!("{source_url}.json") == api_url
        || format!("{}.json", source_url.trim_end_matches('/')) == api_url
    {
        return TemplateType::JsonSuffix;
    }

    let source = Url::parse(source_url).ok();
    let api = Url::parse(api_url).ok();

    if let (Some(source), Some(api)) = (source.as_ref(), api.as_ref()) {
        let source_host = source.host_str().unwrap_or("");
        let api_host = api.host_str().unwrap_or("");

        if source_host != api_host && looks_registry_like(api) {
            return TemplateType::RegistryLookup;
        }

        // Same document, query string added
        if source_host == api_host
            && source.path() == api.path()
            && source.query().is_none()
            && api.query().is_some()
        {
            return TemplateType::QueryApi;
        }

        if api_host.starts_with("api.") || api.path().contains("/api/") {
            return TemplateType::RestResource;
        }
    }

    TemplateType::QueryApi
}

/// Registry-style URLs point at a dedicated lookup host or a single
/// name segment.
fn looks_registry_like(api: &Url) -> bool {
    let host = api.host_str().unwrap_or("");
    if host.starts_with("registry.") {
        return true;
    }
    let segments: Vec<&str> = api
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    segments.len() <= 2
}

/// Recover content-mapping paths by searching the structured response for
/// the values that were extracted from it.
pub fn infer_content_mapping(response: &Value, content: &ExtractedContent) -> ContentMapping {
    ContentMapping {
        title: content
            .title
            .as_deref()
            .and_then(|needle| find_value_path(response, needle)),
        description: content
            .description
            .as_deref()
            .and_then(|needle| find_value_path(response, needle)),
        body: content
            .body
            .as_deref()
            .and_then(|needle| find_value_path(response, needle)),
        metadata: Default::default(),
    }
}

/// Breadth-limited search for a string value; returns its dot/bracket path.
pub fn find_value_path(value: &Value, needle: &str) -> Option<String> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    search(value, needle, String::new(), 0)
}

fn search(value: &Value, needle: &str, path: String, depth: usize) -> Option<String> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }

    match value {
        Value::String(s) => {
            if value_matches(s, needle) {
                Some(path)
            } else {
                None
            }
        }
        Value::Object(map) => {
            for (key, child) in map.iter().take(MAX_KEYS_PER_LEVEL) {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                if let Some(found) = search(child, needle, child_path, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate().take(MAX_KEYS_PER_LEVEL) {
                let child_path = format!("{path}[{index}]");
                if let Some(found) = search(child, needle, child_path, depth + 1) {
                    return Some(found);
                }
            }
            None
        }
        _ => None,
    }
}

/// Exact match after trimming, or prefix match for long extracted text
/// (bodies are often truncated by the caller).
fn value_matches(candidate: &str, needle: &str) -> bool {
    let candidate = candidate.trim();
    if candidate == needle {
        return true;
    }
    needle.len() >= 40 && candidate.starts_with(needle)
}

/// Derive a URL regex from a concrete page URL: escape the host, reuse
/// the path structure, and generalize numeric or UUID-looking segments.
pub fn derive_url_pattern(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    let path = generalize_path(parsed.path());
    Some(format!(
        r"^https?://(www\.)?{}{}",
        escape_regex(host),
        path
    ))
}

/// Replace variable-looking path segments with `[^/]+`.
pub fn generalize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| {
            if segment.is_empty() {
                String::new()
            } else if segment.chars().all(|c| c.is_ascii_digit()) || looks_like_uuid(segment) {
                "[^/]+".to_string()
            } else {
                escape_regex(segment)
            }
        })
        .collect();
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_suffix_inference() {
        assert_eq!(
            infer_template_type(
                "https://reddit.com/r/rust/comments/abc",
                "https://reddit.com/r/rust/comments/abc.json",
                None,
            ),
            TemplateType::JsonSuffix
        );
    }

    #[test]
    fn test_registry_lookup_inference() {
        assert_eq!(
            infer_template_type(
                "https://npmjs.com/package/lodash",
                "https://registry.npmjs.org/lodash",
                None,
            ),
            TemplateType::RegistryLookup
        );
    }

    #[test]
    fn test_added_query_string_is_query_api() {
        assert_eq!(
            infer_template_type(
                "https://example.com/items/5",
                "https://example.com/items/5?format=json",
                None,
            ),
            TemplateType::QueryApi
        );
    }

    #[test]
    fn test_api_subdomain_is_rest_resource() {
        assert_eq!(
            infer_template_type(
                "https://github.com/rust-lang/rust",
                "https://api.github.com/repos/rust-lang/rust",
                None,
            ),
            TemplateType::RestResource
        );
    }

    #[test]
    fn test_explicit_strategy_wins() {
        assert_eq!(
            infer_template_type(
                "https://example.com/a",
                "https://example.com/a.json",
                Some(TemplateType::Graphql),
            ),
            TemplateType::Graphql
        );
    }

    #[test]
    fn test_find_value_path_nested() {
        let response = json!({
            "data": {
                "post": {
                    "title": "Learning APIs",
                    "stats": {"views": 10}
                }
            }
        });
        assert_eq!(
            find_value_path(&response, "Learning APIs"),
            Some("data.post.title".to_string())
        );
    }

    #[test]
    fn test_find_value_path_in_array() {
        let response = json!({"items": [{"title": "First"}, {"title": "Second"}]});
        assert_eq!(
            find_value_path(&response, "Second"),
            Some("items[1].title".to_string())
        );
    }

    #[test]
    fn test_find_value_path_misses() {
        let response = json!({"a": 1});
        assert_eq!(find_value_path(&response, "nope"), None);
    }

    #[test]
    fn test_infer_content_mapping() {
        let response = json!({
            "title": "Hello",
            "content": {"text": "A long body"}
        });
        let content = ExtractedContent {
            title: Some("Hello".into()),
            description: None,
            body: Some("A long body".into()),
        };
        let mapping = infer_content_mapping(&response, &content);
        assert_eq!(mapping.title.as_deref(), Some("title"));
        assert_eq!(mapping.body.as_deref(), Some("content.text"));
        assert!(mapping.description.is_none());
    }

    #[test]
    fn test_derive_url_pattern_generalizes_ids() {
        let pattern = derive_url_pattern("https://www.example.com/posts/12345/comments").unwrap();
        assert_eq!(
            pattern,
            r"^https?://(www\.)?example\.com/posts/[^/]+/comments"
        );

        let re = regex::Regex::new(&pattern).unwrap();
        assert!(re.is_match("https://example.com/posts/999/comments"));
        assert!(!re.is_match("https://example.com/users/999"));
    }

    #[test]
    fn test_generalize_path_uuid() {
        assert_eq!(
            generalize_path("/items/550e8400-e29b-41d4-a716-446655440000"),
            "/items/[^/]+"
        );
    }
}
