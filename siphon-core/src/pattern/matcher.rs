//! URL matching and variable extraction.
//!
//! Pure functions of (URL, pattern); no hidden state. Any internal error
//! (malformed regex, malformed URL, missing capture group) degrades to a
//! soft "no match".

use crate::pattern::types::{
    ExtractorSource, LearnedPattern, PatternMatch, ValueTransform, VariableExtractor,
};
use regex::RegexBuilder;
use std::collections::HashMap;
use url::Url;

/// Attempt to match a URL against one pattern.
///
/// Tries every `url_patterns` entry in order; on the first regex hit, runs
/// every extractor. If an extractor fails, the entry is skipped and the
/// next one is tried.
pub fn match_pattern(url: &str, pattern: &LearnedPattern) -> Option<PatternMatch> {
    for (index, url_pattern) in pattern.url_patterns.iter().enumerate() {
        let Ok(re) = RegexBuilder::new(url_pattern).case_insensitive(true).build() else {
            continue;
        };
        if !re.is_match(url) {
            continue;
        }

        let Some(variables) = run_extractors(url, &pattern.extractors) else {
            continue;
        };

        let api_endpoint = fill_template(&pattern.endpoint_template, url, &variables);
        return Some(PatternMatch {
            confidence: pattern.metrics.confidence,
            extracted_variables: variables,
            api_endpoint,
            match_reason: format!("url pattern #{index} matched"),
            pattern: pattern.clone(),
        });
    }

    None
}

/// Run all extractors in order; `None` if any fails.
fn run_extractors(
    url: &str,
    extractors: &[VariableExtractor],
) -> Option<HashMap<String, String>> {
    let mut variables = HashMap::new();
    if extractors.is_empty() {
        return Some(variables);
    }

    let parsed = Url::parse(url).ok()?;
    for extractor in extractors {
        let value = extract_variable(&parsed, extractor)?;
        variables.insert(extractor.name.clone(), value);
    }
    Some(variables)
}

/// Apply one extractor to a parsed URL.
pub fn extract_variable(url: &Url, extractor: &VariableExtractor) -> Option<String> {
    let component = match extractor.source {
        ExtractorSource::Path => url.path().to_string(),
        ExtractorSource::Query => url.query().unwrap_or("").to_string(),
        ExtractorSource::Subdomain | ExtractorSource::Hostname => {
            url.host_str().unwrap_or("").to_string()
        }
    };

    let re = RegexBuilder::new(&extractor.pattern)
        .case_insensitive(true)
        .build()
        .ok()?;
    let captures = re.captures(&component)?;
    let value = captures.get(extractor.group)?.as_str();

    Some(apply_transform(value, extractor.transform))
}

fn apply_transform(value: &str, transform: Option<ValueTransform>) -> String {
    match transform {
        None => value.to_string(),
        Some(ValueTransform::Lowercase) => value.to_lowercase(),
        Some(ValueTransform::Uppercase) => value.to_uppercase(),
        Some(ValueTransform::Urlencode) => urlencoding::encode(value).into_owned(),
        Some(ValueTransform::Urldecode) => urlencoding::decode(value)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| value.to_string()),
    }
}

/// Substitute variables into an endpoint template.
///
/// The literal template `{url}` means "use the original URL unchanged".
/// Repeated placeholders are all replaced.
pub fn fill_template(template: &str, url: &str, variables: &HashMap<String, String>) -> String {
    let mut endpoint = template.replace("{url}", url);
    for (name, value) in variables {
        endpoint = endpoint.replace(&format!("{{{name}}}"), value);
    }
    endpoint
}
