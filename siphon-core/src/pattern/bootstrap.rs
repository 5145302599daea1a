//! Bootstrap patterns for canonical well-known sites.
//!
//! Seeded once when the registry starts empty. Seeds carry high initial
//! confidence and a marked success count so they win tier-one matches
//! until real usage data accumulates.

use crate::pattern::types::{
    ContentMapping, LearnedPattern, PatternMetrics, ResponseValidation, TemplateType,
    VariableExtractor,
};
use std::collections::HashMap;

/// Success count credited to each seed.
const BOOTSTRAP_SUCCESSES: u64 = 10;

fn seed(
    id: &str,
    template_type: TemplateType,
    url_patterns: Vec<&str>,
    endpoint_template: &str,
    domain: &str,
) -> LearnedPattern {
    let mut pattern = LearnedPattern::new(
        format!("bootstrap:{id}"),
        template_type,
        url_patterns.into_iter().map(String::from).collect(),
        endpoint_template,
    );
    pattern.metrics = PatternMetrics {
        success_count: BOOTSTRAP_SUCCESSES,
        confidence: 1.0,
        domains: vec![domain.to_string()],
        ..PatternMetrics::default()
    };
    pattern
}

/// Build the full bootstrap set.
pub fn bootstrap_patterns() -> Vec<LearnedPattern> {
    let mut patterns = Vec::with_capacity(8);

    // Reddit: any post or listing URL answers as JSON with .json appended
    let mut reddit = seed(
        "reddit",
        TemplateType::JsonSuffix,
        vec![r"^https?://(www\.|old\.)?reddit\.com/(r|user)/[^/]+"],
        "{url}.json",
        "reddit.com",
    );
    reddit.content_mapping = ContentMapping {
        title: Some("[0].data.children[0].data.title".into()),
        description: Some("[0].data.children[0].data.selftext".into()),
        body: Some("[0].data.children[0].data.selftext".into()),
        metadata: HashMap::from([
            ("author".into(), "[0].data.children[0].data.author".into()),
            ("score".into(), "[0].data.children[0].data.score".into()),
        ]),
    };
    patterns.push(reddit);

    // NPM: package pages resolve against the registry host
    let mut npm = seed(
        "npm",
        TemplateType::RegistryLookup,
        vec![r"^https?://(www\.)?npmjs\.com/package/"],
        "https://registry.npmjs.org/{package}",
        "npmjs.com",
    );
    npm.extractors
        .push(VariableExtractor::path("package", r"^/package/([^/?#]+)"));
    npm.content_mapping = ContentMapping {
        title: Some("name".into()),
        description: Some("description".into()),
        body: Some("readme".into()),
        metadata: HashMap::from([("version".into(), "dist-tags.latest".into())]),
    };
    npm.validation = ResponseValidation {
        required_fields: vec!["name".into()],
        min_body_length: None,
    };
    patterns.push(npm);

    // PyPI: project pages have a stable JSON API
    let mut pypi = seed(
        "pypi",
        TemplateType::RegistryLookup,
        vec![r"^https?://pypi\.org/project/"],
        "https://pypi.org/pypi/{package}/json",
        "pypi.org",
    );
    pypi.extractors
        .push(VariableExtractor::path("package", r"^/project/([^/?#]+)"));
    pypi.content_mapping = ContentMapping {
        title: Some("info.name".into()),
        description: Some("info.summary".into()),
        body: Some("info.description".into()),
        metadata: HashMap::from([("version".into(), "info.version".into())]),
    };
    patterns.push(pypi);

    // GitHub: repository pages map onto the REST API
    let mut github = seed(
        "github",
        TemplateType::RestResource,
        vec![r"^https?://(www\.)?github\.com/[^/]+/[^/?#]+/?$"],
        "https://api.github.com/repos/{owner}/{repo}",
        "github.com",
    );
    github
        .extractors
        .push(VariableExtractor::path("owner", r"^/([^/]+)/"));
    github
        .extractors
        .push(VariableExtractor::path("repo", r"^/[^/]+/([^/?#]+)"));
    github.headers = HashMap::from([
        ("Accept".into(), "application/vnd.github+json".into()),
    ]);
    github.content_mapping = ContentMapping {
        title: Some("full_name".into()),
        description: Some("description".into()),
        body: Some("description".into()),
        metadata: HashMap::from([
            ("stars".into(), "stargazers_count".into()),
            ("language".into(), "language".into()),
        ]),
    };
    patterns.push(github);

    // Wikipedia: article pages via the REST summary endpoint
    let mut wikipedia = seed(
        "wikipedia",
        TemplateType::RestResource,
        vec![r"^https?://[a-z]+\.(m\.)?wikipedia\.org/wiki/"],
        "https://{lang}.wikipedia.org/api/rest_v1/page/summary/{page}",
        "wikipedia.org",
    );
    wikipedia.extractors.push(VariableExtractor {
        name: "lang".into(),
        source: crate::pattern::types::ExtractorSource::Subdomain,
        pattern: r"^([a-z]+)\.".into(),
        group: 1,
        transform: None,
    });
    wikipedia
        .extractors
        .push(VariableExtractor::path("page", r"^/wiki/([^?#]+)"));
    wikipedia.content_mapping = ContentMapping {
        title: Some("title".into()),
        description: Some("description".into()),
        body: Some("extract".into()),
        metadata: HashMap::new(),
    };
    patterns.push(wikipedia);

    // Hacker News: item pages through the Firebase mirror
    let mut hn = seed(
        "hackernews",
        TemplateType::FirebaseRest,
        vec![r"^https?://news\.ycombinator\.com/item\?"],
        "https://hacker-news.firebaseio.com/v0/item/{id}.json",
        "news.ycombinator.com",
    );
    hn.extractors
        .push(VariableExtractor::query("id", r"(?:^|&)id=(\d+)"));
    hn.content_mapping = ContentMapping {
        title: Some("title".into()),
        description: None,
        body: Some("text".into()),
        metadata: HashMap::from([
            ("author".into(), "by".into()),
            ("score".into(), "score".into()),
        ]),
    };
    patterns.push(hn);

    // Stack Exchange: question pages through the versioned query API
    let mut stackexchange = seed(
        "stackexchange",
        TemplateType::QueryApi,
        vec![
            r"^https?://(www\.)?stackoverflow\.com/questions/\d+",
            r"^https?://(www\.)?(serverfault|superuser|askubuntu)\.com/questions/\d+",
            r"^https?://[a-z]+\.stackexchange\.com/questions/\d+",
        ],
        "https://api.stackexchange.com/2.3/questions/{id}?site={site}&filter=withbody",
        "stackoverflow.com",
    );
    stackexchange
        .extractors
        .push(VariableExtractor::path("id", r"^/questions/(\d+)"));
    stackexchange.extractors.push(VariableExtractor {
        name: "site".into(),
        source: crate::pattern::types::ExtractorSource::Hostname,
        pattern: r"^(?:www\.)?([^.]+)\.".into(),
        group: 1,
        transform: None,
    });
    stackexchange.content_mapping = ContentMapping {
        title: Some("items[0].title".into()),
        description: None,
        body: Some("items[0].body".into()),
        metadata: HashMap::from([("score".into(), "items[0].score".into())]),
    };
    patterns.push(stackexchange);

    // Dev.to: article pages through the articles API
    let mut devto = seed(
        "devto",
        TemplateType::RestResource,
        vec![r"^https?://dev\.to/[^/]+/[^/?#]+"],
        "https://dev.to/api/articles/{username}/{slug}",
        "dev.to",
    );
    devto
        .extractors
        .push(VariableExtractor::path("username", r"^/([^/]+)/"));
    devto
        .extractors
        .push(VariableExtractor::path("slug", r"^/[^/]+/([^/?#]+)"));
    devto.content_mapping = ContentMapping {
        title: Some("title".into()),
        description: Some("description".into()),
        body: Some("body_html".into()),
        metadata: HashMap::from([("author".into(), "user.username".into())]),
    };
    patterns.push(devto);

    patterns
}
