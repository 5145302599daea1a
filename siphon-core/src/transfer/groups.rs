//! Static domain groups: clusters of sites sharing structural conventions.
//!
//! Used as a prior when scoring cross-site similarity.

use crate::pattern::types::TemplateType;
use once_cell::sync::Lazy;

/// Named cluster of domains with shared conventions.
#[derive(Debug, Clone)]
pub struct DomainGroup {
    pub name: &'static str,
    pub domains: &'static [&'static str],
    /// Path shapes members share.
    pub path_patterns: &'static [&'static str],
    /// Response fields members tend to expose.
    pub response_fields: &'static [&'static str],
    pub auth_type: &'static str,
    /// Template types commonly seen across the group.
    pub common_template_types: &'static [TemplateType],
}

static DOMAIN_GROUPS: Lazy<Vec<DomainGroup>> = Lazy::new(|| {
    vec![
        DomainGroup {
            name: "package_registries",
            domains: &[
                "npmjs.com",
                "pypi.org",
                "crates.io",
                "rubygems.org",
                "packagist.org",
                "hex.pm",
            ],
            path_patterns: &["/package/{name}", "/project/{name}", "/crates/{name}"],
            response_fields: &["name", "description", "version", "license"],
            auth_type: "none",
            common_template_types: &[TemplateType::RegistryLookup, TemplateType::RestResource],
        },
        DomainGroup {
            name: "code_hosting",
            domains: &["github.com", "gitlab.com", "bitbucket.org", "codeberg.org"],
            path_patterns: &["/{owner}/{repo}", "/{owner}/{repo}/issues/{id}"],
            response_fields: &["name", "full_name", "description", "default_branch"],
            auth_type: "token",
            common_template_types: &[TemplateType::RestResource, TemplateType::QueryApi],
        },
        DomainGroup {
            name: "qa_forums",
            domains: &[
                "stackoverflow.com",
                "serverfault.com",
                "superuser.com",
                "askubuntu.com",
                "stackexchange.com",
            ],
            path_patterns: &["/questions/{id}", "/questions/{id}/{slug}"],
            response_fields: &["items", "title", "body", "score"],
            auth_type: "none",
            common_template_types: &[TemplateType::QueryApi],
        },
        DomainGroup {
            name: "knowledge_bases",
            domains: &["wikipedia.org", "wiktionary.org", "wikidata.org", "fandom.com"],
            path_patterns: &["/wiki/{page}"],
            response_fields: &["title", "extract", "description"],
            auth_type: "none",
            common_template_types: &[TemplateType::RestResource, TemplateType::QueryApi],
        },
        DomainGroup {
            name: "social_news",
            domains: &["reddit.com", "news.ycombinator.com", "lobste.rs"],
            path_patterns: &["/r/{sub}/comments/{id}", "/item?id={id}", "/s/{id}"],
            response_fields: &["title", "author", "score", "comments"],
            auth_type: "none",
            common_template_types: &[TemplateType::JsonSuffix, TemplateType::FirebaseRest],
        },
        DomainGroup {
            name: "developer_blogs",
            domains: &["dev.to", "medium.com", "hashnode.com", "substack.com"],
            path_patterns: &["/{user}/{slug}", "/@{user}/{slug}"],
            response_fields: &["title", "description", "body_html", "user"],
            auth_type: "none",
            common_template_types: &[TemplateType::RestResource, TemplateType::JsonSuffix],
        },
    ]
});

/// All known groups.
pub fn domain_groups() -> &'static [DomainGroup] {
    &DOMAIN_GROUPS
}

/// Find the group a domain belongs to, by exact or suffix match.
pub fn group_of(domain: &str) -> Option<&'static DomainGroup> {
    let domain = domain.strip_prefix("www.").unwrap_or(domain);
    DOMAIN_GROUPS.iter().find(|group| {
        group
            .domains
            .iter()
            .any(|member| domain == *member || domain.ends_with(&format!(".{member}")))
    })
}
