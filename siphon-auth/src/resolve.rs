//! Challenge resolution: workflows, stored credentials, user callback.

use crate::detect::{AuthChallenge, AuthChallengeKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use siphon_common::Result;
use std::sync::Arc;

/// Kinds of credentials a resolution can suggest or use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Password,
    ApiToken,
    Oauth,
    Cookie,
}

/// A credential on file for a domain.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub id: String,
    pub kind: CredentialKind,
    pub domain: String,
    pub validated: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    fn usable(&self, now: DateTime<Utc>) -> bool {
        self.validated && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// Store of per-domain credentials; a seam to the application's vault.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn credentials_for(&self, domain: &str) -> Result<Vec<StoredCredential>>;
}

/// A recorded login workflow. Selection happens here; execution belongs
/// to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginWorkflow {
    pub id: String,
    pub name: String,
    pub domains: Vec<String>,
    pub tags: Vec<String>,
}

/// Store of recorded workflows.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn workflows_for(&self, domain: &str) -> Result<Vec<LoginWorkflow>>;
}

/// Callback asking the user for credentials.
#[async_trait]
pub trait AuthPrompt: Send + Sync {
    /// Returns true when the user supplied credentials.
    async fn request_credentials(
        &self,
        challenge: &AuthChallenge,
        suggested: &[CredentialKind],
    ) -> Result<bool>;
}

/// How a challenge was (or was not) resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Workflow,
    StoredCredentials,
    UserCallback,
    Skipped,
}

/// Resolution outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResolution {
    pub resolved: bool,
    pub method: ResolutionMethod,
    /// Workflow selected for the caller to execute.
    pub workflow_id: Option<String>,
    /// Retrying the original request is worthwhile.
    pub retry_recommended: bool,
    pub message: String,
}

static LOGIN_WORKFLOW_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(log[ -]?in|sign[ -]?in|auth)").unwrap());

const LOGIN_WORKFLOW_TAGS: &[&str] = &["login", "auth", "signin"];

/// Credential kinds worth suggesting for a challenge type.
pub fn suggested_credential_kinds(kind: AuthChallengeKind) -> Vec<CredentialKind> {
    match kind {
        AuthChallengeKind::Http401 => vec![CredentialKind::Password, CredentialKind::ApiToken],
        AuthChallengeKind::Http403 => vec![CredentialKind::ApiToken, CredentialKind::Cookie],
        AuthChallengeKind::LoginRedirect
        | AuthChallengeKind::AuthMessage
        | AuthChallengeKind::SessionExpired => {
            vec![CredentialKind::Password, CredentialKind::Cookie]
        }
        // Captchas need a human, not credentials
        AuthChallengeKind::CaptchaRequired => Vec::new(),
    }
}

/// Detects and resolves auth challenges for one application instance.
pub struct AuthFlowDetector {
    workflow_store: Option<Arc<dyn WorkflowStore>>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    prompt: Option<Arc<dyn AuthPrompt>>,
}

impl AuthFlowDetector {
    pub fn new() -> Self {
        Self {
            workflow_store: None,
            credential_store: None,
            prompt: None,
        }
    }

    pub fn with_workflow_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.workflow_store = Some(store);
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn AuthPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Resolve a challenge for a domain.
    ///
    /// Order: a recorded login workflow (reported for the caller to
    /// execute), stored credentials, then the user callback. When every
    /// method fails, the result is a skipped resolution.
    pub async fn resolve(&self, challenge: &AuthChallenge, domain: &str) -> AuthResolution {
        if let Some(workflow) = self.find_login_workflow(domain).await {
            return AuthResolution {
                resolved: true,
                method: ResolutionMethod::Workflow,
                workflow_id: Some(workflow.id.clone()),
                retry_recommended: true,
                message: format!("login workflow '{}' selected for execution", workflow.name),
            };
        }

        if let Some(resolution) = self.check_credentials(domain).await {
            return resolution;
        }

        if let Some(prompt) = &self.prompt {
            let suggested = suggested_credential_kinds(challenge.kind);
            match prompt.request_credentials(challenge, &suggested).await {
                Ok(true) => {
                    return AuthResolution {
                        resolved: true,
                        method: ResolutionMethod::UserCallback,
                        workflow_id: None,
                        retry_recommended: true,
                        message: "credentials supplied by user".to_string(),
                    };
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Auth prompt failed");
                }
            }
        }

        AuthResolution {
            resolved: false,
            method: ResolutionMethod::Skipped,
            workflow_id: None,
            retry_recommended: false,
            message: "no resolution method available".to_string(),
        }
    }

    /// Find a stored workflow by login tags or name shape.
    async fn find_login_workflow(&self, domain: &str) -> Option<LoginWorkflow> {
        let store = self.workflow_store.as_ref()?;
        let workflows = match store.workflows_for(domain).await {
            Ok(workflows) => workflows,
            Err(e) => {
                tracing::warn!(error = %e, domain, "Workflow lookup failed");
                return None;
            }
        };

        workflows.into_iter().find(|workflow| {
            workflow
                .tags
                .iter()
                .any(|tag| LOGIN_WORKFLOW_TAGS.contains(&tag.to_lowercase().as_str()))
                || LOGIN_WORKFLOW_NAME.is_match(&workflow.name)
        })
    }

    async fn check_credentials(&self, domain: &str) -> Option<AuthResolution> {
        let store = self.credential_store.as_ref()?;
        let credentials = match store.credentials_for(domain).await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(error = %e, domain, "Credential lookup failed");
                return None;
            }
        };
        if credentials.is_empty() {
            return None;
        }

        let now = Utc::now();
        if credentials.iter().any(|c| c.usable(now)) {
            return Some(AuthResolution {
                resolved: true,
                method: ResolutionMethod::StoredCredentials,
                workflow_id: None,
                retry_recommended: true,
                message: "validated credentials on file".to_string(),
            });
        }

        // Credentials exist but none is validated: worth retrying after
        // the caller re-validates, but not a success
        Some(AuthResolution {
            resolved: false,
            method: ResolutionMethod::StoredCredentials,
            workflow_id: None,
            retry_recommended: true,
            message: "unvalidated credentials on file".to_string(),
        })
    }
}

impl Default for AuthFlowDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siphon_common::Error;

    fn challenge(kind: AuthChallengeKind) -> AuthChallenge {
        AuthChallenge {
            kind,
            status: 401,
            location: None,
            matched_phrase: None,
        }
    }

    struct FixedWorkflows(Vec<LoginWorkflow>);

    #[async_trait]
    impl WorkflowStore for FixedWorkflows {
        async fn workflows_for(&self, _domain: &str) -> Result<Vec<LoginWorkflow>> {
            Ok(self.0.clone())
        }
    }

    struct FixedCredentials(Vec<StoredCredential>);

    #[async_trait]
    impl CredentialStore for FixedCredentials {
        async fn credentials_for(&self, _domain: &str) -> Result<Vec<StoredCredential>> {
            Ok(self.0.clone())
        }
    }

    struct AlwaysProvide;

    #[async_trait]
    impl AuthPrompt for AlwaysProvide {
        async fn request_credentials(
            &self,
            _challenge: &AuthChallenge,
            _suggested: &[CredentialKind],
        ) -> Result<bool> {
            Ok(true)
        }
    }

    struct FailingPrompt;

    #[async_trait]
    impl AuthPrompt for FailingPrompt {
        async fn request_credentials(
            &self,
            _challenge: &AuthChallenge,
            _suggested: &[CredentialKind],
        ) -> Result<bool> {
            Err(Error::Internal("ui unavailable".into()))
        }
    }

    fn credential(validated: bool, expired: bool) -> StoredCredential {
        StoredCredential {
            id: "cred-1".into(),
            kind: CredentialKind::Password,
            domain: "example.com".into(),
            validated,
            expires_at: expired.then(|| Utc::now() - chrono::Duration::hours(1)),
        }
    }

    #[tokio::test]
    async fn test_workflow_wins() {
        let detector = AuthFlowDetector::new()
            .with_workflow_store(Arc::new(FixedWorkflows(vec![LoginWorkflow {
                id: "wf-1".into(),
                name: "Sign in to example".into(),
                domains: vec!["example.com".into()],
                tags: vec![],
            }])))
            .with_credential_store(Arc::new(FixedCredentials(vec![credential(true, false)])));

        let resolution = detector
            .resolve(&challenge(AuthChallengeKind::Http401), "example.com")
            .await;

        assert!(resolution.resolved);
        assert_eq!(resolution.method, ResolutionMethod::Workflow);
        assert_eq!(resolution.workflow_id.as_deref(), Some("wf-1"));
    }

    #[tokio::test]
    async fn test_workflow_found_by_tag() {
        let detector =
            AuthFlowDetector::new().with_workflow_store(Arc::new(FixedWorkflows(vec![
                LoginWorkflow {
                    id: "wf-2".into(),
                    name: "example flow".into(),
                    domains: vec!["example.com".into()],
                    tags: vec!["Login".into()],
                },
            ])));

        let resolution = detector
            .resolve(&challenge(AuthChallengeKind::LoginRedirect), "example.com")
            .await;
        assert_eq!(resolution.workflow_id.as_deref(), Some("wf-2"));
    }

    #[tokio::test]
    async fn test_validated_credentials_resolve() {
        let detector = AuthFlowDetector::new()
            .with_credential_store(Arc::new(FixedCredentials(vec![credential(true, false)])));

        let resolution = detector
            .resolve(&challenge(AuthChallengeKind::Http401), "example.com")
            .await;

        assert!(resolution.resolved);
        assert_eq!(resolution.method, ResolutionMethod::StoredCredentials);
        assert!(resolution.retry_recommended);
    }

    #[tokio::test]
    async fn test_unvalidated_credentials_recommend_retry_only() {
        let detector = AuthFlowDetector::new()
            .with_credential_store(Arc::new(FixedCredentials(vec![credential(false, false)])));

        let resolution = detector
            .resolve(&challenge(AuthChallengeKind::Http401), "example.com")
            .await;

        assert!(!resolution.resolved);
        assert!(resolution.retry_recommended);
        assert_eq!(resolution.method, ResolutionMethod::StoredCredentials);
    }

    #[tokio::test]
    async fn test_expired_credentials_fall_through_to_prompt() {
        let detector = AuthFlowDetector::new()
            .with_credential_store(Arc::new(FixedCredentials(vec![credential(true, true)])))
            .with_prompt(Arc::new(AlwaysProvide));

        let resolution = detector
            .resolve(&challenge(AuthChallengeKind::Http401), "example.com")
            .await;

        // Expired-but-validated counts as unvalidated-on-file, which
        // short-circuits before the prompt
        assert!(!resolution.resolved);
        assert_eq!(resolution.method, ResolutionMethod::StoredCredentials);
    }

    #[tokio::test]
    async fn test_prompt_resolves_when_nothing_stored() {
        let detector = AuthFlowDetector::new().with_prompt(Arc::new(AlwaysProvide));

        let resolution = detector
            .resolve(&challenge(AuthChallengeKind::Http401), "example.com")
            .await;

        assert!(resolution.resolved);
        assert_eq!(resolution.method, ResolutionMethod::UserCallback);
    }

    #[tokio::test]
    async fn test_everything_failing_is_skipped() {
        let detector = AuthFlowDetector::new().with_prompt(Arc::new(FailingPrompt));

        let resolution = detector
            .resolve(&challenge(AuthChallengeKind::Http403), "example.com")
            .await;

        assert!(!resolution.resolved);
        assert_eq!(resolution.method, ResolutionMethod::Skipped);
    }

    #[test]
    fn test_suggested_kinds() {
        assert_eq!(
            suggested_credential_kinds(AuthChallengeKind::Http401),
            vec![CredentialKind::Password, CredentialKind::ApiToken]
        );
        assert!(suggested_credential_kinds(AuthChallengeKind::CaptchaRequired).is_empty());
    }
}
