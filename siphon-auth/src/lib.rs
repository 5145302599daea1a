//! siphon-auth - Auth challenge detection and resolution.
//!
//! Recognizes authentication challenges from response shape, redirects,
//! and body phrases, then resolves them through stored login workflows,
//! stored credentials, or a user callback.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod detect;
pub mod resolve;

pub use detect::{detect_challenge, AuthChallenge, AuthChallengeKind, ChallengeInput};
pub use resolve::{
    suggested_credential_kinds, AuthFlowDetector, AuthPrompt, AuthResolution, CredentialKind,
    CredentialStore, LoginWorkflow, ResolutionMethod, StoredCredential, WorkflowStore,
};
