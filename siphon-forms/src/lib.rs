//! siphon-forms - Form submission learning.
//!
//! Learns how a site's forms submit from a single browser capture and
//! replays them as direct HTTP (or WebSocket) calls afterwards:
//! transport classification (REST, GraphQL, JSON-RPC, server actions,
//! WebSocket), field mapping with case-variant fallbacks, dynamic-field
//! extraction plans, OTP challenges, and per-domain rate limits.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod browser;
pub mod capture;
pub mod fields;
pub mod learner;
pub mod otp;
pub mod pattern;
pub mod ratelimit;
pub mod submit;
pub mod transport;

pub use browser::{BrowserPage, DetectedField, DetectedForm, FileField};
pub use capture::{CapturedRequest, CapturedResponse, CapturedWsFrame, FormCapture, WsDirection};
pub use fields::{infer_dynamic_fields, map_fields, DynamicField, DynamicFieldType, ExtractionStrategy};
pub use learner::FormLearner;
pub use otp::{detect_otp_challenge, OtpChallenge, OtpDescriptor, OtpKind};
pub use pattern::{
    CsrfExtractor, FormEncoding, FormPattern, FormTransport, GraphqlDescriptor,
    JsonRpcDescriptor, ServerActionDescriptor, ServerActionKind, SuccessIndicators,
    WebsocketDescriptor, WsProtocol,
};
pub use ratelimit::{RateLimitRecord, RateLimitTracker};
pub use submit::{
    FileUpload, FormSubmitter, OtpPrompt, SubmissionMethod, SubmissionOutcome, SubmitOptions,
    WsClient,
};
pub use transport::{detect_transport, detect_ws_submission, TransportDetection};
