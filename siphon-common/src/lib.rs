//! Siphon Common - Shared types, utilities, and configuration for the
//! Siphon learning core.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup
//! - Utility functions used across Siphon crates

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod util;

pub use config::SiphonConfig;
pub use error::{Error, Result};
pub use http::{FetchOptions, FetchResponse, Fetcher, HttpFetcher};
