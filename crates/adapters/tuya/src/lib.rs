//! # scenehub-adapter-tuya
//!
//! Tuya OpenAPI adapter — implements the [`SceneCloud`](scenehub_app::ports::SceneCloud)
//! port against the vendor's signed HTTP API.
//!
//! ## How it works
//!
//! Every request is signed with HMAC-SHA256 over the client id, the access
//! token, a millisecond timestamp, a nonce and a canonical form of the
//! request. Access tokens are cached and refreshed single-flight. Rate
//! limits and transient failures are retried with capped, jittered
//! exponential backoff.
//!
//! | Module | Role |
//! |--------|------|
//! | `signing` | Canonical request and signature |
//! | `token` | Token cache and single-flight refresh |
//! | `retry` | Backoff policy |
//! | `client` | Signed, retrying request execution |
//! | `wire` | JSON shapes and domain conversions |
//! | `cloud` | Port implementation |
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `scenehub-app` and `scenehub-domain`.

mod client;
mod cloud;
mod config;
mod error;
pub mod retry;
pub mod signing;
pub mod token;
mod wire;

pub use client::{ApiRequest, SignedRequestClient, TOKEN_PATH};
pub use cloud::TuyaCloud;
pub use config::{Credentials, DEFAULT_BASE_URL, RetrySettings, Secret, TuyaConfig};
pub use error::TuyaError;
