//! Authenticated request pipeline for the sellerdesk API backend
//!
//! Every screen and form in the seller tool talks to the backend through a
//! single entry point, [`ApiClient::request`]: hand it an [`ApiRequest`]
//! descriptor and receive either the parsed JSON response body or a typed
//! [`ApiError`].
//!
//! Behind that entry point sits a [`reqwest_middleware`] stack with the
//! [`BearerAuthMiddleware`] doing the interesting work. On the way out it
//! waits for any in-flight token refresh, fetches the current bearer token,
//! and attaches the `Authorization` and `Accept-Language` headers. On the
//! way back it watches for the backend's token-expiry signal (an HTTP error
//! whose body carries `"status": "TOKEN EXPIRED"`), coordinates a
//! single-flight refresh through the token manager's gate, and replays the
//! original request exactly once with the fresh token. All of this is
//! invisible to the caller except as latency; only genuinely unrecoverable
//! failures surface.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sellerdesk_client::{ApiClient, ApiRequest, ClientConfig};
//! use sellerdesk_tokens::store::MemoryCredentialStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new(
//!     "https://api.example.com".parse()?,
//!     Arc::new(MemoryCredentialStore::new()),
//! );
//! let client = ApiClient::new(config);
//!
//! let products: serde_json::Value = client.request(ApiRequest::get("products")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod client;
mod error;
pub mod middleware;
mod request;

pub use client::{ApiClient, ClientConfig};
pub use error::{ApiError, ErrorBody};
pub use middleware::{BearerAuthMiddleware, TOKEN_EXPIRED_STATUS};
pub use request::ApiRequest;
