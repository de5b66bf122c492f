//! Bearer token lifecycle management for the sellerdesk API client
//!
//! This library owns the token half of the authenticated request pipeline:
//! obtaining a bearer token on demand, keeping it in an in-process cache
//! backed by a durable credential store, and refreshing it when the API
//! backend reports that it has expired.
//!
//! Refreshing is strictly on-demand. When several concurrent requests all
//! observe an expired token at the same moment, the [`RefreshGate`] ensures
//! that exactly one network refresh is performed; every other caller waits
//! for that operation and observes its outcome, success or failure.
//!
//! # General flow
//!
//! On start-up, construct a credential store, a [`TokenAuthority`] pointed at
//! the API backend, and a [`TokenManager`] combining the two. The manager's
//! [`get_token`][TokenManager::get_token] consults the in-process cache, then
//! the durable store, and only then mints a fresh token from the authority.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sellerdesk_tokens::{
//!     authority::TokenAuthority, store::FileCredentialStore, TokenManager,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileCredentialStore::new("credentials.json".into()));
//! let authority = TokenAuthority::new(
//!     reqwest::Client::new(),
//!     "https://api.example.com".parse()?,
//! );
//!
//! let tokens = TokenManager::new(store, authority);
//!
//! let token = tokens.get_token().await?;
//! tracing::info!(token = format_args!("{:#?}", token), "first access token");
//! # Ok(())
//! # }
//! ```
//!
//! [`TokenAuthority`]: authority::TokenAuthority
//!
//! # Features
//!
//! * `file` (default): provides [`FileCredentialStore`][store::FileCredentialStore],
//!   a durable credential store backed by a local JSON file.

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

pub mod authority;
mod braids;
mod error;
mod gate;
mod manager;
pub mod store;

pub use braids::*;
pub use error::{SharedTokenError, TokenError};
pub use gate::{RefreshGate, RefreshOutcome};
pub use manager::TokenManager;
