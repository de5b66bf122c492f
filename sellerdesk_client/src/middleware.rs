//! Middleware that authenticates outgoing requests and recovers from
//! token expiry
//!
//! The outbound stage waits out any in-flight refresh, obtains the current
//! bearer token, and attaches the `Authorization` and `Accept-Language`
//! headers. The inbound stage inspects failures for the backend's expiry
//! signal and, when present, engages the refresh gate and replays the
//! request exactly once with the fresh token. Any other failure — and a
//! second expiry on the replay — is surfaced unchanged.

use std::{fmt, sync::Arc};

use bytes::{BufMut, Bytes, BytesMut};
use reqwest::{header, Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use sellerdesk_tokens::{
    store::{keys, CredentialStore},
    AccessTokenRef, LanguageCode, RefreshGate, SharedTokenError, TokenManager,
};

use crate::error::ErrorBody;

/// The server's sentinel status marking a token-expiry failure
pub const TOKEN_EXPIRED_STATUS: &str = "TOKEN EXPIRED";

/// A middleware that injects the current bearer token into outgoing
/// requests and transparently refreshes it on expiry
pub struct BearerAuthMiddleware {
    tokens: Arc<TokenManager>,
    gate: Arc<RefreshGate>,
    store: Arc<dyn CredentialStore>,
    default_language: Option<LanguageCode>,
}

impl BearerAuthMiddleware {
    /// Constructs the middleware from its collaborators
    ///
    /// The same `gate` must be shared by every clone of the middleware that
    /// talks to the same backend; it is what collapses concurrent refreshes
    /// into a single network call.
    pub fn new(
        tokens: Arc<TokenManager>,
        gate: Arc<RefreshGate>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            tokens,
            gate,
            store,
            default_language: None,
        }
    }

    /// Sets the language used when the store has no preference recorded
    pub fn with_default_language(mut self, language: LanguageCode) -> Self {
        self.default_language = Some(language);
        self
    }

    /// The outbound stage: wait for the gate, fetch the token, attach
    /// headers
    ///
    /// On the first dispatch an `Authorization` header already present on
    /// the request wins. On the expiry replay the header is force-replaced,
    /// since the replay must differ from the original request only in its
    /// authorization.
    async fn prepare(&self, req: &mut Request, replace_auth: bool) -> reqwest_middleware::Result<()> {
        self.gate.wait_until_clear().await;

        let token = self.tokens.get_token().await.map_err(|error| {
            reqwest_middleware::Error::Middleware(anyhow::Error::new(SharedTokenError::from(
                error,
            )))
        })?;

        if replace_auth {
            req.headers_mut()
                .insert(header::AUTHORIZATION, bearer_value(&token));
        } else {
            req.headers_mut()
                .entry(header::AUTHORIZATION)
                .or_insert_with(|| bearer_value(&token));
        }

        if let Some(language) = self.language().await {
            req.headers_mut()
                .entry(header::ACCEPT_LANGUAGE)
                .or_insert(language);
        }

        Ok(())
    }

    async fn language(&self) -> Option<header::HeaderValue> {
        let stored = match self.store.get(keys::LANGUAGE).await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    error = &*error as &dyn std::error::Error,
                    "unable to read language preference"
                );
                None
            }
        };

        stored
            .filter(|language| !language.is_empty())
            .or_else(|| {
                self.default_language
                    .as_ref()
                    .map(|language| language.as_str().to_owned())
            })
            .and_then(|language| header::HeaderValue::from_str(&language).ok())
    }
}

#[async_trait::async_trait]
impl Middleware for BearerAuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        // The replay must be a structural duplicate of the request as the
        // caller built it, before any headers are attached.
        let replay = req.try_clone();

        self.prepare(&mut req, false).await?;
        let response = next.clone().run(req, extensions).await?;

        let status = response.status();
        if !status.is_client_error() && !status.is_server_error() {
            return Ok(response);
        }

        // Confirming the expiry signal requires consuming the body; keep
        // enough of the response to reconstruct it when the signal is absent.
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if !is_expiry_signal(&body) {
            return Ok(rebuild_response(status, headers, body));
        }

        let Some(mut replay) = replay else {
            tracing::debug!("expired-token response on a non-replayable request");
            return Ok(rebuild_response(status, headers, body));
        };

        tracing::debug!(
            status = status.as_u16(),
            "token expiry reported, coordinating refresh"
        );

        let tokens = Arc::clone(&self.tokens);
        match self
            .gate
            .run_exclusive(move || async move { tokens.refresh_token().await })
            .await
        {
            Ok(outcome) => {
                tracing::debug!(?outcome, "refresh complete, replaying request");
            }
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    "token refresh failed"
                );
                return Err(reqwest_middleware::Error::Middleware(anyhow::Error::new(
                    error,
                )));
            }
        }

        self.prepare(&mut replay, true).await?;
        next.run(replay, extensions).await
    }
}

impl fmt::Debug for BearerAuthMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BearerAuthMiddleware")
            .field("tokens", &self.tokens)
            .field("gate", &self.gate)
            .field("default_language", &self.default_language)
            .finish_non_exhaustive()
    }
}

fn bearer_value(token: &AccessTokenRef) -> header::HeaderValue {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value =
        header::HeaderValue::from_maybe_shared(header_value.freeze()).expect("only valid header bytes");
    value.set_sensitive(true);
    value
}

// The expiry signal is an HTTP error whose JSON body carries the sentinel
// status; anything else, including unparseable bodies, is an ordinary
// failure.
fn is_expiry_signal(body: &[u8]) -> bool {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.status)
        .as_deref()
        == Some(TOKEN_EXPIRED_STATUS)
}

fn rebuild_response(status: StatusCode, headers: header::HeaderMap, body: Bytes) -> Response {
    let mut builder = http::Response::builder().status(status);
    if let Some(header_map) = builder.headers_mut() {
        *header_map = headers;
    }
    let response = builder
        .body(body)
        .expect("parts were taken from a valid response");
    Response::from(response)
}
