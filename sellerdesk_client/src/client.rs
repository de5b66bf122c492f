//! The API client entry point

use std::{fmt, sync::Arc};

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use sellerdesk_tokens::{
    authority::TokenAuthority, store::CredentialStore, LanguageCode, RefreshGate, TokenManager,
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{error::ApiError, middleware::BearerAuthMiddleware, request::ApiRequest};

/// Configuration for constructing an [`ApiClient`]
pub struct ClientConfig {
    base_url: Url,
    store: Arc<dyn CredentialStore>,
    http: Option<reqwest::Client>,
    default_language: Option<LanguageCode>,
}

impl ClientConfig {
    /// Configuration for a backend at `base_url` using `store` for the
    /// token and language preference
    pub fn new(base_url: Url, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            base_url,
            store,
            http: None,
            default_language: None,
        }
    }

    /// Uses a pre-built HTTP client instead of the default
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Sets the language attached to requests when the store has no
    /// preference recorded
    pub fn with_default_language(mut self, language: LanguageCode) -> Self {
        self.default_language = Some(language);
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("default_language", &self.default_language)
            .finish_non_exhaustive()
    }
}

/// The authenticated API client
///
/// This is the single entry point the screens and forms call into. The
/// client owns the token manager, the refresh gate, and the middleware
/// stack; cloning it is cheap and clones share all of that state.
#[derive(Clone)]
pub struct ApiClient {
    http: ClientWithMiddleware,
    base_url: Url,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds the client and its middleware stack from a configuration
    pub fn new(config: ClientConfig) -> Self {
        let http_client = config.http.unwrap_or_default();

        let authority = TokenAuthority::new(http_client.clone(), config.base_url.clone());
        let tokens = Arc::new(TokenManager::new(Arc::clone(&config.store), authority));
        let gate = Arc::new(RefreshGate::new());

        let mut middleware = BearerAuthMiddleware::new(tokens, gate, config.store);
        if let Some(language) = config.default_language {
            middleware = middleware.with_default_language(language);
        }

        let http = ClientBuilder::new(http_client).with(middleware).build();

        Self {
            http,
            base_url: config.base_url,
        }
    }

    /// Sends a request and parses the JSON response body
    ///
    /// Expiry-driven refresh and replay happen transparently inside the
    /// pipeline; this either resolves with the parsed body of a successful
    /// response or rejects with a typed [`ApiError`]. Non-2xx responses are
    /// reported as [`ApiError::Server`] carrying the server's parsed error
    /// body.
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let url = self.base_url.join(request.path())?;

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        if !request.query_params().is_empty() {
            builder = builder.query(request.query_params());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(ApiError::from_middleware)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ApiError::from_error_response(response).await);
        }

        response.json().await.map_err(ApiError::Decode)
    }
}
