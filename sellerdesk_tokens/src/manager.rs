//! On-demand token acquisition and refresh

use std::{fmt, sync::Arc};

use tokio::sync::RwLock;

use crate::{
    authority::TokenAuthority,
    error::TokenError,
    store::{keys, CredentialStore},
    AccessToken,
};

/// Produces a valid bearer token on demand, minimizing redundant I/O
///
/// The manager keeps a single in-process cached token for the lifetime of
/// the process. If the cache is empty it falls back to the durable
/// credential store, and only mints a brand new token from the authority
/// when neither holds a usable value. Every successful mint or refresh is
/// written back to the durable store, so the cache, when non-empty, is
/// always the most recently known-good value.
pub struct TokenManager {
    cache: RwLock<Option<AccessToken>>,
    store: Arc<dyn CredentialStore>,
    authority: TokenAuthority,
}

impl TokenManager {
    /// Constructs a manager over the given store and authority
    pub fn new(store: Arc<dyn CredentialStore>, authority: TokenAuthority) -> Self {
        Self {
            cache: RwLock::new(None),
            store,
            authority,
        }
    }

    /// Returns the in-process cached token, if any, without any I/O
    pub async fn cached(&self) -> Option<AccessToken> {
        self.cache.read().await.clone()
    }

    /// Produces the current token
    ///
    /// Resolution order: in-process cache (no I/O), then the durable store,
    /// then a fresh mint from the authority. A minted token is persisted to
    /// the store before being returned. Authority failures propagate as-is;
    /// there is no retry at this layer.
    pub async fn get_token(&self) -> Result<AccessToken, TokenError> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref() {
                tracing::trace!("token cache hit");
                return Ok(token.clone());
            }
        }

        let stored = self
            .store
            .get(keys::ACCESS_TOKEN)
            .await
            .map_err(TokenError::Store)?;

        if let Some(stored) = stored.filter(|value| !value.is_empty()) {
            tracing::debug!("using bearer token from the credential store");
            let token = AccessToken::new(stored);
            *self.cache.write().await = Some(token.clone());
            return Ok(token);
        }

        tracing::debug!("no usable stored token, minting a new one");
        let token = self
            .authority
            .mint()
            .await
            .map_err(TokenError::Authority)?;
        self.remember(token).await
    }

    /// Exchanges the cached token for a fresh one
    ///
    /// Requires that a token has previously been obtained through
    /// [`get_token`][Self::get_token]; calling this on an empty cache fails
    /// fast with [`TokenError::NotAuthenticated`]. On success the new token
    /// is persisted and cached; on failure the stale token stays cached so
    /// the next attempt surfaces the same condition instead of losing the
    /// credential.
    pub async fn refresh_token(&self) -> Result<AccessToken, TokenError> {
        let current = self.cached().await.ok_or(TokenError::NotAuthenticated)?;

        let refreshed = self
            .authority
            .refresh(&current)
            .await
            .map_err(TokenError::Authority)?;

        tracing::info!("bearer token refreshed");
        self.remember(refreshed).await
    }

    async fn remember(&self, token: AccessToken) -> Result<AccessToken, TokenError> {
        self.store
            .set(keys::ACCESS_TOKEN, token.as_str())
            .await
            .map_err(TokenError::Store)?;
        *self.cache.write().await = Some(token.clone());
        Ok(token)
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BoxError, MemoryCredentialStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{
        matchers::{bearer_token, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    struct CountingStore {
        inner: MemoryCredentialStore,
        token_reads: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryCredentialStore::new(),
                token_reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
            if key == keys::ACCESS_TOKEN {
                self.token_reads.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), BoxError> {
            self.inner.remove(key).await
        }
    }

    fn manager(server: &MockServer, store: Arc<dyn CredentialStore>) -> TokenManager {
        let authority = TokenAuthority::new(reqwest::Client::new(), server.uri().parse().unwrap());
        TokenManager::new(store, authority)
    }

    #[tokio::test]
    async fn mints_when_store_is_empty_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jwttoken": "T1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager(&server, Arc::clone(&store) as Arc<dyn CredentialStore>);

        let token = manager.get_token().await.unwrap();
        assert_eq!(token.as_str(), "T1");
        assert_eq!(
            store.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(),
            Some("T1")
        );
    }

    #[tokio::test]
    async fn uses_stored_token_without_touching_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jwttoken": "never",
            })))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        store.set(keys::ACCESS_TOKEN, "stored").await.unwrap();

        let manager = manager(&server, store);
        let token = manager.get_token().await.unwrap();
        assert_eq!(token.as_str(), "stored");
    }

    #[tokio::test]
    async fn empty_stored_value_is_treated_as_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jwttoken": "T1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        store.set(keys::ACCESS_TOKEN, "").await.unwrap();

        let manager = manager(&server, store);
        assert_eq!(manager.get_token().await.unwrap().as_str(), "T1");
    }

    #[tokio::test]
    async fn cache_short_circuits_store_and_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jwttoken": "T1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(CountingStore::new());
        let manager = manager(&server, Arc::clone(&store) as Arc<dyn CredentialStore>);

        manager.get_token().await.unwrap();
        let reads_after_first = store.token_reads.load(Ordering::SeqCst);

        let token = manager.get_token().await.unwrap();
        assert_eq!(token.as_str(), "T1");
        assert_eq!(store.token_reads.load(Ordering::SeqCst), reads_after_first);
    }

    #[tokio::test]
    async fn refresh_requires_a_previously_obtained_token() {
        let server = MockServer::start().await;
        let manager = manager(&server, Arc::new(MemoryCredentialStore::new()));

        let error = manager.refresh_token().await.unwrap_err();
        assert!(matches!(error, TokenError::NotAuthenticated));
    }

    #[tokio::test]
    async fn refresh_exchanges_persists_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/refreshtoken"))
            .and(bearer_token("T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jwttoken": "T2",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        store.set(keys::ACCESS_TOKEN, "T1").await.unwrap();

        let manager = manager(&server, Arc::clone(&store) as Arc<dyn CredentialStore>);
        manager.get_token().await.unwrap();

        let refreshed = manager.refresh_token().await.unwrap();
        assert_eq!(refreshed.as_str(), "T2");
        assert_eq!(
            store.get(keys::ACCESS_TOKEN).await.unwrap().as_deref(),
            Some("T2")
        );
        assert_eq!(manager.cached().await.unwrap().as_str(), "T2");
    }

    #[tokio::test]
    async fn failed_refresh_leaves_the_stale_token_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/refreshtoken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        store.set(keys::ACCESS_TOKEN, "T1").await.unwrap();

        let manager = manager(&server, store);
        manager.get_token().await.unwrap();

        let error = manager.refresh_token().await.unwrap_err();
        assert!(matches!(error, TokenError::Authority(_)));
        assert_eq!(manager.cached().await.unwrap().as_str(), "T1");
    }
}
