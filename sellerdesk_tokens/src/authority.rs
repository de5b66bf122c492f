//! HTTP client for the backend's token endpoints
//!
//! The backend issues tokens from two endpoints: `GET /authenticate` mints
//! the very first token and requires no credentials, while
//! `GET /refreshtoken` exchanges the current bearer token for a new one.
//! Refresh calls carry a marker header so the server can tell them apart
//! from ordinary authenticated calls.

use serde::Deserialize;
use thiserror::Error;

use crate::{AccessToken, AccessTokenRef};

/// Header attached to refresh calls so the server can distinguish them
/// from ordinary authenticated requests
pub const REFRESH_MARKER_HEADER: &str = "isRefreshToken";

/// The token issuing authority for the API backend
#[derive(Clone, Debug)]
pub struct TokenAuthority {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl TokenAuthority {
    /// Constructs an authority client rooted at the given API base URL
    pub fn new(client: reqwest::Client, base_url: reqwest::Url) -> Self {
        Self { client, base_url }
    }

    /// Mints a brand new token via `GET /authenticate`
    ///
    /// No credentials are attached; this is how the very first token of a
    /// session is obtained.
    pub async fn mint(&self) -> Result<AccessToken, TokenRequestError> {
        let url = self.endpoint("authenticate")?;
        fetch_token(self.client.get(url)).await
    }

    /// Exchanges `current` for a fresh token via `GET /refreshtoken`
    ///
    /// The current token rides along as the bearer credential together with
    /// the [`REFRESH_MARKER_HEADER`].
    pub async fn refresh(&self, current: &AccessTokenRef) -> Result<AccessToken, TokenRequestError> {
        let url = self.endpoint("refreshtoken")?;
        fetch_token(
            self.client
                .get(url)
                .bearer_auth(current.as_str())
                .header(REFRESH_MARKER_HEADER, "true"),
        )
        .await
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, TokenRequestError> {
        Ok(self.base_url.join(path)?)
    }
}

/// An error while attempting to obtain a token from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// An error from the authority with an error body
    #[error("error requesting token from authority: {body}")]
    ErrorWithBody {
        /// The underlying request error
        source: reqwest::Error,
        /// The body of the error
        body: String,
    },
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBody(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(reqwest::Error),
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    RequestSend(reqwest::Error),
    /// The token endpoint URL could not be constructed
    #[error("invalid token endpoint URL")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    jwttoken: AccessToken,
}

#[tracing::instrument(err, skip_all)]
async fn fetch_token(req: reqwest::RequestBuilder) -> Result<AccessToken, TokenRequestError> {
    tracing::trace!("requesting token from authority");

    let resp = req.send().await.map_err(TokenRequestError::RequestSend)?;

    tracing::debug!(
        response.status = resp.status().as_u16(),
        "received token response from issuing authority"
    );

    if let Err(error) = resp.error_for_status_ref() {
        let body = resp.text().await.map_err(TokenRequestError::BodyRead)?;
        return Err(TokenRequestError::ErrorWithBody {
            source: error,
            body,
        });
    }

    let body = resp.bytes().await.map_err(TokenRequestError::BodyRead)?;
    let resp: TokenResponse = serde_json::from_slice(&body)?;

    tracing::info!("received new bearer token");

    Ok(resp.jwttoken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{bearer_token, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn authority(server: &MockServer) -> TokenAuthority {
        TokenAuthority::new(reqwest::Client::new(), server.uri().parse().unwrap())
    }

    #[tokio::test]
    async fn mint_parses_the_token_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jwttoken": "T1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = authority(&server).mint().await.unwrap();
        assert_eq!(token.as_str(), "T1");
    }

    #[tokio::test]
    async fn refresh_sends_bearer_and_marker_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/refreshtoken"))
            .and(bearer_token("T1"))
            .and(header(REFRESH_MARKER_HEADER, "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jwttoken": "T2",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let current = AccessToken::from_static("T1");
        let token = authority(&server).refresh(&current).await.unwrap();
        assert_eq!(token.as_str(), "T2");
    }

    #[tokio::test]
    async fn error_responses_carry_the_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/authenticate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
            .mount(&server)
            .await;

        let error = authority(&server).mint().await.unwrap_err();
        match error {
            TokenRequestError::ErrorWithBody { body, .. } => {
                assert_eq!(body, "down for maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
