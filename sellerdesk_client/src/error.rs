//! Error taxonomy for the request pipeline

use reqwest::StatusCode;
use sellerdesk_tokens::SharedTokenError;
use serde::Deserialize;
use thiserror::Error;

/// The backend's error body shape
///
/// Error responses carry a JSON object with a server status string (the
/// token-expiry sentinel among them) and a human-readable message. Both
/// fields are optional in practice; proxies and gateways occasionally
/// produce bodies with neither.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    /// Server status string, e.g. `"TOKEN EXPIRED"` or `"FAILED"`
    #[serde(default)]
    pub status: Option<String>,

    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// An unrecoverable failure of an API request
#[derive(Debug, Error)]
pub enum ApiError {
    /// A bearer token could not be obtained or refreshed
    #[error("authentication failed")]
    Token(#[source] SharedTokenError),

    /// The server rejected the request
    #[error("server responded {http_status}: {message}")]
    Server {
        /// The HTTP status code of the response
        http_status: StatusCode,
        /// The server's status string from the error body, if present
        status: Option<String>,
        /// The server's message, or the raw body when no message was sent
        message: String,
    },

    /// Transport-level failure while sending the request
    #[error("error sending request")]
    Transport(#[source] reqwest::Error),

    /// The response body could not be read or decoded
    #[error("error decoding response body")]
    Decode(#[source] reqwest::Error),

    /// The request path could not be resolved against the base URL
    #[error("invalid request path")]
    Path(#[from] url::ParseError),

    /// A middleware failure that is not a token failure
    #[error("request middleware failure")]
    Middleware(#[source] anyhow::Error),
}

impl ApiError {
    pub(crate) fn from_middleware(error: reqwest_middleware::Error) -> Self {
        match error {
            reqwest_middleware::Error::Reqwest(error) => ApiError::Transport(error),
            reqwest_middleware::Error::Middleware(error) => {
                match error.downcast::<SharedTokenError>() {
                    Ok(token_error) => ApiError::Token(token_error),
                    Err(other) => ApiError::Middleware(other),
                }
            }
        }
    }

    pub(crate) async fn from_error_response(response: reqwest::Response) -> Self {
        let http_status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => return ApiError::Decode(error),
        };

        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());

        ApiError::Server {
            http_status,
            status: body.status,
            message,
        }
    }
}
