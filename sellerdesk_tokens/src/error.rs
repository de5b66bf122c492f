use std::{error, fmt, sync::Arc};

use thiserror::Error;

use crate::{authority::TokenRequestError, store::BoxError};

/// An error while obtaining or refreshing a bearer token
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token authority rejected or failed the mint/refresh call
    #[error("token authority request failed")]
    Authority(#[source] TokenRequestError),

    /// The durable credential store failed
    #[error("credential store failure")]
    Store(#[source] BoxError),

    /// A refresh was requested before any token had ever been obtained
    ///
    /// Refreshing requires a current token to exchange; hitting this is a
    /// caller sequencing error, not a recoverable runtime condition.
    #[error("refresh requested before a token was ever obtained")]
    NotAuthenticated,
}

/// A token failure as observed by every participant of a refresh cycle
///
/// The holder of the refresh gate produces the original [`TokenError`];
/// callers that waited on the same cycle observe the identical failure
/// through this shared, clonable handle rather than attempting a refresh of
/// their own.
#[derive(Clone)]
pub struct SharedTokenError(Arc<TokenError>);

impl SharedTokenError {
    /// The underlying token failure
    pub fn inner(&self) -> &TokenError {
        &self.0
    }
}

impl From<TokenError> for SharedTokenError {
    fn from(error: TokenError) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Debug for SharedTokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for SharedTokenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl error::Error for SharedTokenError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        error::Error::source(&*self.0)
    }
}
