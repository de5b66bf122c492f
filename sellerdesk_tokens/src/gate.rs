//! Single-flight coordination of token refreshes
//!
//! At most one refresh operation may be in flight process-wide. The first
//! caller to detect an expired token becomes the holder and performs the
//! network refresh; every caller that arrives while the gate is engaged
//! waits for the holder to finish and then observes its outcome instead of
//! starting a refresh of its own. Without this, a burst of concurrent
//! requests hitting the same expiry would each refresh independently, and
//! a server that rotates tokens on every refresh would invalidate the
//! tokens minted for the sibling requests.

use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};

use tokio::sync::Mutex;

use crate::{
    error::{SharedTokenError, TokenError},
    AccessToken,
};

/// The result of engaging the refresh gate
#[derive(Debug)]
pub enum RefreshOutcome {
    /// This caller held the gate and performed the network refresh
    Refreshed(AccessToken),
    /// A concurrent caller performed the refresh; the fresh token is
    /// available from the token manager's cache
    Reused,
}

/// The mutual-exclusion gate serializing refresh operations
///
/// The gate's lock has an honest wait queue: waiters suspend on the mutex
/// rather than polling. Release is tied to guard drop, so the gate clears
/// on every exit path, including failures.
#[derive(Debug, Default)]
pub struct RefreshGate {
    // Outcome of the most recently completed cycle: None on success, the
    // shared failure otherwise. Doubling as the exclusion lock means a
    // waiter can only read it once the holder is done.
    cycle: Mutex<Option<SharedTokenError>>,
    engaged: AtomicBool,
}

impl RefreshGate {
    /// Constructs an unengaged gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking check for an in-flight refresh
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Waits until no refresh is in flight
    ///
    /// The outbound request stage calls this before fetching a token, so
    /// that requests are never dispatched with a token that is already
    /// known to be stale while its replacement is being fetched.
    pub async fn wait_until_clear(&self) {
        if self.is_engaged() {
            drop(self.cycle.lock().await);
        }
    }

    /// Runs `refresh` under the gate, or waits for the current holder
    ///
    /// If the gate is free, this caller acquires it, runs `refresh`, and
    /// releases it once the operation resolves. If the gate is already
    /// engaged, no second refresh is attempted: the caller suspends until
    /// the holder releases and then observes the holder's outcome — the
    /// fresh token on success, or the holder's failure, which waiters must
    /// propagate since the token is presumed broken rather than merely
    /// contended.
    pub async fn run_exclusive<F, Fut>(&self, refresh: F) -> Result<RefreshOutcome, SharedTokenError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, TokenError>>,
    {
        match self.cycle.try_lock() {
            Ok(mut cycle) => {
                let _engaged = Engaged::raise(&self.engaged);

                tracing::debug!("engaged refresh gate, performing refresh");
                match refresh().await {
                    Ok(token) => {
                        *cycle = None;
                        Ok(RefreshOutcome::Refreshed(token))
                    }
                    Err(error) => {
                        let shared = SharedTokenError::from(error);
                        *cycle = Some(shared.clone());
                        Err(shared)
                    }
                }
            }
            Err(_) => {
                tracing::debug!("refresh already in flight, waiting for its outcome");
                let cycle = self.cycle.lock().await;
                match &*cycle {
                    Some(error) => Err(error.clone()),
                    None => Ok(RefreshOutcome::Reused),
                }
            }
        }
    }
}

// Clears the engaged flag when the holder's future completes or is dropped.
struct Engaged<'a>(&'a AtomicBool);

impl<'a> Engaged<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for Engaged<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
