//! Client-side secret verification
//!
//! A [`SessionContext`] holds the epoch record a client fetched and the
//! outcome of checking its cached intermediate against that record. It is the
//! explicit replacement for process-wide verification state: create one per
//! mount and pass it to whatever needs the directory token.
//!
//! ## States
//!
//! ```text
//! Unchecked ──check_cached()──▶ Checked(Granted(token))
//!                          └──▶ Checked(Denied)
//! ```
//!
//! The checked state is terminal for a session. A later successful
//! [`SessionContext::verify_secret`] does not rewrite it; it publishes the new
//! token on the separate *granted* channel, which is what content loaders
//! should follow.
//!
//! Both channels are `tokio::sync::watch` channels, so a subscriber that
//! arrives after the outcome was published still sees it immediately.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hideaway::cache::FileSecretCache;
//! use hideaway::site::SiteReader;
//! use hideaway::verifier::SessionContext;
//! use std::sync::Arc;
//!
//! # async fn demo() -> hideaway::Result<()> {
//! let site = SiteReader::new("./dist/api");
//! let cache = Arc::new(FileSecretCache::new("./.hideaway-secret.json"));
//! let session = SessionContext::mount(&site, cache).await?;
//!
//! if !session.wait_checked().await?.is_granted() {
//!     session.verify_secret("the shared secret").await?;
//! }
//! if let Some(token) = session.token() {
//!     let tree = site.full_tree(&token).await?;
//!     println!("{} top-level folders", tree.children.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::cache::{SecretCache, DEFAULT_EXPIRY_DAYS};
use crate::derivation::{DirectoryToken, IntermediateKey};
use crate::epoch::EpochRecord;
use crate::error::{HideawayError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Anything that can hand the client the current epoch record
pub trait EpochSource {
    /// Fetch `update_time.json`
    fn fetch_epoch(&self) -> impl Future<Output = Result<EpochRecord>> + Send;
}

/// Result of testing a secret or cached intermediate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Proof matched; the token opens the secret partition
    Granted(DirectoryToken),
    /// No proof, or proof for a different secret or epoch
    Denied,
}

impl Outcome {
    /// Whether access was granted
    pub fn is_granted(&self) -> bool {
        matches!(self, Outcome::Granted(_))
    }

    /// Directory token, if granted
    pub fn token(&self) -> Option<&DirectoryToken> {
        match self {
            Outcome::Granted(token) => Some(token),
            Outcome::Denied => None,
        }
    }
}

/// Verification progress of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    /// The cached value has not been tested yet
    Unchecked,
    /// The cached value was tested; terminal
    Checked(Outcome),
}

/// Per-mount verification state and the epoch it is bound to
pub struct SessionContext {
    record: EpochRecord,
    cache: Arc<dyn SecretCache>,
    expiry_days: u32,
    state: watch::Sender<VerificationState>,
    granted: watch::Sender<Option<DirectoryToken>>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("record", &self.record)
            .field("expiry_days", &self.expiry_days)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl SessionContext {
    /// Unchecked session for an already fetched record
    pub fn new(record: EpochRecord, cache: Arc<dyn SecretCache>) -> Self {
        let (state, _) = watch::channel(VerificationState::Unchecked);
        let (granted, _) = watch::channel(None);
        Self {
            record,
            cache,
            expiry_days: DEFAULT_EXPIRY_DAYS,
            state,
            granted,
        }
    }

    /// Fetch the epoch record and check the cached value against it
    ///
    /// # Errors
    ///
    /// Whatever the source returns when the record cannot be fetched. A
    /// missing or wrong cached value is not an error; it yields `Denied`.
    pub async fn mount<S: EpochSource>(source: &S, cache: Arc<dyn SecretCache>) -> Result<Self> {
        let record = source.fetch_epoch().await?;
        let session = Self::new(record, cache);
        session.check_cached();
        Ok(session)
    }

    /// Lifetime in days given to values this session caches
    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expiry_days = days;
        self
    }

    /// The epoch record this session verifies against
    pub fn record(&self) -> &EpochRecord {
        &self.record
    }

    /// Current verification state
    pub fn state(&self) -> VerificationState {
        self.state.borrow().clone()
    }

    /// Latest granted token from either the cached check or a manual one
    pub fn token(&self) -> Option<DirectoryToken> {
        self.granted.borrow().clone()
    }

    /// Receiver for state changes
    pub fn subscribe_checked(&self) -> watch::Receiver<VerificationState> {
        self.state.subscribe()
    }

    /// Receiver for granted tokens
    pub fn subscribe_granted(&self) -> watch::Receiver<Option<DirectoryToken>> {
        self.granted.subscribe()
    }

    /// Test the cached intermediate, once per session
    ///
    /// Later calls return the outcome of the first.
    pub fn check_cached(&self) -> Outcome {
        if let VerificationState::Checked(outcome) = &*self.state.borrow() {
            return outcome.clone();
        }

        let outcome = match self.cache.get() {
            None => {
                debug!("No cached secret; denied without a check");
                Outcome::Denied
            }
            Some(value) => IntermediateKey::from_cached(value)
                .unlock(self.record.update_time, &self.record.update_id)
                .map(Outcome::Granted)
                .unwrap_or(Outcome::Denied),
        };

        if let Outcome::Granted(token) = &outcome {
            self.granted.send_replace(Some(token.clone()));
        }
        self.state.send_replace(VerificationState::Checked(outcome.clone()));
        info!("Cached secret check: {}", if outcome.is_granted() { "granted" } else { "denied" });
        outcome
    }

    /// Test a freshly entered secret
    ///
    /// On success only the derived intermediate is cached (never `secret`
    /// itself) and the token is published to granted subscribers. A wrong
    /// secret returns `Denied` and changes nothing.
    ///
    /// # Errors
    ///
    /// Only when the cache cannot store the intermediate.
    pub async fn verify_secret(&self, secret: &str) -> Result<Outcome> {
        let intermediate = IntermediateKey::derive(secret, self.record.update_time);
        let Some(token) = intermediate.unlock(self.record.update_time, &self.record.update_id) else {
            debug!("Entered secret does not match epoch {}", self.record.update_time);
            return Ok(Outcome::Denied);
        };

        self.cache.set(intermediate.as_str(), self.expiry_days)?;
        self.granted.send_replace(Some(token.clone()));
        info!("Secret verified for epoch {}", self.record.update_time);
        Ok(Outcome::Granted(token))
    }

    /// Wait until the cached check has run and return its outcome
    pub async fn wait_checked(&self) -> Result<Outcome> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, VerificationState::Checked(_)))
            .await
            .map_err(|_| HideawayError::internal("verification state channel closed"))?;
        match &*state {
            VerificationState::Checked(outcome) => Ok(outcome.clone()),
            VerificationState::Unchecked => Err(HideawayError::internal("woke while unchecked")),
        }
    }

    /// Wait until some check grants access and return the token
    ///
    /// Resolves immediately if access was already granted. Never resolves
    /// for a session that is never granted.
    pub async fn wait_granted(&self) -> Result<DirectoryToken> {
        let mut rx = self.granted.subscribe();
        let token = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| HideawayError::internal("grant channel closed"))?;
        token
            .clone()
            .ok_or_else(|| HideawayError::internal("woke without a token"))
    }
}
