//! One-time anti-forgery login state and the per-session store it lives in.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{fatal_error, session_error, Error, FatalErrorKind, SessionErrorKind};

/// Length of the state token issued by every bundled driver.
pub const STATE_LENGTH: usize = 128;

/// Anti-forgery token persisted between login initiation and the provider callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    pub state: String,
}

impl LoginState {
    /// Generate a fresh alphanumeric token of `length` characters.
    ///
    /// The generator is seeded from the operating system. Failing to obtain entropy is
    /// reported as a fatal error since no login can proceed without it.
    pub fn generate(length: usize) -> Result<Self, Error> {
        let rng = StdRng::from_rng(OsRng)
            .map_err(|e| fatal_error(FatalErrorKind::Randomness, e))?;
        let state = rng
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        Ok(Self { state })
    }

    pub fn as_str(&self) -> &str {
        &self.state
    }

    /// Exact comparison against the state presented on callback. An empty stored state never matches.
    pub fn matches(&self, presented: &str) -> bool {
        !self.state.is_empty() && self.state == presented
    }
}

/// Result of checking a presented state against the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumption {
    /// Nothing is stored under the key: never initiated, already consumed or expired.
    Missing,
    /// A state is stored but differs from the presented one. It is left in place.
    Mismatch,
    /// The presented state matched and has been removed from the store.
    Consumed,
}

/// Session-scoped keyed storage for login states.
///
/// One store instance represents one browser session; the key namespaces a driver family.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist `state` under `key`, replacing any previous value.
    async fn save(&self, key: &str, state: LoginState) -> Result<(), Error>;

    /// Look up the state stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<LoginState>, Error>;

    /// Remove the state stored under `key`.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Compare `presented` with the stored state and delete it on a match.
    ///
    /// The default implementation is load, compare, delete. Stores able to compare and
    /// delete atomically should override it.
    async fn consume(&self, key: &str, presented: &str) -> Result<Consumption, Error> {
        let stored = match self.load(key).await? {
            Some(stored) => stored,
            None => return Ok(Consumption::Missing),
        };
        if !stored.matches(presented) {
            return Ok(Consumption::Mismatch);
        }
        self.delete(key).await?;
        Ok(Consumption::Consumed)
    }
}

#[derive(Debug, Clone)]
struct StoredState {
    state: LoginState,
    expires_at: DateTime<Utc>,
}

/// In-memory state store for a single session with expiration.
#[derive(Clone)]
pub struct MemoryStateStore {
    states: Arc<Mutex<HashMap<String, StoredState>>>,
    ttl: Duration,
}

impl MemoryStateStore {
    /// Create a new store with default TTL of 10 minutes.
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(10))
    }

    /// Create a new store with custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Number of live (unexpired) states held.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.states
            .lock()
            .map(|states| states.values().filter(|s| s.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clean up expired states.
    pub fn cleanup_expired(&self) -> Result<(), Error> {
        let mut states = self.lock()?;
        let now = Utc::now();
        states.retain(|_, data| data.expires_at > now);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredState>>, Error> {
        self.states
            .lock()
            .map_err(|_| session_error(SessionErrorKind::Storage, "state store lock poisoned"))
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, key: &str, state: LoginState) -> Result<(), Error> {
        let expires_at = Utc::now() + self.ttl;
        self.lock()?
            .insert(key.to_string(), StoredState { state, expires_at });
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<LoginState>, Error> {
        let states = self.lock()?;
        Ok(states
            .get(key)
            .filter(|data| Utc::now() <= data.expires_at)
            .map(|data| data.state.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.lock()?.remove(key);
        Ok(())
    }

    // Compare and delete under one lock so two callbacks racing with the same state
    // cannot both observe a match.
    async fn consume(&self, key: &str, presented: &str) -> Result<Consumption, Error> {
        let mut states = self.lock()?;
        let outcome = match states.get(key) {
            Some(data) if Utc::now() > data.expires_at => Consumption::Missing,
            Some(data) if data.state.matches(presented) => Consumption::Consumed,
            Some(_) => Consumption::Mismatch,
            None => Consumption::Missing,
        };
        if outcome == Consumption::Consumed {
            states.remove(key);
        }
        Ok(outcome)
    }
}
