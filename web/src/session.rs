//! Login state kept in the browser's server-side session.

use async_trait::async_trait;
use tower_sessions::session::Error as SessionError;
use tower_sessions::Session;

use externalauth::error::{Error, ErrorKind, SessionErrorKind};
use externalauth::{AuthResult, LoginState, StateStore};

/// Session key of the last completed login.
pub const RESULT_KEY: &str = "externalauth.result";

/// `StateStore` over a `tower_sessions::Session`.
///
/// Concurrent requests in one session each load their own copy of the record, so the
/// default load-compare-delete `consume` is used.
///
/// Deletions are written through to the session store at once. The session layer skips
/// saving on server-error responses, and a consumed state must stay consumed when the
/// code exchange after it fails.
#[derive(Clone)]
pub struct SessionStateStore {
    session: Session,
}

impl SessionStateStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub async fn store_result(&self, result: &AuthResult) -> Result<(), Error> {
        self.session
            .insert(RESULT_KEY, result)
            .await
            .map_err(session_error)
    }
}

#[async_trait]
impl StateStore for SessionStateStore {
    async fn save(&self, key: &str, state: LoginState) -> Result<(), Error> {
        self.session.insert(key, state).await.map_err(session_error)
    }

    async fn load(&self, key: &str) -> Result<Option<LoginState>, Error> {
        self.session.get(key).await.map_err(session_error)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.session
            .remove::<LoginState>(key)
            .await
            .map_err(session_error)?;
        self.session.save().await.map_err(session_error)
    }
}

fn session_error(err: SessionError) -> Error {
    let kind = match err {
        SessionError::SerdeJson(_) => SessionErrorKind::Serialization,
        _ => SessionErrorKind::Storage,
    };
    Error {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::Session(kind),
    }
}
