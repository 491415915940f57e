//! External authentication driver trait and the state-validated redirect handshake
//! shared by every driver.

use async_trait::async_trait;
use log::*;
use serde::Deserialize;
use url::Url;

use crate::error::{fatal_error, params_error, Error, ErrorKind, FatalErrorKind, ProviderErrorKind};
use crate::profile::AuthResult;
use crate::redirect::LoginRedirect;
use crate::state::{Consumption, LoginState, StateStore};

/// Per-request collaborators the host hands to a driver.
#[derive(Clone, Copy)]
pub struct LoginContext<'a> {
    /// State storage scoped to the requesting browser session.
    pub store: &'a dyn StateStore,
    /// Callback URL the provider must send the browser back to.
    pub auth_url: &'a str,
}

impl<'a> LoginContext<'a> {
    pub fn new(store: &'a dyn StateStore, auth_url: &'a str) -> Self {
        Self { store, auth_url }
    }
}

/// Query parameters of a provider callback.
///
/// Empty values are treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    pub fn new(code: Option<&str>, state: Option<&str>) -> Self {
        Self {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
        }
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref().filter(|s| !s.is_empty())
    }
}

/// A two-step browser redirect login against one identity provider.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Start a login: issue a state and build the redirect to the provider.
    async fn external_login(&self, ctx: LoginContext<'_>) -> Result<LoginRedirect, Error>;

    /// Handle a provider callback.
    ///
    /// Returns `Ok(None)` when the request is not a callback for a login in progress
    /// with this driver, the parameter error when it is malformed, forged or stale,
    /// and the mapped result otherwise.
    async fn auth_request(
        &self,
        ctx: LoginContext<'_>,
        params: &CallbackParams,
    ) -> Result<Option<AuthResult>, Error>;
}

/// Generate a login state of `length` characters and persist it under `key`.
///
/// Both failures are fatal: a login cannot proceed without remembering its own state.
pub async fn issue_state(
    store: &dyn StateStore,
    key: &str,
    length: usize,
) -> Result<LoginState, Error> {
    let state = LoginState::generate(length)?;
    store
        .save(key, state.clone())
        .await
        .map_err(|e| fatal_error(FatalErrorKind::StatePersistence, e))?;
    debug!("Issued login state under {}", key);
    Ok(state)
}

/// Parse a fixed authorize endpoint.
pub fn authorize_url(base: &str) -> Result<Url, Error> {
    Url::parse(base).map_err(|e| fatal_error(FatalErrorKind::AuthorizeUrl, e))
}

/// Validate callback parameters against the state stored under `key`.
///
/// On success the stored state has already been deleted and the authorization code is
/// returned; the caller exchanges it. `Ok(None)` means not applicable.
pub async fn verify_callback(
    store: &dyn StateStore,
    key: &str,
    params: &CallbackParams,
) -> Result<Option<String>, Error> {
    let code = match params.code() {
        Some(code) => code,
        None => return Ok(None),
    };
    let state = params
        .state()
        .ok_or_else(|| params_error("callback is missing state"))?;

    match store.consume(key, state).await? {
        Consumption::Missing => {
            debug!("No login in progress under {}", key);
            Ok(None)
        }
        Consumption::Mismatch => {
            warn!("Login state mismatch under {}", key);
            Err(params_error("login state mismatch"))
        }
        Consumption::Consumed => Ok(Some(code.to_string())),
    }
}

/// Treat a provider-rejected authorization code as client-caused.
pub(crate) fn invalid_code_as_params(err: Error) -> Error {
    if err.error_kind == ErrorKind::Provider(ProviderErrorKind::InvalidCode) {
        warn!("Provider rejected authorization code: {}", err);
        params_error("authorization code rejected by provider")
    } else {
        err
    }
}
