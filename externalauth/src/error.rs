//! Error types for the `externalauth` crate.
//!
//! A root Error struct carries an error kind and an optional source for chaining.
//! "Not applicable" callbacks are not errors at all: drivers return `Ok(None)` for them.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the external authentication drivers.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors surfaced to the host.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The callback is malformed, forged or stale. The host should restart the login.
    Params,
    Session(SessionErrorKind),
    Provider(ProviderErrorKind),
    Http(HttpErrorKind),
    /// The login cannot proceed at all (no randomness, state could not be persisted).
    Fatal(FatalErrorKind),
}

/// Errors from the per-session state store.
#[derive(Debug, PartialEq)]
pub enum SessionErrorKind {
    Storage,
    Serialization,
}

/// Errors reported by an identity provider.
#[derive(Debug, PartialEq)]
pub enum ProviderErrorKind {
    /// The authorization code was rejected as invalid or expired.
    InvalidCode,
    Api,
    InvalidResponse,
}

/// Errors from HTTP client operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Network,
}

/// Unrecoverable environment failures during login initiation.
#[derive(Debug, PartialEq)]
pub enum FatalErrorKind {
    Randomness,
    StatePersistence,
    AuthorizeUrl,
}

impl Error {
    /// True for the distinguished parameter error.
    pub fn is_params_error(&self) -> bool {
        self.error_kind == ErrorKind::Params
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.error_kind, ErrorKind::Fatal(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Params => write!(f, "external auth params error")?,
            ErrorKind::Session(kind) => write!(f, "Session error: {:?}", kind)?,
            ErrorKind::Provider(kind) => write!(f, "Provider error: {:?}", kind)?,
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind)?,
            ErrorKind::Fatal(kind) => write!(f, "Fatal error: {:?}", kind)?,
        }
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else if err.is_decode() {
            ErrorKind::Provider(ProviderErrorKind::InvalidResponse)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            reqwest_middleware::Error::Middleware(err) => Error {
                source: Some(err.into()),
                error_kind: ErrorKind::Http(HttpErrorKind::Network),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Session(SessionErrorKind::Serialization),
        }
    }
}

/// Helper function to create the parameter error.
pub fn params_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Params,
    }
}

/// Helper function to create session store errors.
pub fn session_error(kind: SessionErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Session(kind),
    }
}

/// Helper function to create provider errors.
pub fn provider_error(kind: ProviderErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Provider(kind),
    }
}

/// Helper function to promote any failure into a fatal error.
pub fn fatal_error<E>(kind: FatalErrorKind, source: E) -> Error
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    Error {
        source: Some(source.into()),
        error_kind: ErrorKind::Fatal(kind),
    }
}
