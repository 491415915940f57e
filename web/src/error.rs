use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

use externalauth::error::{Error as AuthError, ErrorKind};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(AuthError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self.0.error_kind {
            ErrorKind::Params => StatusCode::BAD_REQUEST,
            ErrorKind::Session(_) | ErrorKind::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Provider(_) | ErrorKind::Http(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match status {
            StatusCode::BAD_REQUEST => {
                warn!("Rejected external auth callback: {}", self.0);
                (status, "BAD REQUEST").into_response()
            }
            StatusCode::BAD_GATEWAY => {
                error!("Identity provider failure: {}", self.0);
                (status, "BAD GATEWAY").into_response()
            }
            _ => {
                error!("External auth failure: {}", self.0);
                (status, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<AuthError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
