//! Controller for external identity provider logins.
//!
//! Both endpoints are reached through browser redirects, so they take no
//! custom headers and answer with redirects, HTML or JSON.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use log::*;
use tower_sessions::Session;

use externalauth::{CallbackParams, Driver, LoginContext, LoginRedirect, RedirectStyle};

use crate::session::SessionStateStore;
use crate::{AppState, Error};

/// GET /auth/{driver}/login
///
/// Starts a login with the named driver and sends the browser to the provider.
#[utoipa::path(
    get,
    path = "/auth/{driver}/login",
    params(
        ("driver" = String, Path, description = "Driver name: windowslive, wechatwork or wechatwork-qr"),
    ),
    responses(
        (status = 302, description = "Redirect to the provider's authorize page"),
        (status = 200, description = "HTML page redirecting to the provider via meta refresh"),
        (status = 404, description = "Unknown driver"),
        (status = 500, description = "Login state could not be issued"),
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    Path(driver_name): Path<String>,
    session: Session,
) -> Result<Response, Error> {
    let Some(driver) = app_state.registry.get(&driver_name) else {
        return Ok(not_found(&driver_name));
    };

    let store = SessionStateStore::new(session);
    let callback_url = app_state.config.callback_url(&driver_name);
    let redirect = driver
        .external_login(LoginContext::new(&store, &callback_url))
        .await?;

    debug!("Redirecting to {} for login", driver_name);
    Ok(redirect_response(redirect))
}

/// GET /auth/{driver}/callback
///
/// Completes a login. The resulting account and profile are kept in the session and
/// returned to the caller.
#[utoipa::path(
    get,
    path = "/auth/{driver}/callback",
    params(
        ("driver" = String, Path, description = "Driver name the login was started with"),
        ("code" = Option<String>, Query, description = "Authorization code from the provider"),
        ("state" = Option<String>, Query, description = "Login state echoed by the provider"),
    ),
    responses(
        (status = 200, description = "Authenticated account and profile as JSON"),
        (status = 400, description = "Malformed, forged or stale callback"),
        (status = 404, description = "Unknown driver or no login in progress"),
        (status = 500, description = "Session storage failure"),
        (status = 502, description = "Identity provider failure"),
    )
)]
pub async fn callback(
    State(app_state): State<AppState>,
    Path(driver_name): Path<String>,
    Query(params): Query<CallbackParams>,
    session: Session,
) -> Result<Response, Error> {
    let Some(driver) = app_state.registry.get(&driver_name) else {
        return Ok(not_found(&driver_name));
    };

    let store = SessionStateStore::new(session);
    let callback_url = app_state.config.callback_url(&driver_name);
    let result = driver
        .auth_request(LoginContext::new(&store, &callback_url), &params)
        .await?;

    match result {
        Some(result) => {
            store.store_result(&result).await?;
            Ok(Json(result).into_response())
        }
        None => {
            debug!("No {} login in progress for this callback", driver_name);
            Ok((StatusCode::NOT_FOUND, "NOT FOUND").into_response())
        }
    }
}

fn redirect_response(redirect: LoginRedirect) -> Response {
    match redirect.style {
        RedirectStyle::Found => (
            StatusCode::FOUND,
            [(header::LOCATION, redirect.location().to_string())],
        )
            .into_response(),
        RedirectStyle::MetaRefresh => Html(redirect.html()).into_response(),
    }
}

fn not_found(driver_name: &str) -> Response {
    warn!("Unknown external auth driver: {}", driver_name);
    (StatusCode::NOT_FOUND, "NOT FOUND").into_response()
}
