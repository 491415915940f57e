use crate::controller::{external_auth_controller, health_check_controller};
use crate::AppState;
use axum::{routing::get, Router};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "External Auth Drivers"
        ),
        paths(
            external_auth_controller::login,
            external_auth_controller::callback,
            health_check_controller::health_check,
        ),
        tags(
            (name = "externalauth", description = "Browser redirect login with external identity providers")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(external_auth_routes(app_state))
        .merge(health_routes())
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

/// Login initiation and provider callbacks, one pair per registered driver name.
fn external_auth_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/auth/{driver}/login",
            get(external_auth_controller::login),
        )
        .route(
            "/auth/{driver}/callback",
            get(external_auth_controller::callback),
        )
        .with_state(app_state)
}
