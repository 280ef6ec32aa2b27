use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // OAuth2 endpoints; the tenant comes from the Host header
    let oauth2_routes = Router::new()
        .route("/authorize", get(handlers::oauth2::authorize))
        .route("/token", post(handlers::oauth2::token))
        .route(
            "/userinfo",
            get(handlers::oauth2::userinfo).post(handlers::oauth2::userinfo),
        )
        .route("/revoke", post(handlers::oauth2::revoke))
        .route("/introspect", post(handlers::oauth2::introspect));

    let well_known_routes = Router::new()
        .route("/jwks.json", get(handlers::well_known::jwks))
        .route(
            "/openid-configuration",
            get(handlers::well_known::openid_configuration),
        );

    Router::new()
        .nest("/oauth", oauth2_routes)
        .nest("/.well-known", well_known_routes)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
