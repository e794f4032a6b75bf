use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Everything that mints tokens lives here.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        // Username/password in, access + refresh token out.
        .route("/auth/login", post(handlers::login))
        // POST /auth/register
        .route("/auth/register", post(handlers::register))
        // POST /auth/refresh
        // Refresh token in, new access token out. The account is re-read first.
        .route("/auth/refresh", post(handlers::refresh_token))
}
