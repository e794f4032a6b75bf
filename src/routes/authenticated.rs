use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every handler here receives verified access-token claims through `AuthUser` and asks
/// the `Authorizer` for the permission it needs before doing any work.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's own account. Requires `account:read_own_profile`.
        .route("/me", get(handlers::get_me))
}
