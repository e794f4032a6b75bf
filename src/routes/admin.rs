use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Role/permission administration, nested under `/admin`.
///
/// Access Control:
/// The router is wrapped in the authentication middleware, and each handler then requires
/// `permission:assign`. The bypass role passes that check without a lookup.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST/DELETE /admin/roles/{role_id}/permissions/{permission_id}
        // Grants or revokes one permission. The role's cached set is dropped on success.
        .route(
            "/roles/{role_id}/permissions/{permission_id}",
            post(handlers::grant_permission).delete(handlers::revoke_permission),
        )
}
