use crate::{
    AppState,
    auth::AuthUser,
    error::AuthError,
    extract::JsonBody,
    models::{
        Account, LoginRequest, LoginResponse, PermissionId, RefreshResponse, RefreshTokenRequest,
        RegisterRequest, RoleId,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

// --- Permissions required by the routes below ---

pub const READ_OWN_PROFILE: &str = "account:read_own_profile";
pub const ASSIGN_PERMISSION: &str = "permission:assign";

// --- Handlers ---

/// login
///
/// [Public Route] Exchanges username/password for an access token, a refresh token and the
/// account (hash omitted). Unknown username and wrong password answer identically.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let outcome = state
        .sessions
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
        account: outcome.account,
    }))
}

/// register
///
/// [Public Route] Creates an account with the given role.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = Account),
        (status = 400, description = "Invalid input, duplicate username or unknown role")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Account>), AuthError> {
    let account = state
        .sessions
        .register(&payload.username, &payload.password, payload.role_id)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// refresh_token
///
/// [Public Route] Trades a refresh token for a new access token. The refresh token itself
/// is returned to nobody and stays valid until it expires.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshTokenRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    let access_token = state.sessions.refresh_token(&payload.refresh_token).await?;
    Ok(Json(RefreshResponse { access_token }))
}

/// get_me
///
/// [Authenticated Route] The caller's own account, re-read from the store.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = Account),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing account:read_own_profile")
    )
)]
pub async fn get_me(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Account>, AuthError> {
    state
        .authorizer
        .authorize(Some(&claims), READ_OWN_PROFILE)
        .await?;
    let account = state.sessions.current_account(claims.account_id).await?;
    Ok(Json(account))
}

/// grant_permission
///
/// [Admin Route] Associates a permission with a role and invalidates that role's cache entry.
#[utoipa::path(
    post,
    path = "/admin/roles/{role_id}/permissions/{permission_id}",
    params(
        ("role_id" = i32, Path, description = "Role ID"),
        ("permission_id" = i32, Path, description = "Permission ID")
    ),
    responses(
        (status = 204, description = "Granted"),
        (status = 400, description = "Unknown role or permission"),
        (status = 403, description = "Missing permission:assign")
    )
)]
pub async fn grant_permission(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(RoleId, PermissionId)>,
) -> Result<StatusCode, AuthError> {
    state
        .authorizer
        .authorize(Some(&claims), ASSIGN_PERMISSION)
        .await?;
    state.permissions.grant(role_id, permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// revoke_permission
///
/// [Admin Route] Removes a permission from a role. Takes effect on the role's next check.
#[utoipa::path(
    delete,
    path = "/admin/roles/{role_id}/permissions/{permission_id}",
    params(
        ("role_id" = i32, Path, description = "Role ID"),
        ("permission_id" = i32, Path, description = "Permission ID")
    ),
    responses(
        (status = 204, description = "Revoked"),
        (status = 400, description = "Unknown role or permission"),
        (status = 403, description = "Missing permission:assign")
    )
)]
pub async fn revoke_permission(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(RoleId, PermissionId)>,
) -> Result<StatusCode, AuthError> {
    state
        .authorizer
        .authorize(Some(&claims), ASSIGN_PERMISSION)
        .await?;
    state.permissions.revoke(role_id, permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
