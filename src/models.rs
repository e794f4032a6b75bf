use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

pub type AccountId = i32;
pub type RoleId = i32;
pub type PermissionId = i32;

// --- Core Identity Schemas (Owned by the external store, read-only here) ---

/// Account
///
/// Identity record from the `accounts` table. The core reads it and never persists it
/// except through `Repository::create_account` during registration.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Account {
    pub id: AccountId,
    // Unique login name.
    pub username: String,

    /// Salted PHC hash. Never serialized: login, registration and profile responses
    /// all go out without it.
    #[sqlx(rename = "password")]
    #[serde(skip)]
    pub password_hash: String,

    pub role_id: RoleId,

    // Filled by the role join in the repository, or by the session service after lookup.
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Role
///
/// A named bundle of permissions. One role per account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: RoleId,
    // e.g. "admin", "finance", "user"
    pub name: String,
}

/// Permission
///
/// A namespaced capability string of the form `"<resource>:<action>"`.
/// Matching is case-sensitive and exact.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// NewAccount
///
/// Insert payload handed to the store during registration. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub role_id: RoleId,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for `POST /auth/register`. The plaintext password only lives long enough
/// to be hashed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub role_id: RoleId,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

// --- Response Payloads (Output Schemas) ---

/// LoginResponse
///
/// `{ access_token, refresh_token, account }`, with the account's hash omitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub account: Account,
}

/// RefreshResponse
///
/// Refresh tokens are not rotated, so only a new access token goes back.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RefreshResponse {
    pub access_token: String,
}
