//! The single gate every protected operation passes through.

use std::sync::Arc;

use crate::{
    cache::PermissionCache,
    error::{AuthError, AuthResult},
    models::RoleId,
    token::AccessClaims,
};

/// Role ID of the bootstrap administrator unless configured otherwise.
pub const DEFAULT_ADMIN_ROLE_ID: RoleId = 1;

/// BypassRole
///
/// The one role exempt from permission checks. Exactly one role ID can hold it, and every
/// bypass is logged at `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BypassRole(RoleId);

impl BypassRole {
    pub const fn new(role_id: RoleId) -> Self {
        Self(role_id)
    }

    pub const fn role_id(self) -> RoleId {
        self.0
    }

    pub fn covers(self, role_id: RoleId) -> bool {
        self.0 == role_id
    }
}

impl Default for BypassRole {
    fn default() -> Self {
        Self(DEFAULT_ADMIN_ROLE_ID)
    }
}

/// Authorizer
///
/// Decides allow/deny for a caller's claims and a required `"<resource>:<action>"` string.
#[derive(Debug, Clone)]
pub struct Authorizer {
    cache: Arc<PermissionCache>,
    bypass: BypassRole,
}

impl Authorizer {
    pub fn new(cache: Arc<PermissionCache>, bypass: BypassRole) -> Self {
        Self { cache, bypass }
    }

    pub fn bypass_role(&self) -> BypassRole {
        self.bypass
    }

    pub fn cache(&self) -> &Arc<PermissionCache> {
        &self.cache
    }

    /// authorize
    ///
    /// - no claims: `Unauthorized`
    /// - bypass role: allowed, whatever the permission
    /// - otherwise allowed iff the role's permission set contains `permission` exactly;
    ///   `Forbidden` if not, `Internal` if the store could not be read
    pub async fn authorize(&self, claims: Option<&AccessClaims>, permission: &str) -> AuthResult<()> {
        let Some(claims) = claims else {
            tracing::warn!(permission, "authorization failed: no authenticated claims");
            return Err(AuthError::Unauthorized(
                "invalid or missing authentication credentials",
            ));
        };

        if self.bypass.covers(claims.role_id) {
            tracing::info!(
                account_id = claims.account_id,
                role_id = claims.role_id,
                permission,
                "administrator bypass: permission check skipped"
            );
            return Ok(());
        }

        let allowed = self
            .cache
            .has_permission(claims.role_id, permission)
            .await
            .inspect_err(|_| {
                tracing::error!(
                    account_id = claims.account_id,
                    role_id = claims.role_id,
                    permission,
                    "error checking permission"
                );
            })?;

        if !allowed {
            tracing::warn!(
                account_id = claims.account_id,
                role_id = claims.role_id,
                permission,
                "forbidden: insufficient permissions"
            );
            return Err(AuthError::Forbidden(
                "insufficient permissions to perform this action",
            ));
        }

        Ok(())
    }
}
