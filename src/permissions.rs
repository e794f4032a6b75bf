use std::sync::Arc;

use crate::{
    cache::PermissionCache,
    error::{AuthError, AuthResult},
    models::{Permission, PermissionId, Role, RoleId},
    repository::RepositoryState,
};

/// PermissionService
///
/// Write path for role/permission associations. Every successful write invalidates the
/// cached set of the affected role, so the change is visible on the next check instead
/// of on the next restart.
#[derive(Clone)]
pub struct PermissionService {
    repo: RepositoryState,
    cache: Arc<PermissionCache>,
}

impl PermissionService {
    pub fn new(repo: RepositoryState, cache: Arc<PermissionCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> AuthResult<()> {
        let (role, permission) = self.resolve(role_id, permission_id).await?;

        self.repo
            .assign_permission_to_role(role.id, permission.id)
            .await
            .map_err(|e| {
                tracing::error!(role_id, permission_id, error = %e, "failed to assign permission to role");
                AuthError::Internal
            })?;
        self.cache.invalidate(role.id).await;

        tracing::info!(role = %role.name, permission = %permission.name, "permission granted");
        Ok(())
    }

    pub async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> AuthResult<()> {
        let (role, permission) = self.resolve(role_id, permission_id).await?;

        self.repo
            .revoke_permission_from_role(role.id, permission.id)
            .await
            .map_err(|e| {
                tracing::error!(role_id, permission_id, error = %e, "failed to revoke permission from role");
                AuthError::Internal
            })?;
        self.cache.invalidate(role.id).await;

        tracing::info!(role = %role.name, permission = %permission.name, "permission revoked");
        Ok(())
    }

    async fn resolve(&self, role_id: RoleId, permission_id: PermissionId) -> AuthResult<(Role, Permission)> {
        let role = self
            .repo
            .find_role_by_id(role_id)
            .await
            .map_err(|e| AuthError::internal("failed to look up role", e))?
            .ok_or_else(|| AuthError::bad_request("Invalid Role ID"))?;

        let permission = self
            .repo
            .find_permission_by_id(permission_id)
            .await
            .map_err(|e| AuthError::internal("failed to look up permission", e))?
            .ok_or_else(|| AuthError::bad_request("Invalid Permission ID"))?;

        Ok((role, permission))
    }
}
