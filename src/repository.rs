use crate::models::{
    Account, AccountId, NewAccount, Permission, PermissionId, Role, RoleId,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

/// RepositoryError
///
/// Failure of the external store. Never shown to callers: the core logs it and answers
/// with `AuthError::Internal`. The one exception is a `Conflict` while creating an account,
/// which means the username was taken concurrently.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The account/role/permission lookups the authentication core consumes. `Ok(None)` means
/// "not found"; `Err` means the store itself failed.
///
/// **Send + Sync + async_trait** are required so `Arc<dyn Repository>` can be shared across
/// request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    async fn find_account_by_username(&self, username: &str) -> RepositoryResult<Option<Account>>;
    async fn find_account_by_id(&self, id: AccountId) -> RepositoryResult<Option<Account>>;
    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Account>;

    // --- Roles ---
    async fn find_role_by_id(&self, id: RoleId) -> RepositoryResult<Option<Role>>;

    // --- Permissions ---
    async fn find_permission_by_id(&self, id: PermissionId) -> RepositoryResult<Option<Permission>>;
    // All permissions associated with a role through `role_permissions`.
    async fn find_permissions_by_role_id(&self, role_id: RoleId) -> RepositoryResult<Vec<Permission>>;
    // Idempotent: assigning an existing association is not an error.
    async fn assign_permission_to_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()>;
    async fn revoke_permission_from_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the store across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_account_by_username
    ///
    /// Joins `roles` so the returned account already carries its role name.
    async fn find_account_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.id, a.username, a.password, a.role_id, r.name AS role_name,
                   a.created_at, a.updated_at
            FROM accounts a
            LEFT JOIN roles r ON a.role_id = r.id
            WHERE a.username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account_by_id(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.id, a.username, a.password, a.role_id, r.name AS role_name,
                   a.created_at, a.updated_at
            FROM accounts a
            LEFT JOIN roles r ON a.role_id = r.id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Account> {
        let created = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, password, role_id)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, role_id, created_at, updated_at
            "#,
        )
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            e => RepositoryError::Database(e),
        })?;
        Ok(created)
    }

    async fn find_role_by_id(&self, id: RoleId) -> RepositoryResult<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn find_permission_by_id(&self, id: PermissionId) -> RepositoryResult<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(
            "SELECT id, name, description FROM permissions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(permission)
    }

    async fn find_permissions_by_role_id(&self, role_id: RoleId) -> RepositoryResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.description
            FROM permissions p
            JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    async fn assign_permission_to_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_permission_from_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
