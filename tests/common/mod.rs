#![allow(dead_code)]

use async_trait::async_trait;
use authz_core::{
    Repository,
    models::{Account, AccountId, NewAccount, Permission, PermissionId, Role, RoleId},
    repository::{RepositoryError, RepositoryResult},
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

// --- In-Memory Repository shared by the test suites ---

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    next_account_id: AccountId,
}

impl Tables {
    fn insert_account(&mut self, username: &str, password_hash: &str, role_id: RoleId) -> Account {
        self.next_account_id += 1;
        let now = Utc::now();
        let account = Account {
            id: self.next_account_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role_id,
            role_name: None,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(account.id, account.clone());
        account
    }

    fn with_role_name(&self, mut account: Account) -> Account {
        account.role_name = self.roles.get(&account.role_id).map(|r| r.name.clone());
        account
    }
}

/// InMemoryRepository
///
/// A `Repository` held in process memory so services and handlers run without Postgres.
/// Supports failure injection and counts permission lookups so cache behaviour can be
/// asserted.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    /// When true, every operation fails like an unreachable database.
    should_fail: AtomicBool,
    permission_lookups: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Number of `find_permissions_by_role_id` calls served so far, failed ones included.
    pub fn permission_lookups(&self) -> usize {
        self.permission_lookups.load(Ordering::SeqCst)
    }

    pub fn insert_role(&self, id: RoleId, name: &str) {
        self.tables.write().roles.insert(
            id,
            Role {
                id,
                name: name.to_string(),
            },
        );
    }

    pub fn remove_role(&self, id: RoleId) {
        self.tables.write().roles.remove(&id);
    }

    pub fn insert_permission(&self, id: PermissionId, name: &str) {
        self.tables.write().permissions.insert(
            id,
            Permission {
                id,
                name: name.to_string(),
                description: None,
            },
        );
    }

    /// Seeds an account with an already-hashed password and returns it.
    pub fn insert_account(&self, username: &str, password_hash: &str, role_id: RoleId) -> Account {
        self.tables
            .write()
            .insert_account(username, password_hash, role_id)
    }

    pub fn delete_account(&self, id: AccountId) {
        self.tables.write().accounts.remove(&id);
    }

    pub fn set_account_role(&self, id: AccountId, role_id: RoleId) {
        if let Some(account) = self.tables.write().accounts.get_mut(&id) {
            account.role_id = role_id;
            account.updated_at = Utc::now();
        }
    }

    fn check(&self) -> RepositoryResult<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_account_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned()
            .map(|a| tables.with_role_name(a)))
    }

    async fn find_account_by_id(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .accounts
            .get(&id)
            .cloned()
            .map(|a| tables.with_role_name(a)))
    }

    /// Uniqueness check and insert happen under one write lock, like a unique index.
    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Account> {
        self.check()?;
        let mut tables = self.tables.write();
        if tables
            .accounts
            .values()
            .any(|a| a.username == account.username)
        {
            return Err(RepositoryError::Conflict(format!(
                "duplicate username {}",
                account.username
            )));
        }
        Ok(tables.insert_account(&account.username, &account.password_hash, account.role_id))
    }

    async fn find_role_by_id(&self, id: RoleId) -> RepositoryResult<Option<Role>> {
        self.check()?;
        Ok(self.tables.read().roles.get(&id).cloned())
    }

    async fn find_permission_by_id(&self, id: PermissionId) -> RepositoryResult<Option<Permission>> {
        self.check()?;
        Ok(self.tables.read().permissions.get(&id).cloned())
    }

    async fn find_permissions_by_role_id(&self, role_id: RoleId) -> RepositoryResult<Vec<Permission>> {
        self.permission_lookups.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let tables = self.tables.read();
        Ok(tables
            .role_permissions
            .range((role_id, PermissionId::MIN)..=(role_id, PermissionId::MAX))
            .filter_map(|(_, pid)| tables.permissions.get(pid).cloned())
            .collect())
    }

    async fn assign_permission_to_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()> {
        self.check()?;
        self.tables
            .write()
            .role_permissions
            .insert((role_id, permission_id));
        Ok(())
    }

    async fn revoke_permission_from_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()> {
        self.check()?;
        self.tables
            .write()
            .role_permissions
            .remove(&(role_id, permission_id));
        Ok(())
    }
}
