use async_trait::async_trait;
use authz_core::{
    AuthError, PermissionCache, Repository, RepositoryState,
    models::{Account, AccountId, NewAccount, Permission, PermissionId, Role, RoleId},
    repository::RepositoryResult,
};
use std::{sync::Arc, time::Duration};

mod common;
use common::InMemoryRepository;

// --- Helpers ---

const FINANCE: RoleId = 2;
const SUPPORT: RoleId = 3;

/// Store with finance -> {invoice:read, invoice:approve} and support -> {ticket:read}.
async fn seeded_repo() -> Arc<InMemoryRepository> {
    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_role(FINANCE, "finance");
    repo.insert_role(SUPPORT, "support");
    repo.insert_permission(10, "invoice:read");
    repo.insert_permission(11, "invoice:approve");
    repo.insert_permission(20, "ticket:read");
    repo.assign_permission_to_role(FINANCE, 10).await.unwrap();
    repo.assign_permission_to_role(FINANCE, 11).await.unwrap();
    repo.assign_permission_to_role(SUPPORT, 20).await.unwrap();
    repo
}

/// Delays every permission lookup so concurrent misses overlap.
struct SlowRepo(Arc<InMemoryRepository>);

#[async_trait]
impl Repository for SlowRepo {
    async fn find_account_by_username(&self, username: &str) -> RepositoryResult<Option<Account>> {
        self.0.find_account_by_username(username).await
    }
    async fn find_account_by_id(&self, id: AccountId) -> RepositoryResult<Option<Account>> {
        self.0.find_account_by_id(id).await
    }
    async fn create_account(&self, account: NewAccount) -> RepositoryResult<Account> {
        self.0.create_account(account).await
    }
    async fn find_role_by_id(&self, id: RoleId) -> RepositoryResult<Option<Role>> {
        self.0.find_role_by_id(id).await
    }
    async fn find_permission_by_id(&self, id: PermissionId) -> RepositoryResult<Option<Permission>> {
        self.0.find_permission_by_id(id).await
    }
    async fn find_permissions_by_role_id(&self, role_id: RoleId) -> RepositoryResult<Vec<Permission>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.0.find_permissions_by_role_id(role_id).await
    }
    async fn assign_permission_to_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()> {
        self.0.assign_permission_to_role(role_id, permission_id).await
    }
    async fn revoke_permission_from_role(&self, role_id: RoleId, permission_id: PermissionId) -> RepositoryResult<()> {
        self.0.revoke_permission_from_role(role_id, permission_id).await
    }
}

// --- Lookup ---

#[tokio::test]
async fn test_first_check_loads_then_serves_from_memory() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    assert!(cache.has_permission(FINANCE, "invoice:read").await.unwrap());
    assert!(cache.has_permission(FINANCE, "invoice:approve").await.unwrap());
    assert!(!cache.has_permission(FINANCE, "ticket:read").await.unwrap());

    assert_eq!(repo.permission_lookups(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_match_is_exact_and_case_sensitive() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo as RepositoryState);

    assert!(!cache.has_permission(FINANCE, "Invoice:Read").await.unwrap());
    assert!(!cache.has_permission(FINANCE, "invoice").await.unwrap());
    assert!(!cache.has_permission(FINANCE, "invoice:*").await.unwrap());
    assert!(!cache.has_permission(FINANCE, "").await.unwrap());
}

#[tokio::test]
async fn test_role_without_permissions_is_cached_as_empty() {
    let repo = seeded_repo().await;
    repo.insert_role(4, "guest");
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    assert!(!cache.has_permission(4, "invoice:read").await.unwrap());
    assert!(!cache.has_permission(4, "ticket:read").await.unwrap());

    assert_eq!(repo.permission_lookups(), 1);
}

#[tokio::test]
async fn test_roles_are_cached_independently() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    assert!(cache.has_permission(FINANCE, "invoice:read").await.unwrap());
    assert!(cache.has_permission(SUPPORT, "ticket:read").await.unwrap());
    assert!(!cache.has_permission(SUPPORT, "invoice:read").await.unwrap());

    assert_eq!(repo.permission_lookups(), 2);
    assert_eq!(cache.len(), 2);
}

// --- Failure ---

#[tokio::test]
async fn test_store_failure_is_internal_and_not_cached() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    repo.set_failing(true);
    let result = cache.has_permission(FINANCE, "invoice:read").await;
    assert_eq!(result.unwrap_err(), AuthError::Internal);
    assert!(cache.is_empty());

    repo.set_failing(false);
    assert!(cache.has_permission(FINANCE, "invoice:read").await.unwrap());
    assert_eq!(repo.permission_lookups(), 2);
}

// --- Invalidation ---

#[tokio::test]
async fn test_invalidate_forces_a_reload() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    assert!(cache.has_permission(FINANCE, "invoice:approve").await.unwrap());

    repo.revoke_permission_from_role(FINANCE, 11).await.unwrap();
    // Stale until invalidated.
    assert!(cache.has_permission(FINANCE, "invoice:approve").await.unwrap());

    cache.invalidate(FINANCE).await;
    assert!(!cache.has_permission(FINANCE, "invoice:approve").await.unwrap());
    assert_eq!(repo.permission_lookups(), 2);
}

#[tokio::test]
async fn test_invalidate_leaves_other_roles_alone() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    cache.has_permission(FINANCE, "invoice:read").await.unwrap();
    cache.has_permission(SUPPORT, "ticket:read").await.unwrap();

    cache.invalidate(FINANCE).await;
    assert_eq!(cache.len(), 1);

    cache.has_permission(SUPPORT, "ticket:read").await.unwrap();
    assert_eq!(repo.permission_lookups(), 2);
}

#[tokio::test]
async fn test_clear_drops_every_role() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    cache.has_permission(FINANCE, "invoice:read").await.unwrap();
    cache.has_permission(SUPPORT, "ticket:read").await.unwrap();
    cache.clear();

    assert!(cache.is_empty());
    cache.has_permission(FINANCE, "invoice:read").await.unwrap();
    assert_eq!(repo.permission_lookups(), 3);
}

// --- Concurrency ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_for_one_role_hit_the_store_once() {
    let inner = seeded_repo().await;
    let cache = Arc::new(PermissionCache::new(
        Arc::new(SlowRepo(inner.clone())) as RepositoryState
    ));

    let checks: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.has_permission(FINANCE, "invoice:read").await })
        })
        .collect();

    for check in checks {
        assert!(check.await.unwrap().unwrap());
    }
    assert_eq!(inner.permission_lookups(), 1);
    assert_eq!(cache.in_flight(), 0);
}

#[tokio::test]
async fn test_fill_gates_do_not_accumulate() {
    let repo = seeded_repo().await;
    let cache = PermissionCache::new(repo.clone() as RepositoryState);

    for role_id in 100..164 {
        assert!(!cache.has_permission(role_id, "invoice:read").await.unwrap());
    }
    assert_eq!(cache.len(), 64);
    assert_eq!(cache.in_flight(), 0);

    cache.invalidate(FINANCE).await;
    cache.invalidate(SUPPORT).await;
    assert_eq!(cache.in_flight(), 0);

    repo.set_failing(true);
    assert!(cache.has_permission(FINANCE, "invoice:read").await.is_err());
    assert_eq!(cache.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_see_consistent_answers() {
    let inner = seeded_repo().await;
    let cache = Arc::new(PermissionCache::new(
        Arc::new(SlowRepo(inner.clone())) as RepositoryState
    ));

    let checks: Vec<_> = (0..32)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    cache.has_permission(FINANCE, "invoice:read").await
                } else {
                    cache.has_permission(SUPPORT, "invoice:read").await.map(|b| !b)
                }
            })
        })
        .collect();

    for check in checks {
        assert!(check.await.unwrap().unwrap());
    }
    assert_eq!(inner.permission_lookups(), 2);
}
