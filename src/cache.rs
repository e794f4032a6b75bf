use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::{
    error::{AuthError, AuthResult},
    models::RoleId,
    repository::RepositoryState,
};

type PermissionSet = Arc<HashSet<String>>;

/// PermissionCache
///
/// Per-role set of permission names, filled lazily from the store on first use.
///
/// Locking:
/// - `entries` is only ever locked for a map read or a single insert/remove, never across
///   a store call.
/// - Fills for the same role are serialized by a per-role async gate. A caller that waited
///   on the gate re-checks `entries` first and reuses the result of the fill ahead of it,
///   so concurrent misses for one role cost one store round-trip. Fills for different roles
///   do not contend.
/// - A failed store lookup caches nothing.
///
/// Owned by the composition root (`AppState`) and shared by `Arc`.
pub struct PermissionCache {
    repo: RepositoryState,
    entries: RwLock<HashMap<RoleId, PermissionSet>>,
    fills: Mutex<HashMap<RoleId, Arc<tokio::sync::Mutex<()>>>>,
}

impl PermissionCache {
    pub fn new(repo: RepositoryState) -> Self {
        Self {
            repo,
            entries: RwLock::new(HashMap::new()),
            fills: Mutex::new(HashMap::new()),
        }
    }

    /// has_permission
    ///
    /// Exact, case-sensitive membership test of `permission` in the role's set.
    /// Only a cache miss touches the store; a store failure surfaces as `Internal`.
    pub async fn has_permission(&self, role_id: RoleId, permission: &str) -> AuthResult<bool> {
        if let Some(set) = self.cached(role_id) {
            return Ok(set.contains(permission));
        }
        let set = self.fill(role_id).await?;
        Ok(set.contains(permission))
    }

    /// Drops the cached set for `role_id` so the next check reloads it from the store.
    ///
    /// Waits for any fill of the same role that is in flight, so a fill that read the store
    /// before the change cannot land after the invalidation.
    pub async fn invalidate(&self, role_id: RoleId) {
        let gate = self.gate(role_id);
        {
            let _fill = gate.lock().await;
            if self.entries.write().remove(&role_id).is_some() {
                tracing::info!(role_id, "invalidated permission cache for role");
            }
        }
        self.release_gate(role_id, gate);
    }

    /// Drops every cached set. Fills already in flight may still repopulate their role.
    pub fn clear(&self) {
        self.entries.write().clear();
        tracing::info!("cleared permission cache");
    }

    /// Number of roles currently cached.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of roles with a fill or an invalidation currently in progress.
    pub fn in_flight(&self) -> usize {
        self.fills.lock().len()
    }

    fn cached(&self, role_id: RoleId) -> Option<PermissionSet> {
        self.entries.read().get(&role_id).cloned()
    }

    fn gate(&self, role_id: RoleId) -> Arc<tokio::sync::Mutex<()>> {
        self.fills.lock().entry(role_id).or_default().clone()
    }

    /// Drops the role's gate once no other caller holds or waits on it. Gates are only
    /// cloned under the `fills` lock, so a count of two (map + ours) cannot grow meanwhile.
    fn release_gate(&self, role_id: RoleId, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut fills = self.fills.lock();
        let idle = fills
            .get(&role_id)
            .is_some_and(|current| Arc::ptr_eq(current, &gate) && Arc::strong_count(&gate) == 2);
        if idle {
            fills.remove(&role_id);
        }
    }

    async fn fill(&self, role_id: RoleId) -> AuthResult<PermissionSet> {
        let gate = self.gate(role_id);
        let result = {
            let _fill = gate.lock().await;
            self.load(role_id).await
        };
        self.release_gate(role_id, gate);
        result
    }

    /// Runs under the role's gate.
    async fn load(&self, role_id: RoleId) -> AuthResult<PermissionSet> {
        if let Some(set) = self.cached(role_id) {
            return Ok(set);
        }

        let permissions = self
            .repo
            .find_permissions_by_role_id(role_id)
            .await
            .map_err(|e| {
                tracing::error!(role_id, error = %e, "failed to load permissions for role");
                AuthError::Internal
            })?;

        let set: PermissionSet = Arc::new(permissions.into_iter().map(|p| p.name).collect());
        self.entries.write().insert(role_id, Arc::clone(&set));
        tracing::info!(role_id, count = set.len(), "loaded permissions into cache for role");
        Ok(set)
    }
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("cached_roles", &self.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
