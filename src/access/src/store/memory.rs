//! In-memory role graph store

use super::{RoleAssignmentStore, RoleGraphStore};
use crate::error::{AccessError, Result};
use crate::seed::RoleGraphSeed;
use crate::types::{Permission, PermissionId, Role, RoleId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct RoleGraphData {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    /// role -> directly granted permissions, in grant order
    grants: HashMap<RoleId, Vec<PermissionId>>,
    /// child -> parents
    parents: HashMap<RoleId, Vec<RoleId>>,
    users: HashMap<UserId, RoleId>,
    version: u64,
}

impl RoleGraphData {
    fn require_role(&self, role_id: RoleId) -> Result<()> {
        if self.roles.contains_key(&role_id) {
            Ok(())
        } else {
            Err(AccessError::NotFound(format!("role {}", role_id)))
        }
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}

/// In-memory role graph store.
///
/// Every administrative write bumps the graph version under the same write
/// lock that applies it, so readers observe version and data together.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleStore {
    data: Arc<RwLock<RoleGraphData>>,
}

impl InMemoryRoleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Import rows as-is.
    ///
    /// No referential checks are made, so a dump with dangling edges or
    /// grants is loaded faithfully and surfaces later as a resolver error.
    pub fn from_seed(seed: RoleGraphSeed) -> Self {
        let mut data = RoleGraphData::default();

        for role in seed.roles {
            data.roles.insert(role.id, role);
        }
        for permission in seed.permissions {
            data.permissions.insert(permission.id, permission);
        }
        for grant in seed.role_permissions {
            let grants = data.grants.entry(grant.role_id).or_default();
            if !grants.contains(&grant.permission_id) {
                grants.push(grant.permission_id);
            }
        }
        for edge in seed.hierarchy {
            let parents = data.parents.entry(edge.child_role_id).or_default();
            if !parents.contains(&edge.parent_role_id) {
                parents.push(edge.parent_role_id);
            }
        }
        for user in seed.users {
            data.users.insert(user.id, user.role_id);
        }

        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Insert or replace a role
    pub async fn upsert_role(&self, role: Role) -> Result<()> {
        if role.name.trim().is_empty() {
            return Err(AccessError::InvalidInput("role name cannot be empty".to_string()));
        }

        let mut data = self.data.write().await;
        if data.roles.values().any(|r| r.name == role.name && r.id != role.id) {
            return Err(AccessError::InvalidInput(format!(
                "role name '{}' is already taken",
                role.name
            )));
        }

        data.roles.insert(role.id, role);
        data.bump();
        Ok(())
    }

    /// Insert or replace a permission
    pub async fn upsert_permission(&self, permission: Permission) -> Result<()> {
        if permission.name.trim().is_empty() {
            return Err(AccessError::InvalidInput(
                "permission name cannot be empty".to_string(),
            ));
        }

        let mut data = self.data.write().await;
        if data
            .permissions
            .values()
            .any(|p| p.name == permission.name && p.id != permission.id)
        {
            return Err(AccessError::InvalidInput(format!(
                "permission name '{}' is already taken",
                permission.name
            )));
        }

        data.permissions.insert(permission.id, permission);
        data.bump();
        Ok(())
    }

    /// Grant a permission directly to a role
    pub async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        let mut data = self.data.write().await;
        data.require_role(role_id)?;
        if !data.permissions.contains_key(&permission_id) {
            return Err(AccessError::NotFound(format!("permission {}", permission_id)));
        }

        let grants = data.grants.entry(role_id).or_default();
        if !grants.contains(&permission_id) {
            grants.push(permission_id);
        }
        data.bump();
        Ok(())
    }

    /// Remove a direct grant
    pub async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        let mut data = self.data.write().await;
        if let Some(grants) = data.grants.get_mut(&role_id) {
            grants.retain(|p| *p != permission_id);
        }
        data.bump();
        Ok(())
    }

    /// Make `child_role_id` inherit from `parent_role_id`.
    ///
    /// Cycles are not rejected here; resolution is cycle-safe.
    pub async fn add_inheritance(&self, parent_role_id: RoleId, child_role_id: RoleId) -> Result<()> {
        if parent_role_id == child_role_id {
            return Err(AccessError::InvalidInput(format!(
                "role {} cannot inherit from itself",
                child_role_id
            )));
        }

        let mut data = self.data.write().await;
        data.require_role(parent_role_id)?;
        data.require_role(child_role_id)?;

        let parents = data.parents.entry(child_role_id).or_default();
        if !parents.contains(&parent_role_id) {
            parents.push(parent_role_id);
        }
        data.bump();
        Ok(())
    }

    /// Remove an inheritance edge
    pub async fn remove_inheritance(&self, parent_role_id: RoleId, child_role_id: RoleId) -> Result<()> {
        let mut data = self.data.write().await;
        if let Some(parents) = data.parents.get_mut(&child_role_id) {
            parents.retain(|p| *p != parent_role_id);
        }
        data.bump();
        Ok(())
    }

    /// Delete a role together with its grants and edges.
    ///
    /// Users still assigned to it keep the stale reference and fail to
    /// resolve until they are reassigned.
    pub async fn remove_role(&self, role_id: RoleId) -> Result<()> {
        let mut data = self.data.write().await;
        data.require_role(role_id)?;

        data.roles.remove(&role_id);
        data.grants.remove(&role_id);
        data.parents.remove(&role_id);
        for parents in data.parents.values_mut() {
            parents.retain(|p| *p != role_id);
        }
        data.bump();
        Ok(())
    }

    /// Create or overwrite a user's assignment
    pub async fn put_user(&self, user_id: impl Into<UserId>, role_id: RoleId) -> Result<()> {
        let mut data = self.data.write().await;
        data.require_role(role_id)?;
        data.users.insert(user_id.into(), role_id);
        Ok(())
    }

    /// Number of stored roles
    pub async fn role_count(&self) -> usize {
        self.data.read().await.roles.len()
    }
}

#[async_trait]
impl RoleGraphStore for InMemoryRoleStore {
    async fn user_role(&self, user_id: &str) -> Result<Option<RoleId>> {
        let data = self.data.read().await;
        Ok(data.users.get(user_id).copied())
    }

    async fn role(&self, role_id: RoleId) -> Result<Option<Role>> {
        let data = self.data.read().await;
        Ok(data.roles.get(&role_id).cloned())
    }

    async fn role_grants(&self, role_id: RoleId) -> Result<Vec<Permission>> {
        let data = self.data.read().await;
        let Some(grants) = data.grants.get(&role_id) else {
            return Ok(Vec::new());
        };

        grants
            .iter()
            .map(|permission_id| {
                data.permissions.get(permission_id).cloned().ok_or_else(|| {
                    AccessError::DataIntegrity(format!(
                        "role {} is granted missing permission {}",
                        role_id, permission_id
                    ))
                })
            })
            .collect()
    }

    async fn parent_roles(&self, role_id: RoleId) -> Result<Vec<RoleId>> {
        let data = self.data.read().await;
        Ok(data.parents.get(&role_id).cloned().unwrap_or_default())
    }

    async fn role_ids(&self) -> Result<Vec<RoleId>> {
        let data = self.data.read().await;
        let mut ids: Vec<RoleId> = data.roles.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn graph_version(&self) -> Result<u64> {
        Ok(self.data.read().await.version)
    }
}

#[async_trait]
impl RoleAssignmentStore for InMemoryRoleStore {
    async fn compare_and_set_user_role(
        &self,
        user_id: &str,
        expected: RoleId,
        new_role: RoleId,
    ) -> Result<bool> {
        let mut data = self.data.write().await;
        data.require_role(new_role)?;

        match data.users.get_mut(user_id) {
            Some(current) if *current == expected => {
                *current = new_role;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AccessError::NotFound(format!("user {}", user_id))),
        }
    }
}
