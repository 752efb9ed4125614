//! Core role graph types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role identifier
pub type RoleId = i64;

/// Permission identifier
pub type PermissionId = i64;

/// User identifier
pub type UserId = String;

/// Unique, human-readable role name (e.g. "ADMIN")
pub type RoleName = String;

/// Unique permission name (e.g. "DELETE_COMMENT")
pub type PermissionName = String;

/// Named bundle of privilege
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier
    pub id: RoleId,

    /// Unique role name
    pub name: RoleName,

    /// Human description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Role {
    /// Create a new role
    pub fn new(id: RoleId, name: impl Into<RoleName>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Atomic capability guarding one class of action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Permission identifier
    pub id: PermissionId,

    /// Unique permission name
    pub name: PermissionName,

    /// Human description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    /// Create a new permission
    pub fn new(id: PermissionId, name: impl Into<PermissionName>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Direct grant of a permission to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

/// Inheritance edge: the child role inherits everything the parent grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleHierarchy {
    pub parent_role_id: RoleId,
    pub child_role_id: RoleId,
}

/// A user holds exactly one assigned role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub role_id: RoleId,
}

/// Transitive closure of the roles and permissions reachable from one role.
///
/// Computed per check, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPermissionSet {
    /// Role the resolution started from
    pub root: RoleId,

    /// Every role reached through inheritance, including the root
    pub roles: BTreeSet<RoleName>,

    /// Union of the permissions granted by `roles`
    pub permissions: BTreeSet<PermissionName>,

    /// Administrative graph version the set was computed from
    pub graph_version: u64,
}

impl ResolvedPermissionSet {
    /// Whether the closure contains the role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the closure grants the permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Required permissions absent from the closure
    pub fn missing<'a, I>(&self, required: I) -> BTreeSet<PermissionName>
    where
        I: IntoIterator<Item = &'a PermissionName>,
    {
        required
            .into_iter()
            .filter(|p| !self.permissions.contains(p.as_str()))
            .cloned()
            .collect()
    }
}
