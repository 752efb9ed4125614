//! Role graph storage
//!
//! The guard only ever reads administrative data through [`RoleGraphStore`].
//! Reassignment additionally needs the single-row compare-and-set offered by
//! [`RoleAssignmentStore`].

use crate::error::Result;
use crate::types::{Permission, Role, RoleId};
use async_trait::async_trait;

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRoleStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRoleStore;

/// Read-only query interface over roles, grants and inheritance edges
#[async_trait]
pub trait RoleGraphStore: Send + Sync {
    /// Role currently assigned to the user, `None` if the user does not exist
    /// or has no role
    async fn user_role(&self, user_id: &str) -> Result<Option<RoleId>>;

    /// Role by id
    async fn role(&self, role_id: RoleId) -> Result<Option<Role>>;

    /// Permissions granted directly to the role
    async fn role_grants(&self, role_id: RoleId) -> Result<Vec<Permission>>;

    /// Roles the given role inherits from (edges where it is the child)
    async fn parent_roles(&self, role_id: RoleId) -> Result<Vec<RoleId>>;

    /// Ids of every role
    async fn role_ids(&self) -> Result<Vec<RoleId>>;

    /// Counter bumped by every write to roles, permissions, grants or edges
    async fn graph_version(&self) -> Result<u64>;
}

/// Store that can also reassign a user's role
#[async_trait]
pub trait RoleAssignmentStore: RoleGraphStore {
    /// Set the user's role to `new_role` only if it is still `expected`.
    ///
    /// Returns `false` without writing when the row changed underneath.
    async fn compare_and_set_user_role(
        &self,
        user_id: &str,
        expected: RoleId,
        new_role: RoleId,
    ) -> Result<bool>;
}
