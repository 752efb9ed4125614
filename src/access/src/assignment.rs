//! Serialized role reassignment
//!
//! Reassigning a user's role is a read-validate-write sequence. Two guards
//! keep it from interleaving:
//!
//! - a per-user async mutex serializes reassignments made through this
//!   service, so a second request for the same user validates against the
//!   outcome of the first;
//! - the write is a compare-and-set on the user's row, so a writer outside
//!   this process that changed the role after validation makes the write
//!   fail instead of being overwritten.

use crate::error::{AccessError, Result};
use crate::resolver::PermissionResolver;
use crate::separation::{DutySeparationValidator, SeparationPolicy};
use crate::store::{RoleAssignmentStore, RoleGraphStore};
use crate::types::{RoleId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outcome of a successful reassignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    pub user_id: UserId,
    pub previous: RoleId,
    pub current: RoleId,
    pub changed_at: DateTime<Utc>,
}

/// Reassigns user roles after separation-of-duty validation
#[derive(Clone)]
pub struct RoleAssignmentService {
    store: Arc<dyn RoleAssignmentStore>,
    validator: DutySeparationValidator,
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl RoleAssignmentService {
    /// Create a service over a store and the resolver reading the same store
    pub fn new<S>(store: Arc<S>, resolver: PermissionResolver, policy: Arc<SeparationPolicy>) -> Self
    where
        S: RoleAssignmentStore + 'static,
    {
        Self {
            store,
            validator: DutySeparationValidator::new(resolver, policy),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Validator used before every write
    pub fn validator(&self) -> &DutySeparationValidator {
        &self.validator
    }

    /// Make `new_role` the user's role.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user or role does not exist
    /// - `Conflict` if the change would combine a static pair
    /// - `ConcurrentModification` if the row changed after validation;
    ///   nothing is written in that case
    pub async fn assign(&self, user_id: &str, new_role: RoleId) -> Result<RoleChange> {
        let lock = self.user_lock(user_id);
        let _guard = lock.mutex.lock().await;
        self.assign_locked(user_id, new_role).await
    }

    /// Number of users with a reassignment in flight
    pub fn pending(&self) -> usize {
        self.locks.len()
    }

    async fn assign_locked(&self, user_id: &str, new_role: RoleId) -> Result<RoleChange> {
        let current = self
            .store
            .user_role(user_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("user {}", user_id)))?;

        if self.store.role(new_role).await?.is_none() {
            return Err(AccessError::NotFound(format!("role {}", new_role)));
        }

        self.validator.validate_transition(current, new_role).await?;

        if !self
            .store
            .compare_and_set_user_role(user_id, current, new_role)
            .await?
        {
            warn!(user_id, expected = current, new_role, "Role changed during reassignment");
            return Err(AccessError::ConcurrentModification(format!(
                "role of user {} changed while reassigning",
                user_id
            )));
        }

        info!(user_id, previous = current, current = new_role, "Reassigned role");

        Ok(RoleChange {
            user_id: user_id.to_string(),
            previous: current,
            current: new_role,
            changed_at: Utc::now(),
        })
    }

    fn user_lock(&self, user_id: &str) -> UserLock {
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        UserLock {
            locks: self.locks.clone(),
            user_id: user_id.to_string(),
            mutex,
        }
    }
}

/// Handle on one user's reassignment mutex.
///
/// Dropping it, whether the reassignment completed or its future was
/// cancelled, removes the table entry once no other handle remains.
struct UserLock {
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
    user_id: UserId,
    mutex: Arc<Mutex<()>>,
}

impl Drop for UserLock {
    fn drop(&mut self) {
        // The table holds one reference and this handle the other. New
        // handles are cloned under the shard lock `remove_if` also takes.
        self.locks.remove_if(&self.user_id, |_, mutex| {
            Arc::ptr_eq(mutex, &self.mutex) && Arc::strong_count(mutex) == 2
        });
    }
}
