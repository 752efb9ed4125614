//! # Quill Access Guard
//!
//! Role-based access control with a role hierarchy and separation-of-duty
//! constraints for the Quill content platform.
//!
//! ## Features
//!
//! - **Role hierarchy** resolved to a transitive closure, cycle-safe
//! - **Separation of duty** with static (assignment) and dynamic (session)
//!   conflict pairs
//! - **Fail-closed decisions**: broken role data denies, never allows
//! - **Version-stamped snapshots** so one decision never mixes two versions
//!   of the administrative data
//! - **Serialized reassignment** with a per-user lock and compare-and-set write
//! - **PostgreSQL** and in-memory role stores
//!
//! ## Example
//!
//! ```rust
//! use quill_access::{seed, AccessConfig, AccessEngine, Identity, InMemoryRoleStore, Requirement};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryRoleStore::from_seed(seed::platform().with_user("alice", 4)));
//!     let engine = AccessEngine::new(store, AccessConfig::default())?;
//!
//!     let identity = Identity::new("alice");
//!     let decision = engine
//!         .authorize(Some(&identity), &Requirement::all(["MODERATE_ARTICLE"]))
//!         .await;
//!
//!     // ADMIN inherits MODERATOR, which the default static pair forbids
//!     assert_eq!(decision.code(), "conflict");
//!
//!     Ok(())
//! }
//! ```

pub mod assignment;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod identity;
pub mod resolver;
pub mod seed;
pub mod separation;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use assignment::{RoleAssignmentService, RoleChange};
pub use config::{AccessConfig, ResolverConfig};
pub use engine::{AccessEngine, AuthMode, Decision, Requirement, UnauthenticatedReason};
pub use error::{AccessError, Result};
pub use graph::{RoleGraph, RoleGraphBuilder};
pub use identity::{identify, Identity, IdentityVerifier, JwtVerifier};
pub use resolver::{CacheStats, PermissionResolver};
pub use separation::{ConflictConstraint, ConstraintKind, DutySeparationValidator, SeparationPolicy};
pub use store::{InMemoryRoleStore, RoleAssignmentStore, RoleGraphStore};
pub use types::{Permission, PermissionId, ResolvedPermissionSet, Role, RoleId, User, UserId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
