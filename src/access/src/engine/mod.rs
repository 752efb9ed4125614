//! Access decision engine
//!
//! Orchestrates identity, permission resolution, separation of duty and the
//! operation's required permissions into a single [`Decision`].
//!
//! # Protocol
//!
//! ```text
//! identity? ──no──> Optional & no permissions ? Allow : DenyUnauthenticated
//!    │yes
//!    ▼
//! no permissions required ──> Allow
//!    │
//!    ▼
//! PermissionResolver ──error──> DenyUnauthenticated (fail closed)
//!    │
//!    ▼
//! static pairs ─> dynamic pairs ──violated──> DenyConflict
//!    │
//!    ▼
//! all required permissions held ? Allow : DenyInsufficientPermission
//! ```
//!
//! The conflict checks run on every gated request and take precedence over
//! the permission check, so a user in a conflicting state is denied even for
//! operations their permissions would cover.

pub mod decision;
pub mod metrics;

pub use decision::{AuthMode, Decision, Requirement, UnauthenticatedReason};
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::config::AccessConfig;
use crate::error::{AccessError, Result};
use crate::identity::Identity;
use crate::resolver::PermissionResolver;
use crate::separation::SeparationPolicy;
use crate::store::RoleGraphStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Access decision engine
///
/// # Thread Safety
///
/// `authorize` takes `&self` and holds no lock across the store calls;
/// share the engine with `Arc` or clone it.
#[derive(Clone)]
pub struct AccessEngine {
    resolver: PermissionResolver,
    policy: Arc<SeparationPolicy>,
    metrics: Option<MetricsCollector>,
}

impl AccessEngine {
    /// Create an engine over a store
    pub fn new(store: Arc<dyn RoleGraphStore>, config: AccessConfig) -> Result<Self> {
        config.validate()?;

        let resolver = PermissionResolver::with_config(store, config.resolver);
        let mut engine = Self::with_resolver(resolver, Arc::new(config.separation));
        if !config.enable_metrics {
            engine.metrics = None;
        }
        Ok(engine)
    }

    /// Create an engine from an existing resolver
    pub fn with_resolver(resolver: PermissionResolver, policy: Arc<SeparationPolicy>) -> Self {
        Self {
            resolver,
            policy,
            metrics: Some(MetricsCollector::new()),
        }
    }

    /// Decide whether the caller may perform an operation.
    ///
    /// Never fails: every error on the way becomes a deny.
    pub async fn authorize(&self, identity: Option<&Identity>, requirement: &Requirement) -> Decision {
        let start = Instant::now();
        let decision = self.decide(identity, requirement).await;

        debug!(
            user_id = identity.map(|i| i.user_id.as_str()).unwrap_or("-"),
            required = requirement.permissions.len(),
            decision = decision.code(),
            "Access decision"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(&decision, start.elapsed()).await;
        }
        decision
    }

    async fn decide(&self, identity: Option<&Identity>, requirement: &Requirement) -> Decision {
        let Some(identity) = identity else {
            if requirement.allows_anonymous() {
                return Decision::Allow;
            }
            return Decision::DenyUnauthenticated {
                reason: UnauthenticatedReason::MissingIdentity,
            };
        };

        if requirement.permissions.is_empty() {
            return Decision::Allow;
        }

        let resolved = match self.resolver.resolve(&identity.user_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_resolution_error().await;
                }
                return Decision::DenyUnauthenticated {
                    reason: self.classify(&identity.user_id, &e),
                };
            }
        };

        if let Some((kind, constraint)) = self.policy.check_session(&resolved) {
            warn!(
                user_id = %identity.user_id,
                %kind,
                %constraint,
                "Denied by separation of duty"
            );
            return Decision::DenyConflict {
                kind,
                constraint: constraint.clone(),
            };
        }

        let missing = resolved.missing(&requirement.permissions);
        if !missing.is_empty() {
            return Decision::DenyInsufficientPermission { missing };
        }

        Decision::Allow
    }

    fn classify(&self, user_id: &str, err: &AccessError) -> UnauthenticatedReason {
        match err {
            AccessError::NotFound(_) => {
                warn!(user_id, error = %err, "Identity does not resolve to a role");
                UnauthenticatedReason::UnknownUser
            }
            AccessError::Store(_) => {
                error!(user_id, error = %err, "Role store failed during access check");
                UnauthenticatedReason::StoreUnavailable
            }
            _ => {
                error!(user_id, error = %err, "Role graph could not be resolved");
                UnauthenticatedReason::UnresolvableRole
            }
        }
    }

    /// Permission resolver
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Separation policy
    pub fn policy(&self) -> &Arc<SeparationPolicy> {
        &self.policy
    }

    /// Metrics collector, if enabled
    pub fn metrics(&self) -> Option<&MetricsCollector> {
        self.metrics.as_ref()
    }
}
