//! Separation of duty
//!
//! A [`SeparationPolicy`] lists unordered pairs of roles that must never be
//! held together. Static pairs constrain what a user may be assigned; dynamic
//! pairs constrain the roles active in one session. With a single assigned
//! role per user the active set is the resolved set, but the two lists and
//! their entry points stay separate.

use crate::error::{AccessError, Result};
use crate::graph::RoleGraph;
use crate::resolver::{expand, PermissionResolver};
use crate::types::{ResolvedPermissionSet, RoleId, RoleName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which list a conflicting pair comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Never assignable together
    Static,
    /// Never active together in a session
    Dynamic,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Static => write!(f, "static"),
            ConstraintKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Unordered pair of mutually exclusive role names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictConstraint(pub RoleName, pub RoleName);

impl ConflictConstraint {
    /// Create a new pair
    pub fn new(a: impl Into<RoleName>, b: impl Into<RoleName>) -> Self {
        Self(a.into(), b.into())
    }

    /// Whether the pair names the role
    pub fn involves(&self, role: &str) -> bool {
        self.0 == role || self.1 == role
    }

    /// Whether a role set holds both sides of the pair
    pub fn violated_by(&self, roles: &BTreeSet<RoleName>) -> bool {
        roles.contains(&self.0) && roles.contains(&self.1)
    }
}

impl fmt::Display for ConflictConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Configured conflicting role pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparationPolicy {
    #[serde(rename = "static", default = "default_static_pairs")]
    pub static_pairs: Vec<ConflictConstraint>,

    #[serde(rename = "dynamic", default = "default_dynamic_pairs")]
    pub dynamic_pairs: Vec<ConflictConstraint>,
}

fn default_static_pairs() -> Vec<ConflictConstraint> {
    vec![ConflictConstraint::new("MODERATOR", "ADMIN")]
}

fn default_dynamic_pairs() -> Vec<ConflictConstraint> {
    vec![ConflictConstraint::new("USER", "MEMBER")]
}

impl Default for SeparationPolicy {
    fn default() -> Self {
        Self {
            static_pairs: default_static_pairs(),
            dynamic_pairs: default_dynamic_pairs(),
        }
    }
}

impl SeparationPolicy {
    /// Create a policy from explicit pairs
    pub fn new(static_pairs: Vec<ConflictConstraint>, dynamic_pairs: Vec<ConflictConstraint>) -> Self {
        Self {
            static_pairs,
            dynamic_pairs,
        }
    }

    /// Policy without any pairs
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Pairs of one kind
    pub fn pairs(&self, kind: ConstraintKind) -> &[ConflictConstraint] {
        match kind {
            ConstraintKind::Static => &self.static_pairs,
            ConstraintKind::Dynamic => &self.dynamic_pairs,
        }
    }

    /// Reject empty names and pairs of a role with itself
    pub fn validate(&self) -> Result<()> {
        for kind in [ConstraintKind::Static, ConstraintKind::Dynamic] {
            for pair in self.pairs(kind) {
                if pair.0.trim().is_empty() || pair.1.trim().is_empty() {
                    return Err(AccessError::InvalidConfig(format!(
                        "{} conflict pair {} has an empty role name",
                        kind, pair
                    )));
                }
                if pair.0 == pair.1 {
                    return Err(AccessError::InvalidConfig(format!(
                        "{} conflict pair {} names the same role twice",
                        kind, pair
                    )));
                }
            }
        }
        Ok(())
    }

    /// At most one role of every static pair is present
    pub fn validate_static(&self, roles: &BTreeSet<RoleName>) -> bool {
        self.first_violation(ConstraintKind::Static, roles).is_none()
    }

    /// At most one role of every dynamic pair is active
    pub fn validate_dynamic(&self, active_roles: &BTreeSet<RoleName>) -> bool {
        self.first_violation(ConstraintKind::Dynamic, active_roles).is_none()
    }

    /// First configured pair of `kind` the role set holds both sides of
    pub fn first_violation(&self, kind: ConstraintKind, roles: &BTreeSet<RoleName>) -> Option<&ConflictConstraint> {
        self.pairs(kind).iter().find(|pair| pair.violated_by(roles))
    }

    /// Static check followed by the dynamic check on a session's roles
    pub fn check_session(&self, resolved: &ResolvedPermissionSet) -> Option<(ConstraintKind, &ConflictConstraint)> {
        [ConstraintKind::Static, ConstraintKind::Dynamic]
            .into_iter()
            .find_map(|kind| self.first_violation(kind, &resolved.roles).map(|pair| (kind, pair)))
    }

    /// Roles whose own closure already violates a pair.
    ///
    /// A user assigned one of these roles is denied every gated operation.
    pub fn audit(&self, graph: &RoleGraph) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        for node in graph.nodes() {
            let Ok(resolved) = expand(graph, node.role.id) else {
                continue;
            };
            if let Some((kind, pair)) = self.check_session(&resolved) {
                violations.push(PolicyViolation {
                    role: node.role.name.clone(),
                    kind,
                    constraint: pair.clone(),
                });
            }
        }

        violations.sort_by(|a, b| a.role.cmp(&b.role));
        violations
    }
}

/// A role that can never pass a separation check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub role: RoleName,
    pub kind: ConstraintKind,
    pub constraint: ConflictConstraint,
}

/// Checks role assignments against the static pairs before they are written
#[derive(Clone)]
pub struct DutySeparationValidator {
    resolver: PermissionResolver,
    policy: Arc<SeparationPolicy>,
}

impl DutySeparationValidator {
    /// Create a validator
    pub fn new(resolver: PermissionResolver, policy: Arc<SeparationPolicy>) -> Self {
        Self { resolver, policy }
    }

    /// Configured pairs
    pub fn policy(&self) -> &SeparationPolicy {
        &self.policy
    }

    /// Check whether `candidate` may become the user's role.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user or the candidate role does not exist
    /// - `Conflict` naming the static pair the reassignment would combine
    pub async fn validate_assignment(&self, user_id: &str, candidate: RoleId) -> Result<()> {
        let current = self
            .resolver
            .store()
            .user_role(user_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("user {}", user_id)))?;

        self.validate_transition(current, candidate).await
    }

    /// Check a move from `current` to `candidate`.
    ///
    /// The hypothetical role set is the union of both closures, so the check
    /// is symmetric in the two roles.
    pub async fn validate_transition(&self, current: RoleId, candidate: RoleId) -> Result<()> {
        let candidate_set = self.resolver.resolve_role(candidate).await?;

        let mut hypothetical = candidate_set.roles.clone();
        match self.resolver.resolve_role(current).await {
            Ok(current_set) => hypothetical.extend(current_set.roles),
            Err(AccessError::NotFound(_)) => {
                warn!(current, candidate, "Current role no longer exists, checking candidate alone");
            }
            Err(e) => return Err(e),
        }

        if let Some(pair) = self.policy.first_violation(ConstraintKind::Static, &hypothetical) {
            debug!(current, candidate, constraint = %pair, "Assignment rejected");
            return Err(AccessError::Conflict(format!(
                "role {} conflicts with the current role under static pair {}",
                candidate, pair
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> BTreeSet<RoleName> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_static_pair() {
        let policy = SeparationPolicy::new(vec![ConflictConstraint::new("A", "B")], vec![]);

        assert!(!policy.validate_static(&roles(&["A", "B"])));
        assert!(policy.validate_static(&roles(&["A"])));
        assert!(policy.validate_static(&roles(&["B", "C"])));
        assert!(policy.validate_static(&roles(&[])));
    }

    #[test]
    fn test_pair_is_unordered() {
        let pair = ConflictConstraint::new("B", "A");
        assert!(pair.violated_by(&roles(&["A", "B"])));
        assert!(pair.involves("A"));
        assert!(!pair.involves("C"));
    }

    #[test]
    fn test_kinds_are_separate() {
        let policy = SeparationPolicy::new(vec![], vec![ConflictConstraint::new("A", "B")]);
        let both = roles(&["A", "B"]);

        assert!(policy.validate_static(&both));
        assert!(!policy.validate_dynamic(&both));
    }

    #[test]
    fn test_self_pair_rejected() {
        let policy = SeparationPolicy::new(vec![ConflictConstraint::new("A", "A")], vec![]);
        assert!(matches!(policy.validate(), Err(AccessError::InvalidConfig(_))));

        assert!(SeparationPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_display() {
        let pair = ConflictConstraint::new("MODERATOR", "ADMIN");
        assert_eq!(pair.to_string(), "(MODERATOR, ADMIN)");
        assert_eq!(ConstraintKind::Dynamic.to_string(), "dynamic");
    }
}
