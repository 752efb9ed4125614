//! Access decision types

use crate::separation::{ConflictConstraint, ConstraintKind};
use crate::types::PermissionName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Whether an operation accepts anonymous callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Identity must be established
    #[default]
    Required,
    /// Anonymous callers pass when no permission is required
    Optional,
}

/// What an operation demands of its caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Every one of these must be held
    #[serde(default)]
    pub permissions: BTreeSet<PermissionName>,

    #[serde(default)]
    pub mode: AuthMode,
}

impl Requirement {
    /// Identity required, no permissions
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Anonymous callers allowed, no permissions
    pub fn optional() -> Self {
        Self {
            permissions: BTreeSet::new(),
            mode: AuthMode::Optional,
        }
    }

    /// Require all of the given permissions
    pub fn all<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PermissionName>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            mode: AuthMode::Required,
        }
    }

    /// Whether anonymous callers are acceptable
    pub fn allows_anonymous(&self) -> bool {
        self.permissions.is_empty() && self.mode == AuthMode::Optional
    }
}

/// Why a caller counts as unauthenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthenticatedReason {
    /// No verified identity on the request
    MissingIdentity,
    /// Identity does not match a user with a role
    UnknownUser,
    /// The user's role graph is broken or kept changing
    UnresolvableRole,
    /// The role store could not be queried
    StoreUnavailable,
}

impl fmt::Display for UnauthenticatedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnauthenticatedReason::MissingIdentity => "authentication required",
            UnauthenticatedReason::UnknownUser => "user has no assigned role",
            UnauthenticatedReason::UnresolvableRole => "user role could not be resolved",
            UnauthenticatedReason::StoreUnavailable => "role store unavailable",
        };
        f.write_str(text)
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    DenyUnauthenticated {
        reason: UnauthenticatedReason,
    },
    DenyConflict {
        kind: ConstraintKind,
        constraint: ConflictConstraint,
    },
    DenyInsufficientPermission {
        missing: BTreeSet<PermissionName>,
    },
}

impl Decision {
    /// Whether the operation may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::DenyUnauthenticated { .. } => "unauthenticated",
            Decision::DenyConflict { .. } => "conflict",
            Decision::DenyInsufficientPermission { .. } => "insufficient_permission",
        }
    }

    /// Transport status for the decision
    pub fn status_code(&self) -> u16 {
        match self {
            Decision::Allow => 200,
            Decision::DenyUnauthenticated { .. } => 401,
            Decision::DenyConflict { .. } | Decision::DenyInsufficientPermission { .. } => 403,
        }
    }

    /// Human-readable reason, `None` for `Allow`
    pub fn reason(&self) -> Option<String> {
        match self {
            Decision::Allow => None,
            Decision::DenyUnauthenticated { reason } => Some(reason.to_string()),
            Decision::DenyConflict { kind, constraint } => Some(format!(
                "roles {} may not be held together ({} separation of duty)",
                constraint, kind
            )),
            Decision::DenyInsufficientPermission { missing } => Some(format!(
                "missing permissions: {}",
                missing.iter().cloned().collect::<Vec<_>>().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Decision::Allow.status_code(), 200);
        assert_eq!(
            Decision::DenyUnauthenticated {
                reason: UnauthenticatedReason::MissingIdentity
            }
            .status_code(),
            401
        );
        assert_eq!(
            Decision::DenyInsufficientPermission {
                missing: BTreeSet::new()
            }
            .status_code(),
            403
        );
    }

    #[test]
    fn test_serialized_shape() {
        let decision = Decision::DenyConflict {
            kind: ConstraintKind::Static,
            constraint: ConflictConstraint::new("MODERATOR", "ADMIN"),
        };

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "deny_conflict");
        assert_eq!(json["kind"], "static");
        assert_eq!(json["constraint"][1], "ADMIN");
    }

    #[test]
    fn test_reason_lists_missing() {
        let decision = Decision::DenyInsufficientPermission {
            missing: ["ADMINISTER".to_string()].into_iter().collect(),
        };

        assert_eq!(decision.code(), "insufficient_permission");
        assert_eq!(decision.reason().unwrap(), "missing permissions: ADMINISTER");
        assert!(Decision::Allow.reason().is_none());
    }

    #[test]
    fn test_requirement_defaults_to_required() {
        let requirement: Requirement = serde_json::from_str("{}").unwrap();
        assert_eq!(requirement.mode, AuthMode::Required);
        assert!(!requirement.allows_anonymous());
        assert!(Requirement::optional().allows_anonymous());
    }
}
