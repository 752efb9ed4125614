//! Platform role graph seed data

use crate::types::{Permission, Role, RoleHierarchy, RolePermission, User};
use serde::{Deserialize, Serialize};

/// Well-known role names
pub mod roles {
    pub const USER: &str = "USER";
    pub const MEMBER: &str = "MEMBER";
    pub const MODERATOR: &str = "MODERATOR";
    pub const ADMIN: &str = "ADMIN";
    pub const SUPER_ADMIN: &str = "SUPER_ADMIN";
}

/// Well-known permission names
pub mod permissions {
    pub const CREATE_ARTICLE: &str = "CREATE_ARTICLE";
    pub const EDIT_OWN_ARTICLE: &str = "EDIT_OWN_ARTICLE";
    pub const DELETE_OWN_ARTICLE: &str = "DELETE_OWN_ARTICLE";
    pub const COMMENT: &str = "COMMENT";
    pub const DELETE_OWN_COMMENT: &str = "DELETE_OWN_COMMENT";
    pub const DELETE_COMMENT: &str = "DELETE_COMMENT";
    pub const MODERATE_ARTICLE: &str = "MODERATE_ARTICLE";
    pub const ADMINISTER: &str = "ADMINISTER";
    pub const DELETE_COMMENT_IN_OWN_ARTICLE: &str = "DELETE_COMMENT_IN_OWN_ARTICLE";
    pub const POST_PREMIUM_ARTICLE: &str = "POST_PREMIUM_ARTICLE";
    pub const ACCESS_MEMBER_ONLY_AREA: &str = "ACCESS_MEMBER_ONLY_AREA";
}

/// Complete dump of role graph rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGraphSeed {
    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default)]
    pub role_permissions: Vec<RolePermission>,

    #[serde(default)]
    pub hierarchy: Vec<RoleHierarchy>,

    #[serde(default)]
    pub users: Vec<User>,
}

impl RoleGraphSeed {
    /// Add a user row
    pub fn with_user(mut self, id: impl Into<String>, role_id: i64) -> Self {
        self.users.push(User {
            id: id.into(),
            role_id,
        });
        self
    }
}

/// The platform's default roles, permissions, grants and inheritance chain
/// `USER -> MEMBER -> MODERATOR -> ADMIN -> SUPER_ADMIN`.
pub fn platform() -> RoleGraphSeed {
    use permissions::*;
    use roles::*;

    let roles = vec![
        Role::new(1, USER).with_description("Regular user"),
        Role::new(2, MEMBER).with_description("Paying member"),
        Role::new(3, MODERATOR).with_description("Content moderator"),
        Role::new(4, ADMIN).with_description("Administrator"),
        Role::new(5, SUPER_ADMIN).with_description("Super administrator"),
    ];

    let permissions = vec![
        Permission::new(1, CREATE_ARTICLE),
        Permission::new(2, EDIT_OWN_ARTICLE),
        Permission::new(3, DELETE_OWN_ARTICLE),
        Permission::new(4, COMMENT),
        Permission::new(5, DELETE_OWN_COMMENT),
        Permission::new(6, DELETE_COMMENT),
        Permission::new(7, MODERATE_ARTICLE),
        Permission::new(8, ADMINISTER),
        Permission::new(9, DELETE_COMMENT_IN_OWN_ARTICLE),
        Permission::new(10, POST_PREMIUM_ARTICLE),
        Permission::new(11, ACCESS_MEMBER_ONLY_AREA),
    ];

    let grants: [(i64, &[i64]); 5] = [
        (1, &[1, 2, 3, 4, 5, 9]),
        (2, &[10, 11]),
        (3, &[7]),
        (4, &[8]),
        (5, &[6]),
    ];
    let role_permissions = grants
        .iter()
        .flat_map(|(role_id, perms)| {
            perms.iter().map(move |permission_id| RolePermission {
                role_id: *role_id,
                permission_id: *permission_id,
            })
        })
        .collect();

    let hierarchy = [(1, 2), (2, 3), (3, 4), (4, 5)]
        .into_iter()
        .map(|(parent_role_id, child_role_id)| RoleHierarchy {
            parent_role_id,
            child_role_id,
        })
        .collect();

    RoleGraphSeed {
        roles,
        permissions,
        role_permissions,
        hierarchy,
        users: Vec::new(),
    }
}
