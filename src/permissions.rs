// src/permissions.rs

use serde::Serialize;

/// A named capability checked against a role's allowed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreatePost,
    EditPost,
    DeletePost,
    /// Admin override: also grants edit/delete rights over any post or comment.
    ManageUsers,
    ManageCategories,
    ManageTags,
    LikePost,
    CommentPost,
    UpdateProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Editor,
    User,
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::CreatePost,
    Permission::EditPost,
    Permission::DeletePost,
    Permission::ManageUsers,
    Permission::ManageCategories,
    Permission::ManageTags,
    Permission::LikePost,
    Permission::CommentPost,
    Permission::UpdateProfile,
];

const EDITOR_PERMISSIONS: &[Permission] = &[
    Permission::CreatePost,
    Permission::EditPost,
    Permission::LikePost,
    Permission::CommentPost,
    Permission::UpdateProfile,
];

const USER_PERMISSIONS: &[Permission] = &[
    Permission::LikePost,
    Permission::CommentPost,
    Permission::UpdateProfile,
];

impl Role {
    pub fn parse(role: &str) -> Option<Role> {
        match role {
            "admin" => Some(Role::Admin),
            "editor" => Some(Role::Editor),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::User => "user",
        }
    }

    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Editor => EDITOR_PERMISSIONS,
            Role::User => USER_PERMISSIONS,
        }
    }
}

/// Resolves the permission set for a stored role string.
/// Unknown roles map to an empty set.
pub fn permissions_for(role: &str) -> &'static [Permission] {
    Role::parse(role).map(Role::permissions).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_every_permission() {
        let perms = permissions_for("admin");
        assert_eq!(perms.len(), 9);
        assert!(perms.contains(&Permission::ManageUsers));
        assert!(perms.contains(&Permission::DeletePost));
    }

    #[test]
    fn editor_permissions_are_exact() {
        assert_eq!(
            permissions_for("editor"),
            &[
                Permission::CreatePost,
                Permission::EditPost,
                Permission::LikePost,
                Permission::CommentPost,
                Permission::UpdateProfile,
            ]
        );
    }

    #[test]
    fn user_permissions_are_exact() {
        assert_eq!(
            permissions_for("user"),
            &[
                Permission::LikePost,
                Permission::CommentPost,
                Permission::UpdateProfile,
            ]
        );
        assert!(!permissions_for("user").contains(&Permission::CreatePost));
    }

    #[test]
    fn unknown_role_has_no_permissions() {
        assert!(permissions_for("superuser").is_empty());
        assert!(permissions_for("").is_empty());
    }
}
