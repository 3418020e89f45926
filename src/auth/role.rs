use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account roles. The hierarchy is a strict total order: `User < Admin < Super`.
///
/// Corresponds to the `user_role` SQL enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Super,
}

impl Role {
    /// Position in the hierarchy. Adding a role means adding an explicit arm here.
    pub const fn rank(self) -> u8 {
        match self {
            Role::User => 0,
            Role::Admin => 1,
            Role::Super => 2,
        }
    }

    /// `true` when `self` is `required` or ranks above it.
    pub const fn has_role_or_higher(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Super => "super",
        }
    }

    /// Highest role in `roles`, if any.
    pub fn highest(roles: &[Role]) -> Option<Role> {
        roles.iter().copied().max_by_key(|role| role.rank())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super" => Ok(Role::Super),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_is_ordered_by_rank() {
        assert!(Role::Super.has_role_or_higher(Role::Admin));
        assert!(Role::Super.has_role_or_higher(Role::User));
        assert!(Role::Admin.has_role_or_higher(Role::Admin));
        assert!(Role::Admin.has_role_or_higher(Role::User));

        assert!(!Role::User.has_role_or_higher(Role::Admin));
        assert!(!Role::Admin.has_role_or_higher(Role::Super));
    }

    #[test]
    fn test_highest() {
        assert_eq!(Role::highest(&[Role::User, Role::Super, Role::Admin]), Some(Role::Super));
        assert_eq!(Role::highest(&[]), None);
    }

    #[test]
    fn test_parse_and_serialize() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Super).unwrap(), "\"super\"");
    }
}
