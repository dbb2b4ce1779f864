use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Staff role carried by every identity and every issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    SuperAdmin,
    /// Spelling matches the stored value and the wire format.
    Casher,
    Waiter,
    Owner,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::SuperAdmin,
        Role::Casher,
        Role::Waiter,
        Role::Owner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Casher => "CASHER",
            Role::Waiter => "WAITER",
            Role::Owner => "OWNER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| AuthError::InvalidClaim("role", value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().expect("parse"), role);
        }
    }

    #[test]
    fn rejects_lowercase_and_unknown() {
        assert!("admin".parse::<Role>().is_err());
        assert!("MANAGER".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&Role::SuperAdmin).expect("serialize");
        assert_eq!(json, "\"SUPER_ADMIN\"");
        let role: Role = serde_json::from_str("\"CASHER\"").expect("deserialize");
        assert_eq!(role, Role::Casher);
    }
}
