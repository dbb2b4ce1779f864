use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Application-focused representation of verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub id: Uuid,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Convenience helper for role checks.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Wire shape of both token classes: `{id, role, iat, exp}`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub(crate) id: String,
    pub(crate) role: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

impl ClaimsRepr {
    pub(crate) fn new(id: Uuid, role: Role, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            role: role.as_str().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let id = Uuid::parse_str(&value.id)
            .map_err(|_| AuthError::InvalidClaim("id", value.id.clone()))?;
        let role = value.role.parse::<Role>()?;

        let issued_at = Utc
            .timestamp_opt(value.iat, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("iat", value.iat.to_string()))?;
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        Ok(Self {
            id,
            role,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_converts_into_claims() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let repr = ClaimsRepr::new(id, Role::Waiter, now, now + chrono::Duration::hours(1));
        let claims = Claims::try_from(repr).expect("claims");
        assert_eq!(claims.id, id);
        assert!(claims.has_role(Role::Waiter));
        assert!(!claims.has_role(Role::Admin));
    }

    #[test]
    fn invalid_subject_is_reported() {
        let repr = ClaimsRepr {
            id: "not-a-uuid".into(),
            role: "ADMIN".into(),
            iat: 0,
            exp: 0,
        };
        let err = Claims::try_from(repr).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidClaim("id", _)));
    }

    #[test]
    fn unknown_role_is_reported() {
        let repr = ClaimsRepr {
            id: Uuid::new_v4().to_string(),
            role: "MANAGER".into(),
            iat: 0,
            exp: 0,
        };
        let err = Claims::try_from(repr).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidClaim("role", _)));
    }
}
