use tracing::debug;

use crate::error::AuthError;
use crate::roles::Role;
use crate::AuthContext;

/// Allow-list check for a single route.
///
/// An empty allow-list places no restriction. Otherwise the request must carry
/// an identity whose role is one of `allowed`.
pub fn ensure_role(auth: Option<&AuthContext>, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.is_empty() {
        return Ok(());
    }

    let auth = auth.ok_or(AuthError::MissingIdentity)?;
    if allowed.contains(&auth.claims.role) {
        return Ok(());
    }

    debug!(user_id = %auth.claims.id, role = %auth.claims.role, ?allowed, "role check failed");
    Err(AuthError::Forbidden {
        required: allowed.to_vec(),
    })
}
