use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::roles::Role;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token verification failed: {0}")]
    InvalidToken(String),
    #[error("token has expired")]
    Expired,
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("user role not found in request")]
    MissingIdentity,
    #[error("{}", forbidden_message(.required))]
    Forbidden { required: Vec<Role> },
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("invalid token configuration: {0}")]
    Config(String),
}

fn forbidden_message(required: &[Role]) -> String {
    if required.is_empty() {
        "Insufficient role".to_string()
    } else {
        let names = required.iter().map(Role::as_str).collect::<Vec<_>>();
        format!("You need one of these roles: {}", names.join(", "))
    }
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => "auth_header",
            AuthError::InvalidToken(_) | AuthError::InvalidClaim(_, _) => "auth_token",
            AuthError::Expired => "auth_token_expired",
            AuthError::MissingIdentity => "auth_identity",
            AuthError::Forbidden { .. } => "missing_role",
            AuthError::Signing(_) | AuthError::Config(_) => "auth_internal",
        }
    }

    /// Client-facing text. Verification and internal detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InvalidToken(_) | AuthError::InvalidClaim(_, _) => "Invalid token".to_string(),
            AuthError::Expired => "Token expired".to_string(),
            AuthError::Signing(_) | AuthError::Config(_) => "Unable to process token".to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Signing(_) | AuthError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::InvalidToken(value.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        debug!(code, error = %self, "request rejected by auth");
        let message = self.public_message();

        let mut response = (status, Json(ErrorBody { code, message })).into_response();
        response
            .headers_mut()
            .insert("X-Error-Code", HeaderValue::from_static(code));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_lists_required_roles() {
        let err = AuthError::Forbidden {
            required: vec![Role::Admin, Role::Casher],
        };
        assert_eq!(err.to_string(), "You need one of these roles: ADMIN, CASHER");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn guard_failures_render_as_unauthorized() {
        for err in [
            AuthError::MissingAuthorization,
            AuthError::InvalidAuthorization,
            AuthError::Expired,
            AuthError::MissingIdentity,
            AuthError::InvalidToken("bad".into()),
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().contains_key("X-Error-Code"));
        }
    }

    #[tokio::test]
    async fn verification_detail_is_not_sent_to_clients() {
        let detail = jsonwebtoken::errors::Error::from(ErrorKind::InvalidSignature).to_string();
        let err = AuthError::InvalidToken(detail.clone());
        assert_eq!(err.public_message(), "Invalid token");

        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["code"], "auth_token");
        assert_eq!(body["message"], "Invalid token");
        assert!(!body["message"].as_str().unwrap().contains(&detail));

        let claim = AuthError::InvalidClaim("role", "CHEF".into());
        assert_eq!(claim.public_message(), "Invalid token");
        assert_eq!(AuthError::Expired.public_message(), "Token expired");
    }

    #[test]
    fn signing_failure_is_internal() {
        let response = AuthError::Signing("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
