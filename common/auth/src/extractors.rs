use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use uuid::Uuid;

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;
use crate::tokens::TokenService;

/// Identity established for the current request from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.claims.id
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    /// Verify the bearer token carried in `headers`.
    pub fn from_headers(headers: &HeaderMap, tokens: &TokenService) -> AuthResult<Self> {
        let token = bearer_token(headers)?;
        let claims = tokens.verify_access_token(token)?;
        Ok(Self {
            claims,
            token: token.to_owned(),
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // The access layer may already have verified this request.
        if let Some(existing) = parts.extensions.get::<AuthContext>() {
            return Ok(existing.clone());
        }

        let tokens = Arc::<TokenService>::from_ref(state);
        let context = AuthContext::from_headers(&parts.headers, &tokens)?;
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

/// Token part of `Authorization: Bearer <token>`. The scheme is matched
/// case-insensitively.
fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let raw = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?;

    match raw.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::InvalidAuthorization),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use crate::tokens::TokenSubject;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    fn tokens() -> TokenService {
        TokenService::new(&TokenConfig::new("a-secret", "r-secret")).expect("service")
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers("bearer  abc.def.ghi ")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_malformed() {
        for value in ["Basic credentials", "Bearer    ", "abc.def.ghi"] {
            let err = bearer_token(&headers(value)).expect_err(value);
            assert!(matches!(err, AuthError::InvalidAuthorization), "{value}");
        }
    }

    #[test]
    fn from_headers_requires_header() {
        let err = AuthContext::from_headers(&HeaderMap::new(), &tokens()).expect_err("missing");
        assert!(matches!(err, AuthError::MissingAuthorization));
    }

    #[test]
    fn from_headers_attaches_identity() {
        let tokens = tokens();
        let subject = TokenSubject {
            id: Uuid::new_v4(),
            role: Role::Waiter,
        };
        let pair = tokens.issue_token_pair(subject).expect("pair");

        let context = AuthContext::from_headers(
            &headers(&format!("Bearer {}", pair.access_token)),
            &tokens,
        )
        .expect("context");
        assert_eq!(context.user_id(), subject.id);
        assert_eq!(context.role(), Role::Waiter);
        assert_eq!(context.token, pair.access_token);
    }

    #[test]
    fn refresh_token_is_rejected_as_bearer() {
        let tokens = tokens();
        let pair = tokens
            .issue_token_pair(TokenSubject {
                id: Uuid::new_v4(),
                role: Role::Admin,
            })
            .expect("pair");
        let err = AuthContext::from_headers(
            &headers(&format!("Bearer {}", pair.refresh_token)),
            &tokens,
        )
        .expect_err("refresh token");
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }
}
