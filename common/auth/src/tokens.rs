use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::claims::{Claims, ClaimsRepr};
use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Identity fields bound into both token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSubject {
    pub id: Uuid,
    pub role: Role,
}

impl From<&Claims> for TokenSubject {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.id,
            role: claims.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub access_expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signing material for one token class.
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn from_secret(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }
}

/// Stateless issuer/verifier for access and refresh tokens.
///
/// Each class has its own HS256 secret, so a token of one class never
/// verifies as the other. Nothing is persisted: validity is a function of
/// signature and `exp` only, which also means a refresh token stays usable
/// until it expires.
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> AuthResult<Self> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds.into();
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            access: KeyPair::from_secret(&config.access_secret, config.access_ttl_seconds),
            refresh: KeyPair::from_secret(&config.refresh_secret, config.refresh_ttl_seconds),
            validation,
        })
    }

    pub fn issue_token_pair(&self, subject: TokenSubject) -> AuthResult<TokenPair> {
        let now = Utc::now();
        let (access_token, access_expires_at) = sign(&self.access, subject, now)?;
        let (refresh_token, refresh_expires_at) = sign(&self.refresh, subject, now)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    pub fn verify_access_token(&self, token: &str) -> AuthResult<Claims> {
        self.verify_with(&self.access, token)
    }

    pub fn verify_refresh_token(&self, token: &str) -> AuthResult<Claims> {
        self.verify_with(&self.refresh, token)
    }

    /// Mint a new access token from a valid refresh token. The refresh token
    /// itself is neither rotated nor revoked.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<IssuedAccessToken> {
        let claims = self.verify_refresh_token(refresh_token)?;
        let (access_token, expires_at) =
            sign(&self.access, TokenSubject::from(&claims), Utc::now())?;
        debug!(user_id = %claims.id, "issued access token from refresh token");
        Ok(IssuedAccessToken {
            access_token,
            expires_at,
        })
    }

    fn verify_with(&self, keys: &KeyPair, token: &str) -> AuthResult<Claims> {
        let data = decode::<ClaimsRepr>(token, &keys.decoding, &self.validation)?;
        Claims::try_from(data.claims)
    }
}

fn sign(keys: &KeyPair, subject: TokenSubject, now: DateTime<Utc>) -> AuthResult<(String, DateTime<Utc>)> {
    let expires_at = now
        .checked_add_signed(keys.ttl)
        .ok_or_else(|| AuthError::Signing("token expiry out of range".into()))?;
    let claims = ClaimsRepr::new(subject.id, subject.role, now, expires_at);
    let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
        .map_err(|err| AuthError::Signing(err.to_string()))?;
    Ok((token, expires_at))
}
