use std::fmt;

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 24 * 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
/// Upper bound for either lifetime (100 years).
pub const MAX_TTL_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Runtime configuration for issuing and verifying tokens.
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC secret for access tokens.
    pub access_secret: String,
    /// HMAC secret for refresh tokens. Must differ from `access_secret`.
    pub refresh_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
}

impl TokenConfig {
    /// Construct config with the default lifetimes (1 day / 7 days) and no leeway.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            leeway_seconds: 0,
        }
    }

    pub fn with_ttls(mut self, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        self.access_ttl_seconds = access_ttl_seconds;
        self.refresh_ttl_seconds = refresh_ttl_seconds;
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.access_secret.trim().is_empty() {
            return Err(AuthError::Config("access secret must not be empty".into()));
        }
        if self.refresh_secret.trim().is_empty() {
            return Err(AuthError::Config("refresh secret must not be empty".into()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::Config(
                "access and refresh secrets must differ".into(),
            ));
        }
        if self.access_ttl_seconds <= 0 || self.refresh_ttl_seconds <= 0 {
            return Err(AuthError::Config("token lifetimes must be positive".into()));
        }
        if self.access_ttl_seconds > MAX_TTL_SECONDS || self.refresh_ttl_seconds > MAX_TTL_SECONDS {
            return Err(AuthError::Config(format!(
                "token lifetimes must not exceed {MAX_TTL_SECONDS} seconds"
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_one_day_and_seven_days() {
        let config = TokenConfig::new("a", "b");
        assert_eq!(config.access_ttl_seconds, 86_400);
        assert_eq!(config.refresh_ttl_seconds, 604_800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn identical_secrets_are_rejected() {
        let err = TokenConfig::new("same", "same").validate().expect_err("reject");
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn blank_secret_is_rejected() {
        assert!(TokenConfig::new("  ", "b").validate().is_err());
        assert!(TokenConfig::new("a", "").validate().is_err());
    }

    #[test]
    fn lifetimes_are_bounded() {
        let config = TokenConfig::new("a", "b");
        assert!(config.clone().with_ttls(0, 60).validate().is_err());
        assert!(config.clone().with_ttls(60, i64::MAX).validate().is_err());
        assert!(config
            .clone()
            .with_ttls(MAX_TTL_SECONDS + 1, 60)
            .validate()
            .is_err());
        assert!(config.with_ttls(MAX_TTL_SECONDS, MAX_TTL_SECONDS).validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", TokenConfig::new("top-secret", "other-secret"));
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("other-secret"));
    }
}
