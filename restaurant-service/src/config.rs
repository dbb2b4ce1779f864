use anyhow::{anyhow, Context, Result};
use common_auth::config::{DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS};
use common_auth::TokenConfig;
use std::env;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173",
];

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub tokens: TokenConfig,
    pub allowed_origins: Vec<String>,
    pub seed_demo_data: bool,
    pub db_max_connections: u32,
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_config() -> Result<ServiceConfig> {
    let database_url = required("DATABASE_URL")?;

    let host = env::var("HOST")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "0.0.0.0".to_string())
        .parse::<IpAddr>()
        .context("Failed to parse HOST")?;
    let port = parse_env::<u16>("PORT")?.unwrap_or(DEFAULT_PORT);

    let access_secret = required("JWT_ACCESS_SECRET")?;
    let refresh_secret = required("JWT_REFRESH_SECRET")?;
    let access_ttl = parse_env::<i64>("JWT_ACCESS_TTL_SECONDS")?.unwrap_or(DEFAULT_ACCESS_TTL_SECONDS);
    let refresh_ttl =
        parse_env::<i64>("JWT_REFRESH_TTL_SECONDS")?.unwrap_or(DEFAULT_REFRESH_TTL_SECONDS);
    let leeway = parse_env::<u32>("JWT_LEEWAY_SECONDS")?.unwrap_or(0);

    let tokens = TokenConfig::new(access_secret, refresh_secret)
        .with_ttls(access_ttl, refresh_ttl)
        .with_leeway(leeway);
    tokens
        .validate()
        .map_err(|err| anyhow!("Invalid JWT configuration: {err}"))?;

    let allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|value| parse_list(&value))
        .filter(|origins| !origins.is_empty())
        .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect());

    let seed_demo_data = bool_from_env("SEED_DEMO_DATA").unwrap_or(false);
    let db_max_connections =
        parse_env::<u32>("DB_MAX_CONNECTIONS")?.unwrap_or(DEFAULT_MAX_CONNECTIONS);

    Ok(ServiceConfig {
        database_url,
        host,
        port,
        tokens,
        allowed_origins,
        seed_demo_data,
        db_max_connections,
    })
}

fn required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("{key} must be set"))
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key).ok().and_then(|value| normalize_optional(&value)) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| anyhow!("Failed to parse {key} '{raw}': {err}")),
        None => Ok(None),
    }
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
