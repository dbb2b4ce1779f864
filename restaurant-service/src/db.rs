use anyhow::{Context, Result};
use common_http_errors::ApiError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::config::ServiceConfig;

pub async fn connect(config: &ServiceConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;
    Ok(pool)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Map a store failure to the nearest client-facing error. Constraint
/// violations are the caller's fault; anything else is logged and hidden.
pub(crate) fn store_error(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return ApiError::bad_request("duplicate_record", "Record already exists");
        }
        if db.is_foreign_key_violation() {
            return ApiError::bad_request(
                "invalid_reference",
                "Operation conflicts with a related record",
            );
        }
        if db.is_check_violation() {
            return ApiError::bad_request("constraint_violation", db.message().to_string());
        }
    }
    warn!(error = ?err, "store call failed");
    ApiError::internal(err)
}

/// Parse an optional id coming from a loosely-typed body field, treating
/// blank strings as absent.
pub(crate) fn optional_id(
    value: Option<&str>,
    code: &'static str,
) -> Result<Option<Uuid>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| ApiError::bad_request(code, format!("'{raw}' is not a valid id"))),
        None => Ok(None),
    }
}

/// Appended after every bound [`contains_pattern`] value.
pub(crate) const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// `ILIKE` pattern for a free-text filter; blank input means no filter.
/// Wildcards typed by the caller match literally.
pub(crate) fn contains_pattern(value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    Some(pattern)
}
