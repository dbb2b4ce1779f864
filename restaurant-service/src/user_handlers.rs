use std::str::FromStr;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_auth::{Role, TokenPair, TokenSubject};
use common_http_errors::{ApiError, ApiResult};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{contains_pattern, LIKE_ESCAPE, is_unique_violation, optional_id, store_error};
use crate::pagination::{Page, Paginated, SortOrder, DEFAULT_LIMIT};
use crate::AppState;

const USER_COLUMNS: &str = "id, name, phone, role, restaurant_id, region_id, balance, created_at";

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    id: Uuid,
    name: String,
    phone: String,
    role: String,
    restaurant_id: Option<Uuid>,
    region_id: Option<Uuid>,
    balance: BigDecimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Public view of a user record. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub role: Role,
    pub restaurant_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
    pub balance: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ApiError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role).map_err(ApiError::internal)?;
        Ok(Self {
            id: row.id,
            name: row.name,
            phone: row.phone,
            role,
            restaurant_id: row.restaurant_id,
            region_id: row.region_id,
            balance: row.balance,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub restaurant_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
    pub role: Option<Role>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub restaurant_id: Option<String>,
    pub region_id: Option<String>,
}

fn phone_taken() -> ApiError {
    ApiError::bad_request("phone_taken", "User with this phone number already exists")
}

fn invalid_credentials() -> ApiError {
    ApiError::bad_request("invalid_credentials", "Phone number or password is incorrect")
}

fn user_not_found() -> ApiError {
    ApiError::not_found("user_not_found", "User not found")
}

fn required(value: String, field: &'static str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("missing_field", format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    state
        .tokens
        .issue_token_pair(TokenSubject {
            id: user.id,
            role: user.role,
        })
        .map_err(ApiError::internal)
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let RegisterRequest {
        name,
        phone,
        password,
        role,
        restaurant_id,
        region_id,
    } = body;

    let name = required(name, "name")?;
    let phone = required(phone, "phone")?;
    let restaurant_id = optional_id(restaurant_id.as_deref(), "invalid_restaurant_id")?;
    let region_id = optional_id(region_id.as_deref(), "invalid_region_id")?;

    let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE phone = $1")
        .bind(&phone)
        .fetch_optional(&state.db)
        .await
        .map_err(store_error)?;
    if existing.is_some() {
        return Err(phone_taken());
    }

    let password_hash = hash_password(&password)?;

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (id, name, phone, password_hash, role, restaurant_id, region_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&phone)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(restaurant_id)
    .bind(region_id)
    .fetch_one(&state.db)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            phone_taken()
        } else {
            store_error(err)
        }
    })?;

    let user = User::try_from(row)?;
    let tokens = issue_tokens(&state, &user)?;
    info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let LoginRequest { phone, password } = body;

    let credentials = match sqlx::query_as::<_, CredentialRow>(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE phone = $1"
    ))
    .bind(phone.trim())
    .fetch_optional(&state.db)
    .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            state.record_login_metric("invalid_credentials");
            return Err(invalid_credentials());
        }
        Err(err) => {
            state.record_login_metric("error");
            return Err(store_error(err));
        }
    };

    if !verify_password(&credentials.password_hash, &password) {
        state.record_login_metric("invalid_credentials");
        warn!(user_id = %credentials.user.id, "login rejected: wrong password");
        return Err(invalid_credentials());
    }

    let user = User::try_from(credentials.user)?;
    let tokens = issue_tokens(&state, &user)?;
    state.record_login_metric("success");
    info!(user_id = %user.id, role = %user.role, "user logged in");

    Ok(Json(AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user,
    }))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    match state.tokens.refresh(body.refresh_token.trim()) {
        Ok(issued) => {
            state.record_refresh_metric("success");
            Ok(Json(RefreshResponse {
                access_token: issued.access_token,
            }))
        }
        Err(err) if err.status().is_server_error() => {
            state.record_refresh_metric("error");
            Err(ApiError::internal(err))
        }
        Err(err) => {
            state.record_refresh_metric("invalid");
            debug!(error = %err, "refresh token rejected");
            Err(ApiError::unauthorized("invalid_refresh_token", err.public_message()))
        }
    }
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    qb.push(" WHERE TRUE");
    if let Some(name) = contains_pattern(query.name.as_deref()) {
        qb.push(" AND name ILIKE ").push_bind(name).push(LIKE_ESCAPE);
    }
    if let Some(phone) = contains_pattern(query.phone_number.as_deref()) {
        qb.push(" AND phone ILIKE ").push_bind(phone).push(LIKE_ESCAPE);
    }
    if let Some(restaurant_id) = query.restaurant_id {
        qb.push(" AND restaurant_id = ").push_bind(restaurant_id);
    }
    if let Some(region_id) = query.region_id {
        qb.push(" AND region_id = ").push_bind(region_id);
    }
    if let Some(role) = query.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
}

/// Alphabetical by name, ascending unless asked otherwise.
fn user_ordering(query: &UserQuery) -> String {
    let sort = query.sort.unwrap_or(SortOrder::Asc);
    format!(" ORDER BY name {}, created_at DESC", sort.as_sql())
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Paginated<User>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
    push_user_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
    push_user_filters(&mut select, &query);
    select
        .push(user_ordering(&query))
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let users = select
        .build_query_as::<UserRow>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?
        .into_iter()
        .map(User::try_from)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(page.wrap(users, total)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(user_not_found)?;

    Ok(Json(User::try_from(row)?))
}

/// Partial update. Store failures are reported with their own message.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let restaurant_id = optional_id(body.restaurant_id.as_deref(), "invalid_restaurant_id")?;
    let region_id = optional_id(body.region_id.as_deref(), "invalid_region_id")?;
    let password_hash = match body.password.as_deref() {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET
            name = COALESCE($2, name),
            phone = COALESCE($3, phone),
            password_hash = COALESCE($4, password_hash),
            role = COALESCE($5, role),
            restaurant_id = COALESCE($6, restaurant_id),
            region_id = COALESCE($7, region_id)
         WHERE id = $1
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(body.name.as_deref().map(str::trim))
    .bind(body.phone.as_deref().map(str::trim))
    .bind(password_hash)
    .bind(body.role.map(|role| role.as_str()))
    .bind(restaurant_id)
    .bind(region_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::bad_request("user_update_failed", err.to_string()))?
    .ok_or_else(user_not_found)?;

    Ok(Json(User::try_from(row)?))
}

pub async fn promote_to_admin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(Role::Admin.as_str())
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(user_not_found)?;

    info!(user_id = %id, "user promoted to ADMIN");
    Ok(Json(User::try_from(row)?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(user_not_found)?;

    info!(user_id = %id, "user deleted");
    Ok(Json(User::try_from(row)?))
}

pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    if password.trim().is_empty() {
        return Err(ApiError::bad_request(
            "invalid_password",
            "Password must not be empty",
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("Failed to hash password: {err}")))
}

pub(crate) fn verify_password(stored_hash: &str, password: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(?err, "stored password hash is not a valid PHC string");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            name: "Aziz".into(),
            phone: "+998901234567".into(),
            role: role.into(),
            restaurant_id: None,
            region_id: None,
            balance: BigDecimal::from(0),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("123456").expect("hash");
        assert_ne!(hash, "123456");
        assert!(verify_password(&hash, "123456"));
        assert!(!verify_password(&hash, "654321"));
    }

    #[test]
    fn empty_password_is_rejected() {
        let err = hash_password("  ").expect_err("empty");
        assert_eq!(err.code(), "invalid_password");
    }

    #[test]
    fn plain_text_hash_never_verifies() {
        assert!(!verify_password("123456", "123456"));
    }

    #[test]
    fn unknown_role_in_store_is_internal() {
        let err = User::try_from(row("MANAGER")).expect_err("bad role");
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn user_serializes_without_secret_fields() {
        let user = User::try_from(row("CASHER")).expect("user");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], "CASHER");
        assert_eq!(json["restaurantId"], serde_json::Value::Null);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn register_request_accepts_blank_tenant_ids() {
        let body: RegisterRequest = serde_json::from_str(
            r#"{"name":"Aziz","phone":"+998901234567","password":"x","role":"WAITER","restaurantId":""}"#,
        )
        .unwrap();
        assert_eq!(body.role, Role::Waiter);
        assert_eq!(optional_id(body.restaurant_id.as_deref(), "bad").unwrap(), None);
        assert!(body.region_id.is_none());
    }

    #[test]
    fn users_sort_by_name_ascending_by_default() {
        assert_eq!(
            user_ordering(&UserQuery::default()),
            " ORDER BY name ASC, created_at DESC"
        );
    }

    #[test]
    fn user_sort_direction_comes_from_query() {
        let query: UserQuery =
            serde_json::from_value(serde_json::json!({ "sort": "desc", "role": "WAITER" })).unwrap();
        assert_eq!(query.role, Some(Role::Waiter));
        assert_eq!(user_ordering(&query), " ORDER BY name DESC, created_at DESC");
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("  Aziz ".into(), "name").unwrap(), "Aziz");
        assert_eq!(required(" ".into(), "name").unwrap_err().code(), "missing_field");
    }
}
