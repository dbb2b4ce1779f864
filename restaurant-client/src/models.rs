use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_auth::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub role: Role,
    #[serde(default)]
    pub restaurant_id: Option<Uuid>,
    #[serde(default)]
    pub region_id: Option<Uuid>,
    pub balance: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// Tokens and profile kept in memory between calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

impl From<AuthResponse> for Session {
    fn from(response: AuthResponse) -> Self {
        Session {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user: response.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub last_page: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// Paging parameters accepted by every list endpoint. Resource filters can be
/// passed as any serializable struct or map instead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_restaurants: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    pub total_revenue: f64,
    pub net_profit: i64,
}
