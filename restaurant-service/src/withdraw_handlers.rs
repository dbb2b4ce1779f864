use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use common_money::non_negative;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::store_error;
use crate::pagination::{Page, Paginated, SortOrder, DEFAULT_LIMIT};
use crate::AppState;

const WITHDRAW_COLUMNS: &str =
    "id, kind, amount, restaurant_id, order_id, description, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawKind {
    Income,
    Outcome,
}

impl WithdrawKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawKind::Income => "INCOME",
            WithdrawKind::Outcome => "OUTCOME",
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Withdraw {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: BigDecimal,
    pub restaurant_id: Uuid,
    pub order_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWithdraw {
    #[serde(rename = "type")]
    pub kind: WithdrawKind,
    pub amount: BigDecimal,
    pub restaurant_id: Uuid,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWithdraw {
    #[serde(rename = "type")]
    pub kind: Option<WithdrawKind>,
    pub amount: Option<BigDecimal>,
    pub restaurant_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawQuery {
    pub order_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<WithdrawKind>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn withdraw_not_found() -> ApiError {
    ApiError::not_found("withdraw_not_found", "Withdraw not found")
}

fn checked_amount(amount: &BigDecimal) -> ApiResult<BigDecimal> {
    non_negative(amount).map_err(|err| ApiError::bad_request("invalid_amount", err.to_string()))
}

pub async fn create_withdraw(
    State(state): State<AppState>,
    Json(input): Json<NewWithdraw>,
) -> ApiResult<(StatusCode, Json<Withdraw>)> {
    let amount = checked_amount(&input.amount)?;

    let withdraw = sqlx::query_as::<_, Withdraw>(&format!(
        "INSERT INTO withdraws (id, kind, amount, restaurant_id, order_id, description)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {WITHDRAW_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.kind.as_str())
    .bind(amount)
    .bind(input.restaurant_id)
    .bind(input.order_id)
    .bind(input.description.as_deref().map(str::trim))
    .fetch_one(&state.db)
    .await
    .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(withdraw)))
}

fn push_withdraw_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &WithdrawQuery) {
    qb.push(" WHERE TRUE");
    if let Some(order_id) = query.order_id {
        qb.push(" AND order_id = ").push_bind(order_id);
    }
    if let Some(restaurant_id) = query.restaurant_id {
        qb.push(" AND restaurant_id = ").push_bind(restaurant_id);
    }
    if let Some(kind) = query.kind {
        qb.push(" AND kind = ").push_bind(kind.as_str());
    }
}

pub async fn list_withdraws(
    State(state): State<AppState>,
    Query(query): Query<WithdrawQuery>,
) -> ApiResult<Json<Paginated<Withdraw>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
    let sort = query.sort.unwrap_or(SortOrder::Desc);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM withdraws");
    push_withdraw_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select =
        QueryBuilder::<Postgres>::new(format!("SELECT {WITHDRAW_COLUMNS} FROM withdraws"));
    push_withdraw_filters(&mut select, &query);
    select
        .push(format!(" ORDER BY created_at {} LIMIT ", sort.as_sql()))
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let withdraws = select
        .build_query_as::<Withdraw>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?;

    Ok(Json(page.wrap(withdraws, total)))
}

pub async fn get_withdraw(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Withdraw>> {
    let withdraw = sqlx::query_as::<_, Withdraw>(&format!(
        "SELECT {WITHDRAW_COLUMNS} FROM withdraws WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(withdraw_not_found)?;

    Ok(Json(withdraw))
}

pub async fn update_withdraw(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateWithdraw>,
) -> ApiResult<Json<Withdraw>> {
    let amount = input.amount.as_ref().map(checked_amount).transpose()?;

    let withdraw = sqlx::query_as::<_, Withdraw>(&format!(
        "UPDATE withdraws SET
            kind = COALESCE($2, kind),
            amount = COALESCE($3, amount),
            restaurant_id = COALESCE($4, restaurant_id),
            order_id = COALESCE($5, order_id),
            description = COALESCE($6, description)
         WHERE id = $1
         RETURNING {WITHDRAW_COLUMNS}"
    ))
    .bind(id)
    .bind(input.kind.map(|kind| kind.as_str()))
    .bind(amount)
    .bind(input.restaurant_id)
    .bind(input.order_id)
    .bind(input.description.as_deref().map(str::trim))
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(withdraw_not_found)?;

    Ok(Json(withdraw))
}

pub async fn delete_withdraw(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Withdraw>> {
    let withdraw = sqlx::query_as::<_, Withdraw>(&format!(
        "DELETE FROM withdraws WHERE id = $1 RETURNING {WITHDRAW_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(withdraw_not_found)?;

    Ok(Json(withdraw))
}
