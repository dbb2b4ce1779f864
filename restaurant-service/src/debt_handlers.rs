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

use crate::db::{contains_pattern, LIKE_ESCAPE, store_error};
use crate::pagination::{Page, Paginated, SortOrder, DEFAULT_LIMIT};
use crate::AppState;

const DEBT_COLUMNS: &str = "id, order_id, restaurant_id, client, amount, created_at";

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub restaurant_id: Uuid,
    pub client: String,
    pub amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDebt {
    #[serde(default)]
    pub order_id: Option<Uuid>,
    pub restaurant_id: Uuid,
    pub client: String,
    pub amount: BigDecimal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDebt {
    pub order_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub client: Option<String>,
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtQuery {
    pub order_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub client: Option<String>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub sort_by_amount: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn debt_not_found() -> ApiError {
    ApiError::not_found("debt_not_found", "Debt not found")
}

fn checked_amount(amount: &BigDecimal) -> ApiResult<BigDecimal> {
    non_negative(amount).map_err(|err| ApiError::bad_request("invalid_amount", err.to_string()))
}

pub async fn create_debt(
    State(state): State<AppState>,
    Json(input): Json<NewDebt>,
) -> ApiResult<(StatusCode, Json<Debt>)> {
    let amount = checked_amount(&input.amount)?;
    let client = input.client.trim();
    if client.is_empty() {
        return Err(ApiError::bad_request("missing_field", "client is required"));
    }

    let debt = sqlx::query_as::<_, Debt>(&format!(
        "INSERT INTO debts (id, order_id, restaurant_id, client, amount)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {DEBT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.order_id)
    .bind(input.restaurant_id)
    .bind(client)
    .bind(amount)
    .fetch_one(&state.db)
    .await
    .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(debt)))
}

fn push_debt_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &DebtQuery) {
    qb.push(" WHERE TRUE");
    if let Some(order_id) = query.order_id {
        qb.push(" AND order_id = ").push_bind(order_id);
    }
    if let Some(restaurant_id) = query.restaurant_id {
        qb.push(" AND restaurant_id = ").push_bind(restaurant_id);
    }
    if let Some(client) = contains_pattern(query.client.as_deref()) {
        qb.push(" AND client ILIKE ").push_bind(client).push(LIKE_ESCAPE);
    }
    if let Some(min) = &query.min_amount {
        qb.push(" AND amount >= ").push_bind(min.clone());
    }
    if let Some(max) = &query.max_amount {
        qb.push(" AND amount <= ").push_bind(max.clone());
    }
}

/// Ordering clause: by amount when asked, otherwise newest first.
fn debt_ordering(query: &DebtQuery) -> String {
    match query.sort_by_amount {
        Some(order) => format!(" ORDER BY amount {}, created_at DESC", order.as_sql()),
        None => " ORDER BY created_at DESC".to_string(),
    }
}

pub async fn list_debts(
    State(state): State<AppState>,
    Query(query): Query<DebtQuery>,
) -> ApiResult<Json<Paginated<Debt>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM debts");
    push_debt_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {DEBT_COLUMNS} FROM debts"));
    push_debt_filters(&mut select, &query);
    select
        .push(debt_ordering(&query))
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let debts = select
        .build_query_as::<Debt>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?;

    Ok(Json(page.wrap(debts, total)))
}

pub async fn get_debt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Debt>> {
    let debt = sqlx::query_as::<_, Debt>(&format!("SELECT {DEBT_COLUMNS} FROM debts WHERE id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(store_error)?
        .ok_or_else(debt_not_found)?;

    Ok(Json(debt))
}

pub async fn update_debt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateDebt>,
) -> ApiResult<Json<Debt>> {
    let amount = input.amount.as_ref().map(checked_amount).transpose()?;

    let debt = sqlx::query_as::<_, Debt>(&format!(
        "UPDATE debts SET
            order_id = COALESCE($2, order_id),
            restaurant_id = COALESCE($3, restaurant_id),
            client = COALESCE($4, client),
            amount = COALESCE($5, amount)
         WHERE id = $1
         RETURNING {DEBT_COLUMNS}"
    ))
    .bind(id)
    .bind(input.order_id)
    .bind(input.restaurant_id)
    .bind(input.client.as_deref().map(str::trim))
    .bind(amount)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(debt_not_found)?;

    Ok(Json(debt))
}

pub async fn delete_debt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Debt>> {
    let debt = sqlx::query_as::<_, Debt>(&format!(
        "DELETE FROM debts WHERE id = $1 RETURNING {DEBT_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(debt_not_found)?;

    Ok(Json(debt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ordering_is_newest_first() {
        assert_eq!(debt_ordering(&DebtQuery::default()), " ORDER BY created_at DESC");
    }

    #[test]
    fn amount_ordering_is_honoured() {
        let query = DebtQuery {
            sort_by_amount: Some(SortOrder::Asc),
            ..Default::default()
        };
        assert_eq!(debt_ordering(&query), " ORDER BY amount ASC, created_at DESC");
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err = checked_amount(&BigDecimal::from(-5)).unwrap_err();
        assert_eq!(err.code(), "invalid_amount");
    }
}
