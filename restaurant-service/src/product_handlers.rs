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

const PRODUCT_COLUMNS: &str =
    "id, name, price, category_id, restaurant_id, image, is_active, created_at";

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: BigDecimal,
    pub category_id: Uuid,
    pub restaurant_id: Uuid,
    pub image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: BigDecimal,
    pub category_id: Uuid,
    pub restaurant_id: Uuid,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub price: Option<BigDecimal>,
    pub category_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub restaurant_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn product_not_found() -> ApiError {
    ApiError::not_found("product_not_found", "Product not found")
}

fn checked_price(price: &BigDecimal) -> ApiResult<BigDecimal> {
    non_negative(price).map_err(|err| ApiError::bad_request("invalid_price", err.to_string()))
}

fn normalize_image_input(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let price = checked_price(&input.price)?;

    let product = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (id, name, price, category_id, restaurant_id, image, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.name.trim())
    .bind(price)
    .bind(input.category_id)
    .bind(input.restaurant_id)
    .bind(normalize_image_input(input.image))
    .bind(input.is_active)
    .fetch_one(&state.db)
    .await
    .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(product)))
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if let Some(name) = contains_pattern(query.name.as_deref()) {
        qb.push(" AND name ILIKE ").push_bind(name).push(LIKE_ESCAPE);
    }
    if let Some(category_id) = query.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(restaurant_id) = query.restaurant_id {
        qb.push(" AND restaurant_id = ").push_bind(restaurant_id);
    }
    if let Some(is_active) = query.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Paginated<Product>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
    let sort = query.sort.unwrap_or(SortOrder::Asc);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
    push_product_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select =
        QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
    push_product_filters(&mut select, &query);
    select
        .push(format!(" ORDER BY name {} LIMIT ", sort.as_sql()))
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let products = select
        .build_query_as::<Product>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?;

    Ok(Json(page.wrap(products, total)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(product_not_found)?;

    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProduct>,
) -> ApiResult<Json<Product>> {
    let price = input.price.as_ref().map(checked_price).transpose()?;

    let product = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET
            name = COALESCE($2, name),
            price = COALESCE($3, price),
            category_id = COALESCE($4, category_id),
            restaurant_id = COALESCE($5, restaurant_id),
            image = COALESCE($6, image),
            is_active = COALESCE($7, is_active)
         WHERE id = $1
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .bind(input.name.as_deref().map(str::trim))
    .bind(price)
    .bind(input.category_id)
    .bind(input.restaurant_id)
    .bind(normalize_image_input(input.image))
    .bind(input.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(product_not_found)?;

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(product_not_found)?;

    Ok(Json(product))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn negative_price_is_rejected() {
        let err = checked_price(&BigDecimal::from_str("-1").unwrap()).unwrap_err();
        assert_eq!(err.code(), "invalid_price");
    }

    #[test]
    fn price_is_normalized() {
        let price = checked_price(&BigDecimal::from_str("25000").unwrap()).unwrap();
        assert_eq!(price.to_string(), "25000.00");
    }

    #[test]
    fn blank_image_is_dropped() {
        assert_eq!(normalize_image_input(Some("  ".into())), None);
        assert_eq!(
            normalize_image_input(Some(" https://cdn/p.png ".into())).as_deref(),
            Some("https://cdn/p.png")
        );
    }
}
