use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::{contains_pattern, LIKE_ESCAPE, store_error};
use crate::pagination::{Page, Paginated, SortOrder, DEFAULT_LIMIT};
use crate::AppState;

const RESTAURANT_COLUMNS: &str =
    "id, name, region_id, tip, kind, address, phone, is_active, created_at";

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+998[0-9]{9}$").expect("valid phone pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestaurantKind {
    Restaurant,
    Cafe,
    FastFood,
    Bar,
}

impl RestaurantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestaurantKind::Restaurant => "RESTAURANT",
            RestaurantKind::Cafe => "CAFE",
            RestaurantKind::FastFood => "FAST_FOOD",
            RestaurantKind::Bar => "BAR",
        }
    }
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub region_id: Uuid,
    pub tip: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub address: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRestaurant {
    pub name: String,
    pub region_id: Uuid,
    pub tip: i32,
    #[serde(rename = "type")]
    pub kind: RestaurantKind,
    pub address: String,
    pub phone: String,
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRestaurant {
    pub name: Option<String>,
    pub region_id: Option<Uuid>,
    pub tip: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<RestaurantKind>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantQuery {
    pub name: Option<String>,
    pub region_id: Option<Uuid>,
    pub tip: Option<i32>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn restaurant_not_found() -> ApiError {
    ApiError::not_found("restaurant_not_found", "Restaurant not found")
}

pub(crate) fn validate_tip(tip: i32) -> ApiResult<()> {
    if !(0..=100).contains(&tip) {
        return Err(ApiError::bad_request(
            "invalid_tip",
            "tip must be between 0 and 100",
        ));
    }
    Ok(())
}

pub(crate) fn validate_phone(phone: &str) -> ApiResult<()> {
    if !PHONE_PATTERN.is_match(phone) {
        return Err(ApiError::bad_request(
            "invalid_phone",
            "Phone number must match +998XXXXXXXXX",
        ));
    }
    Ok(())
}

pub async fn create_restaurant(
    State(state): State<AppState>,
    Json(input): Json<NewRestaurant>,
) -> ApiResult<(StatusCode, Json<Restaurant>)> {
    validate_tip(input.tip)?;
    let phone = input.phone.trim();
    validate_phone(phone)?;

    let restaurant = sqlx::query_as::<_, Restaurant>(&format!(
        "INSERT INTO restaurants (id, name, region_id, tip, kind, address, phone, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {RESTAURANT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.name.trim())
    .bind(input.region_id)
    .bind(input.tip)
    .bind(input.kind.as_str())
    .bind(input.address.trim())
    .bind(phone)
    .bind(input.is_active)
    .fetch_one(&state.db)
    .await
    .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(restaurant)))
}

fn push_restaurant_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &RestaurantQuery) {
    qb.push(" WHERE TRUE");
    if let Some(name) = contains_pattern(query.name.as_deref()) {
        qb.push(" AND name ILIKE ").push_bind(name).push(LIKE_ESCAPE);
    }
    if let Some(region_id) = query.region_id {
        qb.push(" AND region_id = ").push_bind(region_id);
    }
    if let Some(tip) = query.tip {
        qb.push(" AND tip = ").push_bind(tip);
    }
    if let Some(address) = contains_pattern(query.address.as_deref()) {
        qb.push(" AND address ILIKE ").push_bind(address).push(LIKE_ESCAPE);
    }
    if let Some(is_active) = query.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}

pub async fn list_restaurants(
    State(state): State<AppState>,
    Query(query): Query<RestaurantQuery>,
) -> ApiResult<Json<Paginated<Restaurant>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
    let sort = query.sort.unwrap_or(SortOrder::Asc);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM restaurants");
    push_restaurant_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select =
        QueryBuilder::<Postgres>::new(format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants"));
    push_restaurant_filters(&mut select, &query);
    select
        .push(format!(" ORDER BY name {} LIMIT ", sort.as_sql()))
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let restaurants = select
        .build_query_as::<Restaurant>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?;

    Ok(Json(page.wrap(restaurants, total)))
}

pub async fn get_restaurant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Restaurant>> {
    let restaurant = sqlx::query_as::<_, Restaurant>(&format!(
        "SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(restaurant_not_found)?;

    Ok(Json(restaurant))
}

pub async fn update_restaurant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRestaurant>,
) -> ApiResult<Json<Restaurant>> {
    if let Some(tip) = input.tip {
        validate_tip(tip)?;
    }
    let phone = input.phone.as_deref().map(str::trim);
    if let Some(phone) = phone {
        validate_phone(phone)?;
    }

    let restaurant = sqlx::query_as::<_, Restaurant>(&format!(
        "UPDATE restaurants SET
            name = COALESCE($2, name),
            region_id = COALESCE($3, region_id),
            tip = COALESCE($4, tip),
            kind = COALESCE($5, kind),
            address = COALESCE($6, address),
            phone = COALESCE($7, phone),
            is_active = COALESCE($8, is_active)
         WHERE id = $1
         RETURNING {RESTAURANT_COLUMNS}"
    ))
    .bind(id)
    .bind(input.name.as_deref().map(str::trim))
    .bind(input.region_id)
    .bind(input.tip)
    .bind(input.kind.map(|kind| kind.as_str()))
    .bind(input.address.as_deref().map(str::trim))
    .bind(phone)
    .bind(input.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(restaurant_not_found)?;

    Ok(Json(restaurant))
}

pub async fn delete_restaurant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Restaurant>> {
    let restaurant = sqlx::query_as::<_, Restaurant>(&format!(
        "DELETE FROM restaurants WHERE id = $1 RETURNING {RESTAURANT_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(restaurant_not_found)?;

    Ok(Json(restaurant))
}
