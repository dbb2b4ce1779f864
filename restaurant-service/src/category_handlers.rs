use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::{contains_pattern, LIKE_ESCAPE, store_error};
use crate::pagination::{Page, Paginated, SortOrder, DEFAULT_LIMIT};
use crate::AppState;

const CATEGORY_COLUMNS: &str = "id, name, restaurant_id, is_active, created_at";

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub restaurant_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub restaurant_id: Uuid,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub restaurant_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    pub name: Option<String>,
    pub restaurant_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn category_not_found() -> ApiError {
    ApiError::not_found("category_not_found", "Category not found")
}

/// Store failures on create surface their own message.
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<NewCategory>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "INSERT INTO categories (id, name, restaurant_id, is_active)
         VALUES ($1, $2, $3, $4)
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.name.trim())
    .bind(input.restaurant_id)
    .bind(input.is_active)
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::bad_request("category_create_failed", err.to_string()))?;

    Ok((StatusCode::CREATED, Json(category)))
}

fn push_category_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &CategoryQuery) {
    qb.push(" WHERE TRUE");
    if let Some(name) = contains_pattern(query.name.as_deref()) {
        qb.push(" AND name ILIKE ").push_bind(name).push(LIKE_ESCAPE);
    }
    if let Some(restaurant_id) = query.restaurant_id {
        qb.push(" AND restaurant_id = ").push_bind(restaurant_id);
    }
    if let Some(is_active) = query.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<Json<Paginated<Category>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
    let sort = query.sort.unwrap_or(SortOrder::Asc);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM categories");
    push_category_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select =
        QueryBuilder::<Postgres>::new(format!("SELECT {CATEGORY_COLUMNS} FROM categories"));
    push_category_filters(&mut select, &query);
    select
        .push(format!(" ORDER BY name {} LIMIT ", sort.as_sql()))
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let categories = select
        .build_query_as::<Category>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?;

    Ok(Json(page.wrap(categories, total)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Category>> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(category_not_found)?;

    Ok(Json(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCategory>,
) -> ApiResult<Json<Category>> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "UPDATE categories SET
            name = COALESCE($2, name),
            restaurant_id = COALESCE($3, restaurant_id),
            is_active = COALESCE($4, is_active)
         WHERE id = $1
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id)
    .bind(input.name.as_deref().map(str::trim))
    .bind(input.restaurant_id)
    .bind(input.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(category_not_found)?;

    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Category>> {
    let category = sqlx::query_as::<_, Category>(&format!(
        "DELETE FROM categories WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(category_not_found)?;

    Ok(Json(category))
}
