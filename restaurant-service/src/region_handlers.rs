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
use crate::pagination::{Page, Paginated, SortOrder};
use crate::AppState;

const REGION_PAGE_LIMIT: i64 = 50;
const REGION_SELECT: &str = "SELECT r.id, r.name, r.created_at,
    (SELECT COUNT(*) FROM restaurants WHERE restaurants.region_id = r.id) AS restaurant_count
    FROM regions r";

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RegionInput {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegionQuery {
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn region_not_found() -> ApiError {
    ApiError::not_found("region_not_found", "Region not found")
}

fn region_name(input: &RegionInput) -> ApiResult<&str> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("missing_field", "name is required"));
    }
    Ok(name)
}

pub async fn create_region(
    State(state): State<AppState>,
    Json(input): Json<RegionInput>,
) -> ApiResult<(StatusCode, Json<Region>)> {
    let name = region_name(&input)?;
    let region = sqlx::query_as::<_, Region>(
        "INSERT INTO regions (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(&state.db)
    .await
    .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(region)))
}

fn push_region_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &RegionQuery) {
    qb.push(" WHERE TRUE");
    if let Some(search) = contains_pattern(query.search.as_deref()) {
        qb.push(" AND r.name ILIKE ").push_bind(search).push(LIKE_ESCAPE);
    }
}

pub async fn list_regions(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> ApiResult<Json<Paginated<Region>>> {
    let page = Page::new(query.page, query.limit, REGION_PAGE_LIMIT);
    let sort = query.sort.unwrap_or(SortOrder::Asc);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM regions r");
    push_region_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select = QueryBuilder::<Postgres>::new(REGION_SELECT);
    push_region_filters(&mut select, &query);
    select
        .push(format!(" ORDER BY r.name {} LIMIT ", sort.as_sql()))
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let regions = select
        .build_query_as::<Region>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?;

    Ok(Json(page.wrap(regions, total)))
}

pub async fn get_region(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Region>> {
    let region = sqlx::query_as::<_, Region>(&format!("{REGION_SELECT} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(store_error)?
        .ok_or_else(region_not_found)?;

    Ok(Json(region))
}

pub async fn update_region(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<RegionInput>,
) -> ApiResult<Json<Region>> {
    let name = region_name(&input)?;
    let region = sqlx::query_as::<_, Region>(
        "UPDATE regions SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
    )
    .bind(id)
    .bind(name)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(region_not_found)?;

    Ok(Json(region))
}

pub async fn delete_region(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Region>> {
    let region = sqlx::query_as::<_, Region>(
        "DELETE FROM regions WHERE id = $1 RETURNING id, name, created_at",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(region_not_found)?;

    Ok(Json(region))
}
