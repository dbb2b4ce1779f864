use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use common_money::line_total;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::db::store_error;
use crate::pagination::{Page, Paginated, SortOrder, DEFAULT_LIMIT};
use crate::AppState;

const ORDER_COLUMNS: &str = "id, table_number, restaurant_id, waiter_id, status, total, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Debt,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Debt => "DEBT",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: BigDecimal,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    #[serde(rename = "table")]
    pub table_number: String,
    pub restaurant_id: Uuid,
    pub waiter_id: Option<Uuid>,
    pub status: String,
    pub total: BigDecimal,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub order_items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub table: String,
    pub restaurant_id: Uuid,
    pub order_items: Vec<NewOrderItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrder {
    pub table: Option<String>,
    pub restaurant_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    /// Replaces every line of the order when present.
    pub order_items: Option<Vec<NewOrderItem>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub restaurant_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One order line with the product price captured at order time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: BigDecimal,
}

fn order_not_found() -> ApiError {
    ApiError::not_found("order_not_found", "Order not found")
}

pub(crate) fn validate_items(items: &[NewOrderItem]) -> ApiResult<()> {
    if items.is_empty() {
        return Err(ApiError::bad_request(
            "empty_order",
            "Order must contain at least one item",
        ));
    }
    if let Some(item) = items.iter().find(|item| item.quantity <= 0) {
        return Err(ApiError::bad_request(
            "invalid_quantity",
            format!("Quantity for product {} must be positive", item.product_id),
        ));
    }
    Ok(())
}

/// Attach current prices to each requested line and compute the order total.
pub(crate) fn price_lines(
    items: &[NewOrderItem],
    prices: &HashMap<Uuid, BigDecimal>,
) -> ApiResult<(Vec<PricedLine>, BigDecimal)> {
    let lines = items
        .iter()
        .map(|item| {
            prices
                .get(&item.product_id)
                .map(|price| PricedLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: price.clone(),
                })
                .ok_or_else(|| {
                    ApiError::bad_request(
                        "unknown_product",
                        format!("Product {} not found", item.product_id),
                    )
                })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    let total = line_total(lines.iter().map(|line| (&line.price, line.quantity)));
    Ok((lines, total))
}

async fn snapshot_prices(
    conn: &mut PgConnection,
    items: &[NewOrderItem],
) -> ApiResult<(Vec<PricedLine>, BigDecimal)> {
    let ids = items.iter().map(|item| item.product_id).collect::<Vec<_>>();
    let prices = sqlx::query_as::<_, (Uuid, BigDecimal)>(
        "SELECT id, price FROM products WHERE id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(store_error)?
    .into_iter()
    .collect::<HashMap<_, _>>();

    price_lines(items, &prices)
}

async fn insert_lines(
    conn: &mut PgConnection,
    order_id: Uuid,
    lines: &[PricedLine],
) -> ApiResult<Vec<OrderItem>> {
    let mut inserted = Vec::with_capacity(lines.len());
    for line in lines {
        let item = sqlx::query_as::<_, OrderItem>(
            "INSERT INTO order_items (id, order_id, product_id, quantity, price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, order_id, product_id, quantity, price",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(&line.price)
        .fetch_one(&mut *conn)
        .await
        .map_err(store_error)?;
        inserted.push(item);
    }
    Ok(inserted)
}

async fn load_items(db: &PgPool, order_ids: &[Uuid]) -> ApiResult<HashMap<Uuid, Vec<OrderItem>>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, quantity, price
         FROM order_items WHERE order_id = ANY($1)",
    )
    .bind(order_ids)
    .fetch_all(db)
    .await
    .map_err(store_error)?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
}

/// Creates the order, its lines and the total in one transaction. The caller
/// is recorded as the waiter.
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(input): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    validate_items(&input.order_items)?;
    let table = input.table.trim();
    if table.is_empty() {
        return Err(ApiError::bad_request("missing_field", "table is required"));
    }

    let mut tx = state.db.begin().await.map_err(store_error)?;
    let (lines, total) = snapshot_prices(&mut tx, &input.order_items).await?;

    let mut order = sqlx::query_as::<_, Order>(&format!(
        "INSERT INTO orders (id, table_number, restaurant_id, waiter_id, status, total)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(table)
    .bind(input.restaurant_id)
    .bind(auth.user_id())
    .bind(OrderStatus::Pending.as_str())
    .bind(&total)
    .fetch_one(&mut *tx)
    .await
    .map_err(store_error)?;

    order.order_items = insert_lines(&mut tx, order.id, &lines).await?;
    tx.commit().await.map_err(store_error)?;

    info!(order_id = %order.id, waiter_id = %auth.user_id(), total = %order.total, "order created");
    Ok((StatusCode::CREATED, Json(order)))
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &OrderQuery) {
    qb.push(" WHERE TRUE");
    if let Some(restaurant_id) = query.restaurant_id {
        qb.push(" AND o.restaurant_id = ").push_bind(restaurant_id);
    }
    if query.product_id.is_some() || query.quantity.is_some() {
        qb.push(" AND EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.id");
        if let Some(product_id) = query.product_id {
            qb.push(" AND i.product_id = ").push_bind(product_id);
        }
        if let Some(quantity) = query.quantity {
            qb.push(" AND i.quantity = ").push_bind(quantity);
        }
        qb.push(")");
    }
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<Paginated<Order>>> {
    let page = Page::new(query.page, query.limit, DEFAULT_LIMIT);
    let sort = query.sort.unwrap_or(SortOrder::Desc);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
    push_order_filters(&mut count, &query);
    let total: i64 = count
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(store_error)?;

    let mut select = QueryBuilder::<Postgres>::new(
        "SELECT o.id, o.table_number, o.restaurant_id, o.waiter_id, o.status, o.total, o.created_at FROM orders o",
    );
    push_order_filters(&mut select, &query);
    select
        .push(format!(" ORDER BY o.created_at {} LIMIT ", sort.as_sql()))
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let mut orders = select
        .build_query_as::<Order>()
        .fetch_all(&state.db)
        .await
        .map_err(store_error)?;

    let ids = orders.iter().map(|order| order.id).collect::<Vec<_>>();
    let mut items = load_items(&state.db, &ids).await?;
    for order in &mut orders {
        order.order_items = items.remove(&order.id).unwrap_or_default();
    }

    Ok(Json(page.wrap(orders, total)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let mut order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(order_not_found)?;

    order.order_items = load_items(&state.db, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(Json(order))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateOrder>,
) -> ApiResult<Json<Order>> {
    if let Some(items) = &input.order_items {
        validate_items(items)?;
    }

    let mut tx = state.db.begin().await.map_err(store_error)?;

    let repriced = match &input.order_items {
        Some(items) => Some(snapshot_prices(&mut tx, items).await?),
        None => None,
    };
    let new_total = repriced.as_ref().map(|(_, total)| total.clone());

    let mut order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET
            table_number = COALESCE($2, table_number),
            restaurant_id = COALESCE($3, restaurant_id),
            status = COALESCE($4, status),
            total = COALESCE($5, total)
         WHERE id = $1
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(input.table.as_deref().map(str::trim))
    .bind(input.restaurant_id)
    .bind(input.status.map(|status| status.as_str()))
    .bind(new_total)
    .fetch_optional(&mut *tx)
    .await
    .map_err(store_error)?
    .ok_or_else(order_not_found)?;

    if let Some((lines, _)) = repriced {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        order.order_items = insert_lines(&mut tx, id, &lines).await?;
    } else {
        order.order_items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, quantity, price FROM order_items WHERE order_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(store_error)?;
    }

    tx.commit().await.map_err(store_error)?;
    Ok(Json(order))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "DELETE FROM orders WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(store_error)?
    .ok_or_else(order_not_found)?;

    info!(order_id = %id, "order deleted");
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(product_id: Uuid, quantity: i32) -> NewOrderItem {
        NewOrderItem {
            product_id,
            quantity,
        }
    }

    #[test]
    fn empty_orders_are_rejected() {
        assert_eq!(validate_items(&[]).unwrap_err().code(), "empty_order");
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = validate_items(&[item(Uuid::new_v4(), 0)]).unwrap_err();
        assert_eq!(err.code(), "invalid_quantity");
    }

    #[test]
    fn lines_snapshot_prices_and_total() {
        let plov = Uuid::new_v4();
        let tea = Uuid::new_v4();
        let prices = HashMap::from([
            (plov, BigDecimal::from_str("35000").unwrap()),
            (tea, BigDecimal::from_str("4500.50").unwrap()),
        ]);

        let (lines, total) = price_lines(&[item(plov, 2), item(tea, 3)], &prices).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].price, BigDecimal::from_str("4500.50").unwrap());
        assert_eq!(total.to_string(), "83501.50");
    }

    #[test]
    fn unknown_product_is_bad_request() {
        let err = price_lines(&[item(Uuid::new_v4(), 1)], &HashMap::new()).unwrap_err();
        assert_eq!(err.code(), "unknown_product");
    }

    #[test]
    fn order_serializes_table_field() {
        let order = Order {
            id: Uuid::nil(),
            table_number: "A-4".into(),
            restaurant_id: Uuid::nil(),
            waiter_id: None,
            status: OrderStatus::Pending.as_str().into(),
            total: BigDecimal::from(0),
            created_at: Utc::now(),
            order_items: Vec::new(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["table"], "A-4");
        assert_eq!(json["status"], "PENDING");
        assert!(json["orderItems"].as_array().unwrap().is_empty());
    }
}
