use async_trait::async_trait;
use axum::{extract::State, Json};
use bigdecimal::BigDecimal;
use common_http_errors::{ApiError, ApiResult};
use common_money::{net_profit, to_f64};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, error};

use crate::AppState;

/// Row counts reported on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCount {
    Users,
    Restaurants,
    Products,
    Orders,
    PendingOrders,
}

impl StatCount {
    fn sql(&self) -> &'static str {
        match self {
            StatCount::Users => "SELECT COUNT(*) FROM users",
            StatCount::Restaurants => "SELECT COUNT(*) FROM restaurants",
            StatCount::Products => "SELECT COUNT(*) FROM products",
            StatCount::Orders => "SELECT COUNT(*) FROM orders",
            StatCount::PendingOrders => "SELECT COUNT(*) FROM orders WHERE status = 'PENDING'",
        }
    }
}

#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn count(&self, stat: StatCount) -> Result<i64, sqlx::Error>;
    /// Sum of all order totals; `None` when there are no orders.
    async fn revenue(&self) -> Result<Option<BigDecimal>, sqlx::Error>;
}

#[async_trait]
impl StatsSource for PgPool {
    async fn count(&self, stat: StatCount) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(stat.sql()).fetch_one(self).await
    }

    async fn revenue(&self) -> Result<Option<BigDecimal>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<BigDecimal>>("SELECT SUM(total) FROM orders")
            .fetch_one(self)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
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

/// Run every dashboard query concurrently. A single failure discards all
/// results.
pub async fn aggregate<S: StatsSource + ?Sized>(source: &S) -> ApiResult<DashboardStats> {
    let joined = tokio::try_join!(
        source.count(StatCount::Users),
        source.count(StatCount::Restaurants),
        source.count(StatCount::Products),
        source.count(StatCount::Orders),
        source.count(StatCount::PendingOrders),
        source.revenue(),
    );

    let (total_users, total_restaurants, total_products, total_orders, pending_orders, revenue) =
        joined.map_err(|err| {
            error!(error = ?err, "dashboard aggregation failed");
            ApiError::Aggregation {
                message: Some("Failed to load dashboard stats".to_string()),
            }
        })?;

    let total_revenue = revenue.as_ref().map(to_f64).unwrap_or(0.0);
    let net_profit = net_profit(total_revenue) as i64;
    debug!(total_revenue, net_profit, "dashboard stats computed");

    Ok(DashboardStats {
        total_users,
        total_restaurants,
        total_products,
        total_orders,
        pending_orders,
        total_revenue,
        net_profit,
    })
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    aggregate(&state.db).await.map(Json)
}
