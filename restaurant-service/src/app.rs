use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use common_auth::{AccessTable, TokenService};
use common_http_errors::{track_http_errors, ApiError};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::access::{access_table, enforce_access};
use crate::config::ServiceConfig;
use crate::metrics::ServiceMetrics;
use crate::{
    category_handlers, dashboard_handlers, debt_handlers, order_handlers, product_handlers,
    region_handlers, restaurant_handlers, user_handlers, withdraw_handlers,
};

pub const SERVICE_NAME: &str = "restaurant-service";

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub tokens: Arc<TokenService>,
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<ServiceMetrics>,
    pub access: Arc<AccessTable>,
}

impl AppState {
    pub fn new(db: PgPool, config: ServiceConfig) -> anyhow::Result<Self> {
        let tokens = TokenService::new(&config.tokens)?;
        Ok(Self {
            db,
            tokens: Arc::new(tokens),
            config: Arc::new(config),
            metrics: Arc::new(ServiceMetrics::new()?),
            access: Arc::new(access_table()),
        })
    }

    pub fn record_login_metric(&self, outcome: &str) {
        self.metrics.login_attempt(outcome);
    }

    pub fn record_refresh_metric(&self, outcome: &str) {
        self.metrics.token_refresh(outcome);
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

async fn root() -> &'static str {
    "Restaurant service is running"
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(resp) => resp,
        Err(err) => ApiError::internal(err).into_response(),
    }
}

fn cors_layer(config: &ServiceConfig) -> CorsLayer {
    let origins = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, ?err, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/dashboard/stats", get(dashboard_handlers::get_stats))
        .route("/user", get(user_handlers::list_users))
        .route("/user/register", post(user_handlers::register))
        .route("/user/login", post(user_handlers::login))
        .route("/user/refresh-token", patch(user_handlers::refresh_token))
        .route(
            "/user/:id",
            get(user_handlers::get_user)
                .patch(user_handlers::update_user)
                .delete(user_handlers::delete_user),
        )
        .route("/user/:id/role", patch(user_handlers::promote_to_admin))
        .route(
            "/restaraunt",
            get(restaurant_handlers::list_restaurants).post(restaurant_handlers::create_restaurant),
        )
        .route(
            "/restaraunt/:id",
            get(restaurant_handlers::get_restaurant)
                .patch(restaurant_handlers::update_restaurant)
                .delete(restaurant_handlers::delete_restaurant),
        )
        .route(
            "/region",
            get(region_handlers::list_regions).post(region_handlers::create_region),
        )
        .route(
            "/region/:id",
            get(region_handlers::get_region)
                .patch(region_handlers::update_region)
                .delete(region_handlers::delete_region),
        )
        .route(
            "/category",
            get(category_handlers::list_categories).post(category_handlers::create_category),
        )
        .route(
            "/category/:id",
            get(category_handlers::get_category)
                .patch(category_handlers::update_category)
                .delete(category_handlers::delete_category),
        )
        .route(
            "/product",
            get(product_handlers::list_products).post(product_handlers::create_product),
        )
        .route(
            "/product/:id",
            get(product_handlers::get_product)
                .patch(product_handlers::update_product)
                .delete(product_handlers::delete_product),
        )
        .route(
            "/order",
            get(order_handlers::list_orders).post(order_handlers::create_order),
        )
        .route(
            "/order/:id",
            get(order_handlers::get_order)
                .patch(order_handlers::update_order)
                .delete(order_handlers::delete_order),
        )
        .route(
            "/debt",
            get(debt_handlers::list_debts).post(debt_handlers::create_debt),
        )
        .route(
            "/debt/:id",
            get(debt_handlers::get_debt)
                .patch(debt_handlers::update_debt)
                .delete(debt_handlers::delete_debt),
        )
        .route(
            "/withdraw",
            get(withdraw_handlers::list_withdraws).post(withdraw_handlers::create_withdraw),
        )
        .route(
            "/withdraw/:id",
            get(withdraw_handlers::get_withdraw)
                .patch(withdraw_handlers::update_withdraw)
                .delete(withdraw_handlers::delete_withdraw),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_access))
        .with_state(state)
        .layer(middleware::from_fn_with_state(SERVICE_NAME, track_http_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
