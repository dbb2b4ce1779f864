pub mod access;
pub mod app;
pub mod category_handlers;
pub mod config;
pub mod dashboard_handlers;
pub mod db;
pub mod debt_handlers;
pub mod metrics;
pub mod order_handlers;
pub mod pagination;
pub mod product_handlers;
pub mod region_handlers;
pub mod restaurant_handlers;
pub mod seed;
pub mod user_handlers;
pub mod withdraw_handlers;

pub use app::{build_router, AppState};
