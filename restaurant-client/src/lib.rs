//! Typed client for the restaurant API with bearer injection and
//! refresh-on-401.

pub mod client;
pub mod error;
pub mod models;
pub mod resources;

pub use client::ApiClient;
pub use error::{ClientError, ClientResult, ErrorBody};
pub use models::{
    DashboardStats, LoginRequest, PageMeta, PageQuery, Paginated, RegisterRequest, Session, User,
};
pub use resources::Resource;
