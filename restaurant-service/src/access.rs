use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use common_auth::{AccessTable, AuthError, Role};
use tracing::debug;

use crate::AppState;

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const MENU_MANAGERS: &[Role] = &[Role::Admin, Role::SuperAdmin];
const ORDER_STAFF: &[Role] = &[Role::Waiter, Role::Casher];
const CASH_DESK: &[Role] = &[Role::Admin, Role::SuperAdmin, Role::Casher];
const CASH_DESK_READERS: &[Role] = &[Role::Admin, Role::SuperAdmin, Role::Casher, Role::Owner];
const DASHBOARD_VIEWERS: &[Role] = &[Role::Admin, Role::SuperAdmin, Role::Casher, Role::Waiter];

/// Access rule for every route mounted by [`crate::app::build_router`].
///
/// `PATCH /user/refresh-token` is public: the refresh token in the body is the
/// credential, so a client whose access token has expired can still renew it.
pub fn access_table() -> AccessTable {
    AccessTable::new()
        .public(Method::GET, "/")
        .public(Method::GET, "/healthz")
        .public(Method::GET, "/metrics")
        // users
        .public(Method::POST, "/user/register")
        .public(Method::POST, "/user/login")
        .public(Method::PATCH, "/user/refresh-token")
        .authenticated(Method::GET, "/user")
        .authenticated(Method::GET, "/user/:id")
        .roles(Method::PATCH, "/user/:id", ADMIN_ONLY)
        .roles(Method::DELETE, "/user/:id", ADMIN_ONLY)
        .roles(Method::PATCH, "/user/:id/role", ADMIN_ONLY)
        // restaurants
        .public(Method::GET, "/restaraunt")
        .authenticated(Method::GET, "/restaraunt/:id")
        .roles(Method::POST, "/restaraunt", ADMIN_ONLY)
        .roles(Method::PATCH, "/restaraunt/:id", ADMIN_ONLY)
        .roles(Method::DELETE, "/restaraunt/:id", ADMIN_ONLY)
        // regions
        .public(Method::GET, "/region")
        .authenticated(Method::GET, "/region/:id")
        .roles(Method::POST, "/region", ADMIN_ONLY)
        .roles(Method::PATCH, "/region/:id", ADMIN_ONLY)
        .roles(Method::DELETE, "/region/:id", ADMIN_ONLY)
        // categories
        .authenticated(Method::GET, "/category")
        .authenticated(Method::GET, "/category/:id")
        .roles(Method::POST, "/category", MENU_MANAGERS)
        .roles(Method::PATCH, "/category/:id", MENU_MANAGERS)
        .roles(Method::DELETE, "/category/:id", MENU_MANAGERS)
        // products
        .authenticated(Method::GET, "/product")
        .authenticated(Method::GET, "/product/:id")
        .roles(Method::POST, "/product", MENU_MANAGERS)
        .roles(Method::PATCH, "/product/:id", MENU_MANAGERS)
        .roles(Method::DELETE, "/product/:id", MENU_MANAGERS)
        // orders
        .authenticated(Method::GET, "/order")
        .roles(Method::POST, "/order", ORDER_STAFF)
        .roles(Method::GET, "/order/:id", ORDER_STAFF)
        .roles(Method::PATCH, "/order/:id", ORDER_STAFF)
        .roles(Method::DELETE, "/order/:id", ORDER_STAFF)
        // debts
        .roles(Method::GET, "/debt", CASH_DESK)
        .roles(Method::POST, "/debt", CASH_DESK)
        .roles(Method::GET, "/debt/:id", CASH_DESK)
        .roles(Method::PATCH, "/debt/:id", CASH_DESK)
        .roles(Method::DELETE, "/debt/:id", CASH_DESK)
        // withdrawals
        .roles(Method::GET, "/withdraw", CASH_DESK_READERS)
        .roles(Method::GET, "/withdraw/:id", CASH_DESK_READERS)
        .roles(Method::POST, "/withdraw", CASH_DESK)
        .roles(Method::PATCH, "/withdraw/:id", CASH_DESK)
        .roles(Method::DELETE, "/withdraw/:id", CASH_DESK)
        .roles(Method::GET, "/dashboard/stats", DASHBOARD_VIEWERS)
}

/// Route layer running the guard chain before any handler.
///
/// On success the verified identity is stored in the request extensions,
/// where [`common_auth::AuthContext`] picks it up without re-verifying.
pub async fn enforce_access(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    match state
        .access
        .authorize(req.method(), &path, req.headers(), &state.tokens)
    {
        Ok(Some(context)) => {
            req.extensions_mut().insert(context);
        }
        Ok(None) => {}
        Err(err) => {
            debug!(method = %req.method(), path = %path, code = err.code(), "request rejected by access guard");
            return Err(err);
        }
    }

    Ok(next.run(req).await)
}
