mod support;

use axum::http::{Method, StatusCode};
use common_auth::{Role, TokenSubject};
use serde_json::json;
use support::{bearer_for, json_body, offline_state, router, send};
use uuid::Uuid;

#[tokio::test]
async fn health_is_public() {
    let app = router(offline_state());
    let resp = send(&app, Method::GET, "/healthz", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_route_without_header_is_unauthorized() {
    let app = router(offline_state());
    let resp = send(&app, Method::GET, "/dashboard/stats", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "auth_header");
}

#[tokio::test]
async fn malformed_bearer_is_unauthorized() {
    let app = router(offline_state());
    let resp = send(&app, Method::GET, "/user", Some("Token abc"), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_violation_is_unauthorized_before_any_store_access() {
    let state = offline_state();
    let bearer = bearer_for(&state, Role::Waiter);
    let app = router(state);

    let resp = send(
        &app,
        Method::POST,
        "/debt",
        Some(&bearer),
        Some(json!({ "restaurantId": Uuid::new_v4(), "client": "Ali", "amount": 10 })),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_role");
    let body = json_body(resp).await;
    assert_eq!(
        body["message"],
        "You need one of these roles: ADMIN, SUPER_ADMIN, CASHER"
    );
}

#[tokio::test]
async fn owner_is_rejected_from_dashboard() {
    let state = offline_state();
    let bearer = bearer_for(&state, Role::Owner);
    let app = router(state);
    let resp = send(&app, Method::GET, "/dashboard/stats", Some(&bearer), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn allowed_role_reaches_the_handler() {
    let state = offline_state();
    let bearer = bearer_for(&state, Role::Casher);
    let app = router(state);

    // The handler runs and fails on the unreachable store.
    let resp = send(&app, Method::GET, "/dashboard/stats", Some(&bearer), None).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "aggregation_failed");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let state = offline_state();
    let pair = state
        .tokens
        .issue_token_pair(TokenSubject {
            id: Uuid::new_v4(),
            role: Role::Admin,
        })
        .unwrap();
    let app = router(state);

    let bearer = format!("Bearer {}", pair.refresh_token);
    let resp = send(&app, Method::GET, "/user", Some(&bearer), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "auth_token");
}

#[tokio::test]
async fn refresh_endpoint_issues_access_token_with_same_identity() {
    let state = offline_state();
    let subject = TokenSubject {
        id: Uuid::new_v4(),
        role: Role::Casher,
    };
    let pair = state.tokens.issue_token_pair(subject).unwrap();
    let tokens = state.tokens.clone();
    let app = router(state);

    let resp = send(
        &app,
        Method::PATCH,
        "/user/refresh-token",
        None,
        Some(json!({ "refresh_token": pair.refresh_token })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    let access = body["access_token"].as_str().expect("access_token");
    let claims = tokens.verify_access_token(access).expect("valid access token");
    assert_eq!(claims.id, subject.id);
    assert_eq!(claims.role, Role::Casher);
}

#[tokio::test]
async fn refresh_endpoint_rejects_access_token() {
    let state = offline_state();
    let pair = state
        .tokens
        .issue_token_pair(TokenSubject {
            id: Uuid::new_v4(),
            role: Role::Waiter,
        })
        .unwrap();
    let app = router(state);

    let resp = send(
        &app,
        Method::PATCH,
        "/user/refresh-token",
        None,
        Some(json!({ "refresh_token": pair.access_token })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("X-Error-Code").unwrap(),
        "invalid_refresh_token"
    );
    let body = json_body(resp).await;
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn refresh_endpoint_ignores_stale_access_token() {
    let state = offline_state();
    let pair = state
        .tokens
        .issue_token_pair(TokenSubject {
            id: Uuid::new_v4(),
            role: Role::Owner,
        })
        .unwrap();
    let app = router(state);

    let resp = send(
        &app,
        Method::PATCH,
        "/user/refresh-token",
        Some("Bearer no-longer-valid"),
        Some(json!({ "refresh_token": pair.refresh_token })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn metrics_count_rejected_requests() {
    let app = router(offline_state());
    let _ = send(&app, Method::GET, "/withdraw", None, None).await;

    let resp = send(&app, Method::GET, "/metrics", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = http_body_util::BodyExt::collect(resp.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("http_errors_total"));
}
