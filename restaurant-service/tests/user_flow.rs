mod support;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common_auth::Role;
use serde_json::json;
use support::{json_body, router, send, test_state, unique_phone, TestDatabase};

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "requires RESTAURANT_TEST_DATABASE_URL")]
async fn duplicate_phone_registration_fails_and_creates_no_record() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let app = router(test_state(pool.clone()));
    let phone = unique_phone();

    let body = json!({
        "name": "Dilshod",
        "phone": phone,
        "password": "secret-1",
        "role": "WAITER",
        "restaurantId": "",
        "regionId": ""
    });

    let first = send(&app, Method::POST, "/user/register", None, Some(body.clone())).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let created = json_body(first).await;
    assert!(created["access_token"].is_string());
    assert!(created["refresh_token"].is_string());
    assert_eq!(created["user"]["role"], "WAITER");
    assert!(created["user"].get("passwordHash").is_none());

    let second = send(&app, Method::POST, "/user/register", None, Some(body)).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(second.headers().get("X-Error-Code").unwrap(), "phone_taken");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE phone = $1")
        .bind(&phone)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "requires RESTAURANT_TEST_DATABASE_URL")]
async fn login_checks_password_and_promotion_changes_future_tokens() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let state = test_state(db.pool_clone());
    let tokens = state.tokens.clone();
    let app = router(state);
    let phone = unique_phone();

    let registered = send(
        &app,
        Method::POST,
        "/user/register",
        None,
        Some(json!({ "name": "Malika", "phone": phone, "password": "pa55", "role": "CASHER" })),
    )
    .await;
    assert_eq!(registered.status(), StatusCode::CREATED);
    let registered = json_body(registered).await;
    let user_id = registered["user"]["id"].as_str().unwrap().to_string();
    let old_access = registered["access_token"].as_str().unwrap().to_string();

    let wrong = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({ "phone": phone, "password": "nope" })),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);

    let unknown = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({ "phone": "+998000000000", "password": "pa55" })),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    // Only admins may promote.
    let casher_bearer = format!("Bearer {old_access}");
    let denied = send(
        &app,
        Method::PATCH,
        &format!("/user/{user_id}/role"),
        Some(&casher_bearer),
        None,
    )
    .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let admin_bearer = support::bearer_for(&test_state(db.pool_clone()), Role::Admin);
    let promoted = send(
        &app,
        Method::PATCH,
        &format!("/user/{user_id}/role"),
        Some(&admin_bearer),
        None,
    )
    .await;
    assert_eq!(promoted.status(), StatusCode::OK);
    assert_eq!(json_body(promoted).await["role"], "ADMIN");

    // Tokens issued before the promotion keep the old role.
    assert_eq!(tokens.verify_access_token(&old_access)?.role, Role::Casher);

    let login = send(
        &app,
        Method::POST,
        "/user/login",
        None,
        Some(json!({ "phone": phone, "password": "pa55" })),
    )
    .await;
    assert_eq!(login.status(), StatusCode::OK);
    let login = json_body(login).await;
    let fresh = login["access_token"].as_str().unwrap();
    assert_eq!(tokens.verify_access_token(fresh)?.role, Role::Admin);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(feature = "integration"), ignore = "requires RESTAURANT_TEST_DATABASE_URL")]
async fn order_snapshots_prices_and_feeds_dashboard() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let state = test_state(db.pool_clone());
    let admin = support::bearer_for(&state, Role::Admin);
    let app = router(state);

    let region = send(
        &app,
        Method::POST,
        "/region",
        Some(&admin),
        Some(json!({ "name": format!("Region {}", uuid::Uuid::new_v4()) })),
    )
    .await;
    assert_eq!(region.status(), StatusCode::CREATED);
    let region_id = json_body(region).await["id"].as_str().unwrap().to_string();

    let restaurant = send(
        &app,
        Method::POST,
        "/restaraunt",
        Some(&admin),
        Some(json!({
            "name": "Navro'z",
            "regionId": region_id,
            "tip": 12,
            "type": "RESTAURANT",
            "address": "Navoiy 10",
            "phone": "+998711234567",
            "isActive": true
        })),
    )
    .await;
    assert_eq!(restaurant.status(), StatusCode::CREATED);
    let restaurant_id = json_body(restaurant).await["id"].as_str().unwrap().to_string();

    let category = send(
        &app,
        Method::POST,
        "/category",
        Some(&admin),
        Some(json!({ "name": "Issiq taomlar", "restaurantId": restaurant_id })),
    )
    .await;
    assert_eq!(category.status(), StatusCode::CREATED);
    let category_id = json_body(category).await["id"].as_str().unwrap().to_string();

    let product = send(
        &app,
        Method::POST,
        "/product",
        Some(&admin),
        Some(json!({
            "name": "Osh",
            "price": "30000",
            "categoryId": category_id,
            "restaurantId": restaurant_id
        })),
    )
    .await;
    assert_eq!(product.status(), StatusCode::CREATED);
    let product_id = json_body(product).await["id"].as_str().unwrap().to_string();

    // The waiter must exist because orders reference the caller.
    let waiter = send(
        &app,
        Method::POST,
        "/user/register",
        None,
        Some(json!({ "name": "Javlon", "phone": unique_phone(), "password": "w", "role": "WAITER" })),
    )
    .await;
    let waiter = json_body(waiter).await;
    let waiter_bearer = format!("Bearer {}", waiter["access_token"].as_str().unwrap());

    let order = send(
        &app,
        Method::POST,
        "/order",
        Some(&waiter_bearer),
        Some(json!({
            "table": "7",
            "restaurantId": restaurant_id,
            "orderItems": [{ "productId": product_id, "quantity": 2 }]
        })),
    )
    .await;
    assert_eq!(order.status(), StatusCode::CREATED);
    let order = json_body(order).await;
    assert_eq!(order["total"], "60000.00");
    assert_eq!(order["waiterId"], waiter["user"]["id"]);
    assert_eq!(order["orderItems"][0]["price"], "30000.00");

    let stats = send(&app, Method::GET, "/dashboard/stats", Some(&waiter_bearer), None).await;
    assert_eq!(stats.status(), StatusCode::OK);
    let stats = json_body(stats).await;
    assert!(stats["totalOrders"].as_i64().unwrap() >= 1);
    assert!(stats["pendingOrders"].as_i64().unwrap() >= 1);
    assert!(stats["totalRevenue"].as_f64().unwrap() >= 60000.0);
    Ok(())
}
