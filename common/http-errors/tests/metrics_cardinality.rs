use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{middleware, routing::get, Router};
use common_http_errors::{track_http_errors, ApiError, ERROR_REGISTRY, MAX_ERROR_CODES};
use tower::ServiceExt;

static DYNAMIC_COUNTER: AtomicUsize = AtomicUsize::new(0);

// Emits a different error code on every call.
async fn dyn_error() -> Result<&'static str, ApiError> {
    let n = DYNAMIC_COUNTER.fetch_add(1, Ordering::Relaxed);
    let code = format!("dyn_code_{n}");
    Err(ApiError::BadRequest { code: Box::leak(code.into_boxed_str()), message: None })
}

#[tokio::test]
async fn error_code_cardinality_guard_caps_labels() {
    let app = Router::new()
        .route("/err", get(dyn_error))
        .layer(middleware::from_fn_with_state("test-svc", track_http_errors));

    let total = MAX_ERROR_CODES + 10;
    for _ in 0..total {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/err").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let families = ERROR_REGISTRY.gather();
    let errors = families
        .iter()
        .find(|family| family.get_name() == "http_errors_total")
        .expect("http_errors_total registered");
    assert!(errors.get_metric().len() <= MAX_ERROR_CODES + 1);

    let overflow = families
        .iter()
        .find(|family| family.get_name() == "http_error_code_overflow_total")
        .expect("overflow counter registered");
    assert!(overflow.get_metric()[0].get_counter().get_value() >= 1.0);
}
