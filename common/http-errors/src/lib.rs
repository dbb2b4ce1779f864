use std::collections::HashSet;
use std::sync::Mutex;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error envelope returned by every resource handler.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized { code: &'static str, message: Option<String> },
    BadRequest { code: &'static str, message: Option<String> },
    NotFound { code: &'static str, message: Option<String> },
    /// A dashboard count/sum query failed; no partial figures are returned.
    Aggregation { message: Option<String> },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, message: Some(message.into()) }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound { code, message: Some(message.into()) }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::Unauthorized { code, message: Some(message.into()) }
    }

    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        tracing::error!(error = %e, "internal error");
        Self::Internal { message: None }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Aggregation { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized { code, .. }
            | ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code, .. } => code,
            ApiError::Aggregation { .. } => "aggregation_failed",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let message = match self {
            ApiError::Unauthorized { message, .. }
            | ApiError::BadRequest { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::Aggregation { message }
            | ApiError::Internal { message } => message,
        };
        let body = ErrorBody { code: error_code.into(), message };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Distinct error codes tracked as labels before collapsing into `overflow`.
pub const MAX_ERROR_CODES: usize = 40;

pub static ERROR_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    )
    .expect("valid http_errors_total definition");
    ERROR_REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

static ERROR_CODE_OVERFLOW: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "http_error_code_overflow_total",
        "Error responses whose code was folded into the overflow label",
    )
    .expect("valid overflow counter definition");
    ERROR_REGISTRY.register(Box::new(counter.clone())).ok();
    counter
});

static SEEN_CODES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn bounded_code(code: &str) -> String {
    let Ok(mut seen) = SEEN_CODES.lock() else {
        return "overflow".to_string();
    };
    if seen.contains(code) {
        return code.to_string();
    }
    if seen.len() < MAX_ERROR_CODES {
        seen.insert(code.to_string());
        return code.to_string();
    }
    ERROR_CODE_OVERFLOW.inc();
    "overflow".to_string()
}

/// Response middleware counting error responses by `X-Error-Code`.
///
/// Mount with `middleware::from_fn_with_state("service-name", track_http_errors)`.
pub async fn track_http_errors(
    State(service): State<&'static str>,
    req: Request,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        let label = bounded_code(code);
        HTTP_ERRORS_TOTAL
            .with_label_values(&[service, label.as_str(), status.as_str()])
            .inc();
    }
    resp
}
