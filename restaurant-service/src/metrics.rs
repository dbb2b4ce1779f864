use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use common_http_errors::ERROR_REGISTRY;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    token_refreshes: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let token_refreshes = IntCounterVec::new(
            Opts::new(
                "auth_token_refresh_total",
                "Count of access-token refresh requests grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(token_refreshes.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            token_refreshes,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn token_refresh(&self, outcome: &str) {
        self.token_refreshes.with_label_values(&[outcome]).inc();
    }

    /// Text exposition of this service's counters followed by the shared
    /// HTTP error counters.
    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let mut metric_families = self.registry.gather();
        metric_families.extend(ERROR_REGISTRY.gather());
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
