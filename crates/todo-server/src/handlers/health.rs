//! Health check handler

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use todo_core::OpContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    store: bool,
    cache: bool,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ctx = OpContext::with_timeout(state.request_timeout);
    let report = state.service.health(&ctx).await;

    let (code, status) = if report.is_healthy() {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!(
            "Health check degraded: store={}, cache={}",
            report.store,
            report.cache
        );
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            store: report.store,
            cache: report.cache,
        }),
    )
}
