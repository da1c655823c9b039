//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Helper functions to record generation, leave and billing outcomes

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const SESSIONS_GENERATED_TOTAL: &str = "sessions_generated_total";
pub const SESSIONS_SKIPPED_LEAVE_TOTAL: &str = "sessions_skipped_leave_total";
pub const LEAVE_DECISIONS_TOTAL: &str = "leave_decisions_total";
pub const BILL_EVENTS_TOTAL: &str = "bill_events_total";
pub const PLANS_TOTAL: &str = "plans_total";
pub const LEAVE_PENDING: &str = "leave_requests_pending";

/// Install the Prometheus recorder and return a handle for rendering.
///
/// Call once during startup.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        SESSIONS_GENERATED_TOTAL,
        "Sessions created by generation runs, by mode (append/replace)"
    );
    describe_counter!(
        SESSIONS_SKIPPED_LEAVE_TOTAL,
        "Candidate session dates dropped because the trainer was on approved leave"
    );
    describe_counter!(LEAVE_DECISIONS_TOTAL, "Leave requests resolved, by outcome");
    describe_counter!(BILL_EVENTS_TOTAL, "Bills created or moved, by resulting status");
    describe_gauge!(PLANS_TOTAL, "Number of training plans");
    describe_gauge!(LEAVE_PENDING, "Leave requests waiting for a decision");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Metrics not initialized".to_string(),
        ),
    }
}

async fn update_gauge_metrics(state: &AppState) {
    if let Ok(count) = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM plans")
        .fetch_one(&state.db)
        .await
    {
        gauge!(PLANS_TOTAL).set(count as f64);
    }

    if let Ok(count) =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leave_requests WHERE status = 'Pending'")
            .fetch_one(&state.db)
            .await
    {
        gauge!(LEAVE_PENDING).set(count as f64);
    }
}

/// Middleware to track HTTP request metrics.
///
/// Records:
/// - `http_requests_total` counter with method, path, and status labels
/// - `http_request_duration_seconds` histogram with method and path labels
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();

    // Matched path keeps ids out of the labels (/api/plans/:id)
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let method = request.method().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

fn generation_mode(replace_existing: bool) -> &'static str {
    if replace_existing {
        "replace"
    } else {
        "append"
    }
}

/// Record the outcome of one generation run.
pub fn record_generation(replace_existing: bool, created: usize, skipped_for_leave: usize) {
    let mode = generation_mode(replace_existing);
    counter!(SESSIONS_GENERATED_TOTAL, "mode" => mode).increment(created as u64);
    counter!(SESSIONS_SKIPPED_LEAVE_TOTAL).increment(skipped_for_leave as u64);
}

/// Record a resolved leave request.
pub fn record_leave_decision(status: &str) {
    counter!(LEAVE_DECISIONS_TOTAL, "status" => status.to_string()).increment(1);
}

/// Record a bill reaching `status` (creation counts as `Pending`).
pub fn record_bill_event(status: &str) {
    counter!(BILL_EVENTS_TOTAL, "status" => status.to_string()).increment(1);
}
