//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Every handler
//! only reads the catalog.

use super::{
    AppState,
    types::{
        DEFAULT_PAGE_LIMIT, DEFAULT_TOP_N, HealthResponse, RecordResponse, RecordsQuery,
        RecordsResponse, SummaryQuery, SummaryResponse, TopQuery,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use neoguard_core::{NeoError, NeoId, primitives::MAX_PAGE_SIZE};

/// HTTP status for a failed catalog read.
fn error_status(error: &NeoError) -> StatusCode {
    match error {
        NeoError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        NeoError::InvalidConfig(_) | NeoError::DeserializationError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// SUMMARY HANDLER
// =============================================================================

/// Portfolio KPIs, with an optional `tolerance` override.
pub async fn summary_handler(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let tolerance = query.tolerance.unwrap_or(state.risk_tolerance);
    if !tolerance.is_finite() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SummaryResponse::error("tolerance must be a finite number")),
        );
    }

    let catalog = state.catalog.read().await;
    match catalog.summary(tolerance) {
        Ok(summary) => (StatusCode::OK, Json(SummaryResponse::success(summary))),
        Err(e) => (
            error_status(&e),
            Json(SummaryResponse::error(format!("Summary failed: {}", e))),
        ),
    }
}

// =============================================================================
// RECORDS HANDLERS
// =============================================================================

/// Paged records, optionally filtered by decision.
pub async fn records_handler(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> impl IntoResponse {
    let status = match query.status_filter() {
        Ok(status) => status,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RecordsResponse::error(format!("Invalid status: {}", e))),
            );
        }
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let catalog = state.catalog.read().await;
    match catalog.page(status, offset, limit) {
        Ok(page) => (StatusCode::OK, Json(RecordsResponse::from_page(&page))),
        Err(e) => (
            error_status(&e),
            Json(RecordsResponse::error(format!("Read failed: {}", e))),
        ),
    }
}

/// Highest-risk records first.
pub async fn top_handler(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> impl IntoResponse {
    let n = query.n.unwrap_or(DEFAULT_TOP_N).min(MAX_PAGE_SIZE);

    let catalog = state.catalog.read().await;
    match catalog.top(n) {
        Ok(records) => (StatusCode::OK, Json(RecordsResponse::ranked(&records, n))),
        Err(e) => (
            error_status(&e),
            Json(RecordsResponse::error(format!("Read failed: {}", e))),
        ),
    }
}

/// One record by NEO id.
pub async fn record_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let Some(id) = NeoId::parse(&raw_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(RecordResponse::error(format!("Invalid id: {}", raw_id))),
        );
    };

    let catalog = state.catalog.read().await;
    match catalog.record(id) {
        Ok(record) => (StatusCode::OK, Json(RecordResponse::success(&record))),
        Err(e) => (error_status(&e), Json(RecordResponse::error(e.to_string()))),
    }
}
