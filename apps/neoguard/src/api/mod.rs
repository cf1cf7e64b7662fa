//! # neoguard HTTP API Module
//!
//! Read-only HTTP API for the dashboard, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /summary?tolerance=` - Portfolio KPIs
//! - `GET /records?status=&limit=&offset=` - Paged enriched records
//! - `GET /records/top?n=` - Highest-risk records
//! - `GET /records/{id}` - One record
//!
//! ## Limits
//!
//! Allowed origins and the request rate come from the `[server]` settings
//! section (see [`crate::settings::ServerSection`]).

mod handlers;
mod middleware;
mod types;

pub use handlers::{
    health_handler, record_handler, records_handler, summary_handler, top_handler,
};
pub use middleware::Throttle;
pub use types::{
    DEFAULT_PAGE_LIMIT, DEFAULT_TOP_N, ErrorResponse, HealthResponse, RecordJson, RecordResponse,
    RecordsQuery, RecordsResponse, SummaryQuery, SummaryResponse, TopQuery,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use crate::settings::{ServerSection, Settings};
use neoguard_core::{Catalog, NeoError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the stored catalog.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<Catalog>>,
    /// Default `tolerance` for `/summary`.
    pub risk_tolerance: f64,
}

impl AppState {
    #[must_use]
    pub fn new(catalog: Catalog, risk_tolerance: f64) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            risk_tolerance,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// CORS for the configured origins.
///
/// No origins means the local dashboard ports only; `"*"` anywhere in the
/// list allows every origin. Unparseable origins are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        tracing::warn!("CORS: allowing every origin");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "CORS: skipping invalid origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::info!("CORS: localhost only");
        build_localhost_cors()
    } else {
        tracing::info!(origins = allowed.len(), "CORS: configured origins");
        read_only_cors(allowed)
    }
}

/// Restrictive CORS layer for the usual local dashboard ports.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://localhost:8501",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
        "http://127.0.0.1:8501",
    ]
    .iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    read_only_cors(origins)
}

fn read_only_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Layers, outermost first: request tracing, CORS, body limit, throttling.
/// Preflight requests are answered by CORS and never take a token.
pub fn create_router(state: AppState, server: &ServerSection) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/summary", get(handlers::summary_handler))
        .route("/records", get(handlers::records_handler))
        .route("/records/top", get(handlers::top_handler))
        .route("/records/{id}", get(handlers::record_handler));

    match Throttle::per_second(server.rate_limit) {
        Some(throttle) => {
            tracing::info!(limit = throttle.limit(), "Throttling requests per second");
            router = router.layer(axum_middleware::from_fn_with_state(
                throttle,
                middleware::throttle_middleware,
            ));
        }
        None => tracing::info!("Throttling disabled"),
    }

    // Requests carry no body; keep the limit small.
    router
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(build_cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, catalog: Catalog, settings: &Settings) -> Result<(), NeoError> {
    let state = AppState::new(catalog, settings.dashboard.risk_tolerance);
    let router = create_router(state, &settings.server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| NeoError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("neoguard HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| NeoError::IoError(format!("Server error: {}", e)))
}
