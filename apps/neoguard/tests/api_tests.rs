//! Integration tests for the neoguard HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum_test::TestServer;
use neoguard::api::{
    AppState, ErrorResponse, HealthResponse, RecordResponse, RecordsResponse, SummaryResponse,
    create_router,
};
use neoguard::settings::ServerSection;
use neoguard_core::{Catalog, Pipeline, RawRecord, RawTable};
use tower::ServiceExt;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn sample_table() -> RawTable {
    RawTable::from_records(vec![
        RawRecord::new("1", "small", 0.01, 0.03, 54.0, 5_000_000.0).with_hazardous(false),
        RawRecord::new("2", "large", 2.0, 3.0, 90.0, 100_000.0).with_hazardous(true),
        RawRecord::new("3", "medium", 0.5, 0.6, 70_000.0, 40_000.0),
        RawRecord::new("3", "medium", 0.5, 0.6, 70_000.0, 90_000.0),
    ])
}

fn router_with(catalog: Catalog) -> Router {
    router_configured(catalog, &ServerSection::default())
}

fn router_configured(catalog: Catalog, server: &ServerSection) -> Router {
    create_router(AppState::new(catalog, 80.0), server)
}

fn server_with(catalog: Catalog) -> TestServer {
    TestServer::new(router_with(catalog)).unwrap()
}

fn create_test_server() -> TestServer {
    server_with(Catalog::new())
}

fn create_populated_test_server() -> TestServer {
    let output = Pipeline::default().run(&sample_table()).unwrap();
    let mut catalog = Catalog::new();
    catalog.store_output(&output).unwrap();
    server_with(catalog)
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

// =============================================================================
// SUMMARY ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_summary_empty_catalog_is_all_zero() {
    let server = create_test_server();

    let response = server.get("/summary").await;
    response.assert_status_ok();

    let body: SummaryResponse = response.json();
    assert!(body.success);
    let summary = body.summary.unwrap();
    assert_eq!(summary.catalog.total_objects, 0);
    assert_eq!(summary.approval_rate_pct, 0.0);
    assert_eq!(summary.avg_premium_eur, 0.0);
}

#[tokio::test]
async fn test_summary_counts_decisions() {
    let server = create_populated_test_server();

    let body: SummaryResponse = server.get("/summary").await.json();
    let summary = body.summary.unwrap();
    assert_eq!(summary.catalog.total_objects, 3);
    assert_eq!(summary.catalog.hazardous_count, 1);
    assert_eq!(summary.accepted_count, 2);
    assert_eq!(summary.declined_count, 1);
    assert_eq!(summary.risk_tolerance, 80.0);
}

#[tokio::test]
async fn test_summary_tolerance_override() {
    let server = create_populated_test_server();

    let body: SummaryResponse = server
        .get("/summary")
        .add_query_param("tolerance", -1.0)
        .await
        .json();
    let summary = body.summary.unwrap();
    assert_eq!(summary.risk_tolerance, -1.0);
    assert_eq!(summary.critical_count, 3);
}

// =============================================================================
// RECORDS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_records_paging() {
    let server = create_populated_test_server();

    let response = server
        .get("/records")
        .add_query_param("limit", 2)
        .add_query_param("offset", 1)
        .await;
    response.assert_status_ok();

    let body: RecordsResponse = response.json();
    assert_eq!(body.total, 3);
    assert_eq!(body.offset, 1);
    assert_eq!(body.records.len(), 2);
}

#[tokio::test]
async fn test_records_status_filter() {
    let server = create_populated_test_server();

    let body: RecordsResponse = server
        .get("/records")
        .add_query_param("status", "declined")
        .await
        .json();
    assert_eq!(body.total, 1);
    assert_eq!(body.records[0].id, 2);
    assert_eq!(body.records[0].policy_status, "DECLINED");
    assert_eq!(body.records[0].premium_eur, 0.0);
}

#[tokio::test]
async fn test_records_limit_is_capped() {
    let server = create_populated_test_server();

    let body: RecordsResponse = server
        .get("/records")
        .add_query_param("limit", 1_000_000)
        .await
        .json();
    assert_eq!(body.limit, 1000);
}

#[tokio::test]
async fn test_records_invalid_status() {
    let server = create_populated_test_server();

    let response = server
        .get("/records")
        .add_query_param("status", "pending")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: RecordsResponse = response.json();
    assert!(!body.success);
    assert!(body.error.is_some());
}

#[tokio::test]
async fn test_top_orders_by_risk() {
    let server = create_populated_test_server();

    let body: RecordsResponse = server
        .get("/records/top")
        .add_query_param("n", 2)
        .await
        .json();
    assert_eq!(body.records.len(), 2);
    assert!(body.records[0].risk_score >= body.records[1].risk_score);
    // Highest energy at the smallest distance.
    assert_eq!(body.records[0].id, 3);
}

#[tokio::test]
async fn test_record_lookup() {
    let server = create_populated_test_server();

    let response = server.get("/records/3").await;
    response.assert_status_ok();

    let body: RecordResponse = response.json();
    let record = body.record.unwrap();
    assert_eq!(record.name, "medium");
    // Closest duplicate survived.
    assert_eq!(record.miss_distance, 40_000.0);
    assert!((record.avg_diameter - 0.55).abs() < 1e-12);
}

#[tokio::test]
async fn test_record_not_found() {
    let server = create_populated_test_server();

    let response = server.get("/records/999").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: RecordResponse = response.json();
    assert!(!body.success);
    assert!(body.record.is_none());
}

#[tokio::test]
async fn test_record_invalid_id() {
    let server = create_populated_test_server();

    let response = server.get("/records/abc").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// READ-ONLY SURFACE
// =============================================================================

#[tokio::test]
async fn test_writes_are_not_routed() {
    let server = create_populated_test_server();

    let response = server.post("/records").await;
    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// CORS TESTS
// =============================================================================

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/summary")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_allows_localhost_by_default() {
    let router = router_with(Catalog::new());

    let response = router.oneshot(preflight("http://localhost:3000")).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_cors_rejects_foreign_origin_by_default() {
    let router = router_with(Catalog::new());

    let response = router.oneshot(preflight("https://evil.example")).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_cors_uses_configured_origins() {
    let server = ServerSection {
        cors_origins: vec!["https://dash.example".to_string()],
        ..ServerSection::default()
    };

    let allowed = router_configured(Catalog::new(), &server)
        .oneshot(preflight("https://dash.example"))
        .await
        .unwrap();
    assert_eq!(
        allowed
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://dash.example"
    );

    let localhost = router_configured(Catalog::new(), &server)
        .oneshot(preflight("http://localhost:3000"))
        .await
        .unwrap();
    assert!(
        localhost
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

// =============================================================================
// THROTTLING TESTS
// =============================================================================

#[tokio::test]
async fn test_throttled_request_gets_429_with_retry_after() {
    let server = ServerSection {
        rate_limit: 1,
        ..ServerSection::default()
    };
    let server = TestServer::new(router_configured(Catalog::new(), &server)).unwrap();

    server.get("/health").await.assert_status_ok();

    let response = server.get("/summary").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    let body: ErrorResponse = response.json();
    assert!(!body.success);
    assert!(!body.error.is_empty());
}

#[tokio::test]
async fn test_zero_rate_limit_disables_throttling() {
    let server = ServerSection {
        rate_limit: 0,
        ..ServerSection::default()
    };
    let server = TestServer::new(router_configured(Catalog::new(), &server)).unwrap();

    for _ in 0..20 {
        server.get("/health").await.assert_status_ok();
    }
}
