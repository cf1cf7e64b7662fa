//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use neoguard_core::{EnrichedRecord, NeoError, PolicyStatus, PortfolioSummary, RecordPage};
use serde::{Deserialize, Serialize};

/// Default page size for `/records`.
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Default count for `/records/top`.
pub const DEFAULT_TOP_N: usize = 10;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// RECORD JSON
// =============================================================================

/// One enriched record, flattened for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordJson {
    pub id: i64,
    pub name: String,
    pub est_diameter_min: f64,
    pub est_diameter_max: f64,
    pub avg_diameter: f64,
    pub relative_velocity: f64,
    pub velocity_km_s: f64,
    pub miss_distance: f64,
    pub orbiting_body: String,
    pub absolute_magnitude: f64,
    pub hazardous: bool,
    pub sentry_object: Option<bool>,
    pub mass_kg: f64,
    pub energy_joule: f64,
    pub energy_tj: f64,
    pub risk_score: f64,
    pub policy_status: String,
    pub premium_eur: f64,
}

impl From<&EnrichedRecord> for RecordJson {
    fn from(enriched: &EnrichedRecord) -> Self {
        let record = &enriched.record;
        Self {
            id: record.id.0,
            name: record.name.clone(),
            est_diameter_min: record.est_diameter_min,
            est_diameter_max: record.est_diameter_max,
            avg_diameter: record.avg_diameter,
            relative_velocity: record.relative_velocity,
            velocity_km_s: record.velocity_km_s,
            miss_distance: record.miss_distance,
            orbiting_body: record.orbiting_body.clone(),
            absolute_magnitude: record.absolute_magnitude,
            hazardous: record.hazardous,
            sentry_object: record.sentry_object,
            mass_kg: enriched.physics.mass_kg,
            energy_joule: enriched.physics.energy_joule,
            energy_tj: enriched.physics.energy_tj,
            risk_score: enriched.risk_score,
            policy_status: enriched.policy_status.label().to_string(),
            premium_eur: enriched.premium_eur,
        }
    }
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Query string for `/summary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryQuery {
    pub tolerance: Option<f64>,
}

/// Dashboard KPIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub summary: Option<PortfolioSummary>,
    pub error: Option<String>,
}

impl SummaryResponse {
    pub fn success(summary: PortfolioSummary) -> Self {
        Self {
            success: true,
            summary: Some(summary),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: None,
            error: Some(msg.into()),
        }
    }
}

/// Body for failures that happen before a handler runs (throttling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// Query string for `/records`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsQuery {
    /// `accepted` or `declined`; absent means both.
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl RecordsQuery {
    /// Parse the status filter.
    pub fn status_filter(&self) -> Result<Option<PolicyStatus>, NeoError> {
        self.status
            .as_deref()
            .map(str::parse::<PolicyStatus>)
            .transpose()
    }
}

/// Query string for `/records/top`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopQuery {
    pub n: Option<usize>,
}

/// A list of records, paged or ranked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub success: bool,
    /// Matching records before paging.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub records: Vec<RecordJson>,
    pub error: Option<String>,
}

impl RecordsResponse {
    pub fn from_page(page: &RecordPage) -> Self {
        Self {
            success: true,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
            records: page.records.iter().map(RecordJson::from).collect(),
            error: None,
        }
    }

    pub fn ranked(records: &[EnrichedRecord], limit: usize) -> Self {
        Self {
            success: true,
            total: records.len(),
            offset: 0,
            limit,
            records: records.iter().map(RecordJson::from).collect(),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            total: 0,
            offset: 0,
            limit: 0,
            records: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

/// A single record lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub success: bool,
    pub record: Option<RecordJson>,
    pub error: Option<String>,
}

impl RecordResponse {
    pub fn success(record: &EnrichedRecord) -> Self {
        Self {
            success: true,
            record: Some(RecordJson::from(record)),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            record: None,
            error: Some(msg.into()),
        }
    }
}
