//! # Core Type Definitions
//!
//! This module contains all record shapes that flow through the pipeline:
//! - Identifiers (`NeoId`)
//! - Input rows (`RawRecord`, `RawTable`)
//! - Refinement output (`CanonicalRecord`)
//! - Risk & Pricing output (`Physics`, `PolicyStatus`, `EnrichedRecord`)
//! - Error types (`NeoError`)
//!
//! ## Immutability
//!
//! Raw records are read once per run and never mutated. Canonical and enriched
//! tables are derived snapshots: they are filtered or replaced wholesale, never
//! updated record by record.

use crate::primitives::{
    COL_SENTRY_OBJECT, DEFAULT_ABSOLUTE_MAGNITUDE, DEFAULT_ORBITING_BODY, RAW_COLUMNS,
    REQUIRED_COLUMNS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a catalogued object after type normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NeoId(pub i64);

impl NeoId {
    /// Parse an integer-like raw id.
    ///
    /// Accepts plain integers with surrounding whitespace (`" 42 "`) and
    /// integral floats (`"42.0"`), which is how spreadsheet exports tend to
    /// write numeric ids. Anything else yields `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Some(Self(value));
        }

        let value: f64 = trimmed.parse().ok()?;
        // 2^53: beyond this an f64 no longer represents every integer.
        if value.is_finite() && value.fract() == 0.0 && value.abs() <= 9_007_199_254_740_992.0 {
            Some(Self(value as i64))
        } else {
            None
        }
    }

    /// Get the raw integer value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for NeoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// RAW INPUT
// =============================================================================

/// One row of the external catalog, exactly as the input collaborator read it.
///
/// Every measurement may be null. `id` is kept as text until the refinement
/// stage normalizes it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub name: String,
    /// Estimated minimum diameter (km).
    pub est_diameter_min: Option<f64>,
    /// Estimated maximum diameter (km).
    pub est_diameter_max: Option<f64>,
    /// Relative velocity (km/h).
    pub relative_velocity: Option<f64>,
    /// Miss distance (km).
    pub miss_distance: Option<f64>,
    pub orbiting_body: Option<String>,
    pub absolute_magnitude: Option<f64>,
    pub hazardous: Option<bool>,
    pub sentry_object: Option<bool>,
}

impl RawRecord {
    /// Create a raw record with the required measurements set.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        est_diameter_min: f64,
        est_diameter_max: f64,
        relative_velocity: f64,
        miss_distance: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            est_diameter_min: Some(est_diameter_min),
            est_diameter_max: Some(est_diameter_max),
            relative_velocity: Some(relative_velocity),
            miss_distance: Some(miss_distance),
            ..Self::default()
        }
    }

    /// Set the hazardous flag.
    #[must_use]
    pub fn with_hazardous(mut self, hazardous: bool) -> Self {
        self.hazardous = Some(hazardous);
        self
    }

    /// Set the sentry flag.
    #[must_use]
    pub fn with_sentry_object(mut self, sentry_object: bool) -> Self {
        self.sentry_object = Some(sentry_object);
        self
    }

    /// Set the orbiting body.
    #[must_use]
    pub fn with_orbiting_body(mut self, body: impl Into<String>) -> Self {
        self.orbiting_body = Some(body.into());
        self
    }

    /// Set the absolute magnitude.
    #[must_use]
    pub fn with_absolute_magnitude(mut self, magnitude: f64) -> Self {
        self.absolute_magnitude = Some(magnitude);
        self
    }
}

impl From<&CanonicalRecord> for RawRecord {
    /// Turn a canonical record back into input shape, so refined output can be
    /// fed through the refinement stage again.
    fn from(record: &CanonicalRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            est_diameter_min: Some(record.est_diameter_min),
            est_diameter_max: Some(record.est_diameter_max),
            relative_velocity: Some(record.relative_velocity),
            miss_distance: Some(record.miss_distance),
            orbiting_body: Some(record.orbiting_body.clone()),
            absolute_magnitude: Some(record.absolute_magnitude),
            hazardous: Some(record.hazardous),
            sentry_object: record.sentry_object,
        }
    }
}

/// Return the required columns that are absent from `columns`.
pub fn missing_required_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let present: BTreeSet<&str> = columns.into_iter().collect();
    REQUIRED_COLUMNS
        .iter()
        .filter(|column| !present.contains(*column))
        .map(|column| (*column).to_string())
        .collect()
}

/// Ensure every required column is present.
///
/// Returns `NeoError::Schema` naming all missing columns.
pub fn ensure_required_columns<'a>(
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<(), NeoError> {
    let missing = missing_required_columns(columns);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(NeoError::Schema { missing })
    }
}

/// An ordered raw table together with the columns its source provided.
///
/// The column set matters: `sentry_object` is only defaulted when the source
/// actually had that column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    columns: BTreeSet<String>,
    records: Vec<RawRecord>,
}

impl RawTable {
    /// Create a table from the source column names and its rows.
    ///
    /// Fails with `NeoError::Schema` if a required column is missing.
    pub fn new<I, S>(columns: I, records: Vec<RawRecord>) -> Result<Self, NeoError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: BTreeSet<String> = columns.into_iter().map(Into::into).collect();
        ensure_required_columns(columns.iter().map(String::as_str))?;
        Ok(Self { columns, records })
    }

    /// Create a table that carries the full raw schema.
    #[must_use]
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self {
            columns: RAW_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            records,
        }
    }

    /// Check whether the source provided a column.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Whether `sentry_object` should be defaulted during refinement.
    #[must_use]
    pub fn has_sentry_column(&self) -> bool {
        self.has_column(COL_SENTRY_OBJECT)
    }

    /// The rows in source order.
    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// =============================================================================
// CANONICAL RECORD
// =============================================================================

/// A cleaned, unit-normalized, deduplicated row ready for risk evaluation.
///
/// Invariants (established by the refinement stage):
/// - `avg_diameter > 0`
/// - `velocity_km_s` above the configured minimum (default 0.1)
/// - `miss_distance` above the configured minimum (default 1000 km)
/// - `id` unique within its table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: NeoId,
    pub name: String,
    pub est_diameter_min: f64,
    pub est_diameter_max: f64,
    /// Mean of the two diameter estimates (km).
    pub avg_diameter: f64,
    /// Relative velocity as supplied (km/h).
    pub relative_velocity: f64,
    /// Relative velocity in km/s.
    pub velocity_km_s: f64,
    /// Miss distance (km).
    pub miss_distance: f64,
    pub orbiting_body: String,
    pub absolute_magnitude: f64,
    pub hazardous: bool,
    /// `None` when the source had no `sentry_object` column.
    pub sentry_object: Option<bool>,
}

impl CanonicalRecord {
    /// Build a canonical record from its primary measurements.
    ///
    /// Derived fields are computed with the default velocity divisor and
    /// optional fields take their defaults.
    #[must_use]
    pub fn new(
        id: NeoId,
        name: impl Into<String>,
        est_diameter_min: f64,
        est_diameter_max: f64,
        relative_velocity: f64,
        miss_distance: f64,
        hazardous: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            est_diameter_min,
            est_diameter_max,
            avg_diameter: (est_diameter_min + est_diameter_max) / 2.0,
            relative_velocity,
            velocity_km_s: relative_velocity / crate::primitives::DEFAULT_VELOCITY_DIVISOR,
            miss_distance,
            orbiting_body: DEFAULT_ORBITING_BODY.to_string(),
            absolute_magnitude: DEFAULT_ABSOLUTE_MAGNITUDE,
            hazardous,
            sentry_object: None,
        }
    }
}

// =============================================================================
// ENRICHED RECORD
// =============================================================================

/// Physical quantities derived from a canonical record.
///
/// `energy_joule` uses `velocity_km_s` directly, without conversion to m/s.
/// The values are therefore consistent for relative scoring but are not
/// dimensioned joules; scoring and pricing are calibrated against this.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Physics {
    pub mass_kg: f64,
    pub energy_joule: f64,
    pub energy_tj: f64,
}

/// Insurance decision for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PolicyStatus {
    Accepted,
    Declined,
}

impl PolicyStatus {
    /// Stable display label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            PolicyStatus::Accepted => "ACCEPTED",
            PolicyStatus::Declined => "DECLINED",
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, PolicyStatus::Accepted)
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PolicyStatus {
    type Err = NeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accepted" => Ok(PolicyStatus::Accepted),
            "declined" => Ok(PolicyStatus::Declined),
            other => Err(NeoError::DeserializationError(format!(
                "Unknown policy status: {}",
                other
            ))),
        }
    }
}

/// A canonical record augmented with physics, score, decision and price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: CanonicalRecord,
    pub physics: Physics,
    /// Batch-relative risk score in [0, 100], two decimals.
    pub risk_score: f64,
    pub policy_status: PolicyStatus,
    /// Premium in EUR, two decimals; exactly 0 when declined.
    pub premium_eur: f64,
}

impl EnrichedRecord {
    #[must_use]
    pub fn id(&self) -> NeoId {
        self.record.id
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the neoguard system.
///
/// Row-level data-quality problems are never errors: they are filtered out
/// and counted. Errors are reserved for conditions that must abort a run.
#[derive(Debug, Error)]
pub enum NeoError {
    /// Required columns are missing from the input.
    #[error("Missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Refined data broke a pipeline invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No stored record carries the requested id.
    #[error("Record not found: {0}")]
    RecordNotFound(NeoId),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
