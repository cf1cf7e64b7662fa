//! # Pipeline Primitives
//!
//! Fixed constants for the neoguard CORE.
//!
//! Tunable thresholds have a `DEFAULT_` prefix and can be overridden through
//! [`crate::config`]. Everything else is policy and is compiled in.

// =============================================================================
// REFINEMENT DEFAULTS
// =============================================================================

/// km/h → km/s divisor.
pub const DEFAULT_VELOCITY_DIVISOR: f64 = 3.6;

/// Records must move strictly faster than this (km/s).
pub const DEFAULT_MIN_VELOCITY_KM_S: f64 = 0.1;

/// Records must pass strictly farther than this (km).
pub const DEFAULT_MIN_MISS_DISTANCE_KM: f64 = 1000.0;

/// Fill value for a missing `orbiting_body`.
pub const DEFAULT_ORBITING_BODY: &str = "Earth";

/// Fill value for a missing `absolute_magnitude`.
pub const DEFAULT_ABSOLUTE_MAGNITUDE: f64 = 0.0;

// =============================================================================
// PHYSICS & SCORING POLICY
// =============================================================================

/// Assumed bulk density of every object (kg/m³).
pub const ROCK_DENSITY_KG_M3: f64 = 2500.0;

/// Joules per terajoule.
pub const JOULES_PER_TERAJOULE: f64 = 1e12;

/// Weight of normalized impact energy in the risk score.
pub const ENERGY_WEIGHT: f64 = 0.7;

/// Weight of normalized proximity in the risk score.
pub const DISTANCE_WEIGHT: f64 = 0.3;

/// Upper bound of the risk score.
pub const MAX_RISK_SCORE: f64 = 100.0;

// =============================================================================
// PRICING POLICY
// =============================================================================

/// Default base premium (EUR).
pub const DEFAULT_BASE_PREMIUM_EUR: f64 = 10_000.0;

/// Risk loading: premium = base + base * risk_score * RISK_LOADING_FACTOR.
pub const RISK_LOADING_FACTOR: f64 = 5.0;

/// Default dashboard threshold above which an object counts as critical.
pub const DEFAULT_RISK_TOLERANCE: f64 = 80.0;

// =============================================================================
// SCHEMA
// =============================================================================

pub const COL_ID: &str = "id";
pub const COL_NAME: &str = "name";
pub const COL_EST_DIAMETER_MIN: &str = "est_diameter_min";
pub const COL_EST_DIAMETER_MAX: &str = "est_diameter_max";
pub const COL_RELATIVE_VELOCITY: &str = "relative_velocity";
pub const COL_MISS_DISTANCE: &str = "miss_distance";
pub const COL_ORBITING_BODY: &str = "orbiting_body";
pub const COL_ABSOLUTE_MAGNITUDE: &str = "absolute_magnitude";
pub const COL_HAZARDOUS: &str = "hazardous";
pub const COL_SENTRY_OBJECT: &str = "sentry_object";
pub const COL_AVG_DIAMETER: &str = "avg_diameter";
pub const COL_VELOCITY_KM_S: &str = "velocity_km_s";

/// Columns every raw table must provide.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_ID,
    COL_NAME,
    COL_EST_DIAMETER_MIN,
    COL_EST_DIAMETER_MAX,
    COL_RELATIVE_VELOCITY,
    COL_MISS_DISTANCE,
];

/// The full raw schema.
pub const RAW_COLUMNS: [&str; 10] = [
    COL_ID,
    COL_NAME,
    COL_EST_DIAMETER_MIN,
    COL_EST_DIAMETER_MAX,
    COL_RELATIVE_VELOCITY,
    COL_MISS_DISTANCE,
    COL_ORBITING_BODY,
    COL_ABSOLUTE_MAGNITUDE,
    COL_HAZARDOUS,
    COL_SENTRY_OBJECT,
];

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Magic bytes for the neoguard snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"NEOG";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the record layout.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum page size for record listings.
pub const MAX_PAGE_SIZE: usize = 1000;
