//! # Settings Module
//!
//! TOML settings file for the binary.
//!
//! ```toml
//! [paths]
//! csv_raw = "data/raw/neo_data.csv"
//! database = "neoguard.db"
//!
//! [storage]
//! backend = "redb"            # or "file"
//!
//! [transformations.units]
//! velocity_to_km_s = 3.6
//!
//! [transformations.cleaning]
//! min_velocity = 0.1
//! min_distance = 1000.0
//!
//! [pricing]
//! base_premium = 10000.0
//!
//! [dashboard]
//! risk_tolerance = 80.0
//!
//! [server]
//! rate_limit = 100            # requests per second, 0 disables
//! cors_origins = []           # empty: localhost only, ["*"]: any origin
//! ```
//!
//! Every key is optional. A missing file yields the defaults above; an
//! unreadable or malformed file is an error.
//!
//! `NEOGUARD_RATE_LIMIT` and `NEOGUARD_CORS_ORIGINS` (comma-separated)
//! override the `[server]` keys.

use neoguard_core::primitives::{
    DEFAULT_BASE_PREMIUM_EUR, DEFAULT_MIN_MISS_DISTANCE_KM, DEFAULT_MIN_VELOCITY_KM_S,
    DEFAULT_RISK_TOLERANCE, DEFAULT_VELOCITY_DIVISOR,
};
use neoguard_core::{NeoError, PipelineConfig, PricingConfig, RefineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum settings file size (1 MB).
const MAX_SETTINGS_FILE_SIZE: u64 = 1024 * 1024;

/// Default API rate limit in requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

pub const RATE_LIMIT_ENV: &str = "NEOGUARD_RATE_LIMIT";
pub const CORS_ORIGINS_ENV: &str = "NEOGUARD_CORS_ORIGINS";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Raw catalog CSV read by `run` when no `--input` is given.
    pub csv_raw: PathBuf,
    /// Store path (redb database or snapshot file).
    pub database: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            csv_raw: PathBuf::from("data/raw/neo_data.csv"),
            database: PathBuf::from("neoguard.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// "redb" (ACID database) or "file" (snapshot file).
    pub backend: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "redb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsSection {
    pub velocity_to_km_s: f64,
}

impl Default for UnitsSection {
    fn default() -> Self {
        Self {
            velocity_to_km_s: DEFAULT_VELOCITY_DIVISOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningSection {
    /// km/s
    pub min_velocity: f64,
    /// km
    pub min_distance: f64,
}

impl Default for CleaningSection {
    fn default() -> Self {
        Self {
            min_velocity: DEFAULT_MIN_VELOCITY_KM_S,
            min_distance: DEFAULT_MIN_MISS_DISTANCE_KM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationsSection {
    pub units: UnitsSection,
    pub cleaning: CleaningSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    pub base_premium: f64,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            base_premium: DEFAULT_BASE_PREMIUM_EUR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    /// Objects scoring above this are reported as critical.
    pub risk_tolerance: f64,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            risk_tolerance: DEFAULT_RISK_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Requests per second across all routes; 0 disables throttling.
    pub rate_limit: u32,
    /// Allowed browser origins. Empty means localhost only, `["*"]` any.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: Vec::new(),
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// The whole settings file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsSection,
    pub storage: StorageSection,
    pub transformations: TransformationsSection,
    pub pricing: PricingSection,
    pub dashboard: DashboardSection,
    pub server: ServerSection,
}

impl Settings {
    /// Load settings from `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, NeoError> {
        if !path.exists() {
            tracing::debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| NeoError::IoError(format!("Cannot read settings metadata: {}", e)))?;
        if metadata.len() > MAX_SETTINGS_FILE_SIZE {
            return Err(NeoError::InvalidConfig(format!(
                "Settings file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SETTINGS_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| NeoError::IoError(format!("Read settings: {}", e)))?;
        let settings = Self::parse(&content)?;
        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Apply the environment overrides for `[server]`.
    ///
    /// `lookup` is `std::env::var` in the binary; tests pass a map.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), NeoError> {
        if let Some(raw) = lookup(RATE_LIMIT_ENV) {
            self.server.rate_limit = raw.trim().parse().map_err(|_| {
                NeoError::InvalidConfig(format!(
                    "{} must be a non-negative integer, got '{}'",
                    RATE_LIMIT_ENV, raw
                ))
            })?;
        }
        if let Some(raw) = lookup(CORS_ORIGINS_ENV) {
            self.server.cors_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, NeoError> {
        toml::from_str(content).map_err(|e| NeoError::InvalidConfig(e.to_string()))
    }

    /// Core configuration for the two stages, validated.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, NeoError> {
        let config = PipelineConfig {
            refine: RefineConfig {
                velocity_divisor: self.transformations.units.velocity_to_km_s,
                min_velocity_km_s: self.transformations.cleaning.min_velocity,
                min_miss_distance_km: self.transformations.cleaning.min_distance,
            },
            pricing: PricingConfig {
                base_premium: self.pricing.base_premium,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// TESTS
// =============================================================================
