//! # neoguard-core
//!
//! The deterministic refinement and risk pipeline for neoguard - THE LOGIC.
//!
//! A flat catalog of near-Earth object records goes through two stages:
//!
//! 1. **Refinement**: deduplicate (closest approach wins), drop incomplete
//!    rows, fill defaults, derive `avg_diameter` and `velocity_km_s`, filter
//!    against thresholds, validate and project onto [`CanonicalRecord`].
//! 2. **Risk & Pricing**: derive mass and kinetic energy, score every object
//!    relative to its batch, decline hazardous objects and price the rest.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async, NO network dependencies, NO logging crate (pure Rust)
//! - Processes one whole table per run; a run is a pure function of the
//!   input table and the configuration
//! - Reports progress only through an explicit [`StageObserver`]
//! - Leaves file I/O to the host; storage backends receive whole tables

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod config;
pub mod formats;
pub mod observer;
pub mod pipeline;
pub mod primitives;
pub mod refine;
pub mod risk;
pub mod storage;
pub mod summary;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CanonicalRecord, EnrichedRecord, NeoError, NeoId, Physics, PolicyStatus, RawRecord, RawTable,
    ensure_required_columns, missing_required_columns,
};

// =============================================================================
// RE-EXPORTS: Stages
// =============================================================================

pub use config::{PipelineConfig, PricingConfig, RefineConfig};
pub use observer::{
    NoopObserver, ObserverEvent, RecordingObserver, RefineStep, Stage, StageObserver, StepReport,
};
pub use pipeline::{Pipeline, PipelineOutput};
pub use refine::{RefineReport, Refined, Refiner, ValueRange};
pub use risk::{RiskEngine, RiskNormalizer, calculate_physics, round2};
pub use summary::{CatalogStats, PortfolioSummary, top_by_risk};

// =============================================================================
// RE-EXPORTS: Storage (from storage and formats modules)
// =============================================================================

pub use catalog::{Catalog, RecordPage, StorageBackend};
#[cfg(feature = "crypto-hash")]
pub use formats::snapshot_checksum;
pub use formats::{PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes};
pub use storage::{RecordStore, RedbStore, Snapshot};
