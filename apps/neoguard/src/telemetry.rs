//! # Telemetry Module
//!
//! Subscriber setup for the binary, and a bridge from the core's
//! [`StageObserver`] callbacks to `tracing` events.

use neoguard_core::{Stage, StageObserver, StepReport};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Selects the log output format (`json` or text).
pub const LOG_FORMAT_ENV: &str = "NEOGUARD_LOG_FORMAT";

// =============================================================================
// SUBSCRIBER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else, or unset, is text.
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Filter used when `RUST_LOG` is unset. `--verbose` shows pipeline detail.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "neoguard=debug,tower_http=debug"
    } else {
        "neoguard=info,tower_http=debug"
    }
}

/// Install the global subscriber. Call once, before any command runs.
pub fn init(format: LogFormat, verbose: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose).into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

// =============================================================================
// STAGE OBSERVER
// =============================================================================

/// Emits one structured `tracing` event per stage and step callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn stage_started(&self, stage: Stage, rows: usize) {
        tracing::info!(stage = stage.name(), rows, "Stage started");
    }

    fn step_completed(&self, report: &StepReport) {
        tracing::info!(
            stage = report.stage().name(),
            step = report.step.name(),
            rows_before = report.rows_before,
            rows_after = report.rows_after,
            removed = report.removed(),
            "Step completed"
        );
    }

    fn stage_finished(&self, stage: Stage, rows: usize, elapsed: Duration) {
        tracing::info!(
            stage = stage.name(),
            rows,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage finished"
        );
    }
}
