//! # Stage Observer
//!
//! Explicit instrumentation interface for the pipeline stages.
//!
//! The CORE carries no logging dependency. Each stage reports its entry, every
//! refinement step and its exit to a [`StageObserver`] supplied by the caller.
//! The host decides what to do with those events (the binary forwards them to
//! `tracing`); tests use [`RecordingObserver`] to inspect them.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::time::Duration;

// =============================================================================
// STAGES & STEPS
// =============================================================================

/// The two pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Refinement,
    RiskPricing,
}

impl Stage {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Refinement => "refinement",
            Stage::RiskPricing => "risk_pricing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The ordered steps of the refinement stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RefineStep {
    Deduplicate,
    DropMissing,
    FillDefaults,
    DeriveDiameter,
    DeriveVelocity,
    NormalizeTypes,
    FilterInvalid,
    Validate,
    Project,
}

impl RefineStep {
    /// The stage a step belongs to. Only refinement has steps.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        Stage::Refinement
    }

    /// All steps in execution order.
    pub const ALL: [RefineStep; 9] = [
        RefineStep::Deduplicate,
        RefineStep::DropMissing,
        RefineStep::FillDefaults,
        RefineStep::DeriveDiameter,
        RefineStep::DeriveVelocity,
        RefineStep::NormalizeTypes,
        RefineStep::FilterInvalid,
        RefineStep::Validate,
        RefineStep::Project,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RefineStep::Deduplicate => "deduplicate",
            RefineStep::DropMissing => "drop_missing",
            RefineStep::FillDefaults => "fill_defaults",
            RefineStep::DeriveDiameter => "derive_diameter",
            RefineStep::DeriveVelocity => "derive_velocity",
            RefineStep::NormalizeTypes => "normalize_types",
            RefineStep::FilterInvalid => "filter_invalid",
            RefineStep::Validate => "validate",
            RefineStep::Project => "project",
        }
    }
}

impl std::fmt::Display for RefineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Row counts around one refinement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: RefineStep,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl StepReport {
    #[must_use]
    pub const fn new(step: RefineStep, rows_before: usize, rows_after: usize) -> Self {
        Self {
            step,
            rows_before,
            rows_after,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.step.stage()
    }

    /// Rows this step removed.
    #[must_use]
    pub const fn removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

// =============================================================================
// OBSERVER TRAIT
// =============================================================================

/// Receives instrumentation events from the pipeline stages.
///
/// All methods default to no-ops so implementors only override what they need.
pub trait StageObserver {
    /// A stage is about to process `rows` input rows.
    fn stage_started(&self, _stage: Stage, _rows: usize) {}

    /// A step finished. Its stage is `report.stage()`.
    fn step_completed(&self, _report: &StepReport) {}

    /// A stage produced `rows` output rows in `elapsed`.
    fn stage_finished(&self, _stage: Stage, _rows: usize, _elapsed: Duration) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// One captured observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    Started { stage: Stage, rows: usize },
    Step(StepReport),
    Finished { stage: Stage, rows: usize },
}

/// Observer that keeps a transcript of every event (elapsed times omitted).
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.borrow().clone()
    }

    /// Only the step reports, in order.
    #[must_use]
    pub fn steps(&self) -> Vec<StepReport> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ObserverEvent::Step(report) => Some(*report),
                _ => None,
            })
            .collect()
    }
}

impl StageObserver for RecordingObserver {
    fn stage_started(&self, stage: Stage, rows: usize) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::Started { stage, rows });
    }

    fn step_completed(&self, report: &StepReport) {
        self.events.borrow_mut().push(ObserverEvent::Step(*report));
    }

    fn stage_finished(&self, stage: Stage, rows: usize, _elapsed: Duration) {
        self.events
            .borrow_mut()
            .push(ObserverEvent::Finished { stage, rows });
    }
}
