//! # Pipeline
//!
//! Composes the two stages: raw table → canonical table → enriched table.

use crate::config::PipelineConfig;
use crate::observer::{NoopObserver, StageObserver};
use crate::refine::{RefineReport, Refined, Refiner};
use crate::risk::RiskEngine;
use crate::{CanonicalRecord, EnrichedRecord, NeoError, RawTable};

/// Both output tables of one run plus the refinement report.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub canonical: Vec<CanonicalRecord>,
    pub enriched: Vec<EnrichedRecord>,
    pub report: RefineReport,
}

/// A configured pipeline. Each run is a pure function of its input table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    refiner: Refiner,
    engine: RiskEngine,
}

impl Pipeline {
    /// Build a pipeline. Fails with `InvalidConfig` on out-of-range values.
    pub fn new(config: &PipelineConfig) -> Result<Self, NeoError> {
        Ok(Self {
            refiner: Refiner::new(config.refine)?,
            engine: RiskEngine::new(config.pricing)?,
        })
    }

    /// Refine and score a raw table.
    pub fn run(&self, table: &RawTable) -> Result<PipelineOutput, NeoError> {
        self.run_observed(table, &NoopObserver)
    }

    pub fn run_observed(
        &self,
        table: &RawTable,
        observer: &dyn StageObserver,
    ) -> Result<PipelineOutput, NeoError> {
        let Refined { records, report } = self.refiner.refine_observed(table, observer)?;
        let enriched = self.engine.evaluate_portfolio_observed(&records, observer)?;

        Ok(PipelineOutput {
            canonical: records,
            enriched,
            report,
        })
    }

    /// Refinement-only deployment: stop after the canonical table.
    pub fn refine_only(&self, table: &RawTable) -> Result<Refined, NeoError> {
        self.refiner.refine(table)
    }

    pub fn refine_only_observed(
        &self,
        table: &RawTable,
        observer: &dyn StageObserver,
    ) -> Result<Refined, NeoError> {
        self.refiner.refine_observed(table, observer)
    }
}
