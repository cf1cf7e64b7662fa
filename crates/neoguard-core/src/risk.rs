//! # Risk & Pricing Stage
//!
//! Pure function from a canonical table to an enriched table.
//!
//! For every record the stage derives physics (mass, kinetic energy), a risk
//! score normalized against the whole batch, an accept/decline decision and a
//! premium.
//!
//! ## Batch-relative scores
//!
//! Both score components are divided by the maximum observed in the batch
//! being evaluated. The same object can therefore score differently when it
//! is evaluated together with other objects. Any chunked evaluation must build
//! one [`RiskNormalizer`] over the entire batch first.
//!
//! The stage trusts the refinement invariants for the measurements it reads,
//! but the derived physics can still overflow (a finite diameter of 1e120 km
//! has infinite mass). Such a batch is rejected with `InvariantViolation`
//! instead of producing NaN scores.

use crate::config::PricingConfig;
use crate::observer::{NoopObserver, Stage, StageObserver};
use crate::primitives::{
    DISTANCE_WEIGHT, ENERGY_WEIGHT, JOULES_PER_TERAJOULE, MAX_RISK_SCORE, RISK_LOADING_FACTOR,
    ROCK_DENSITY_KG_M3,
};
use crate::{CanonicalRecord, EnrichedRecord, NeoError, Physics, PolicyStatus};
use std::f64::consts::PI;
use std::time::Instant;

// =============================================================================
// PHYSICS
// =============================================================================

/// Derive mass and kinetic energy from a canonical record.
///
/// The body is a sphere of `avg_diameter` with rock density. Energy is
/// `0.5 * m * v²` with `v` in km/s as stored (see [`Physics`]).
#[must_use]
pub fn calculate_physics(record: &CanonicalRecord) -> Physics {
    let radius_m = record.avg_diameter * 1000.0 / 2.0;
    let volume_m3 = (4.0 / 3.0) * PI * radius_m.powi(3);
    let mass_kg = volume_m3 * ROCK_DENSITY_KG_M3;
    let energy_joule = 0.5 * mass_kg * record.velocity_km_s.powi(2);

    Physics {
        mass_kg,
        energy_joule,
        energy_tj: energy_joule / JOULES_PER_TERAJOULE,
    }
}

/// Round to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// NORMALIZATION
// =============================================================================

/// Batch-wide maxima of the log-scaled score inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskNormalizer {
    max_log_energy: f64,
    max_log_distance: f64,
}

impl RiskNormalizer {
    /// Scan a batch of `(energy_tj, miss_distance)` pairs.
    ///
    /// A maximum of zero (or an empty batch) is replaced by 1.
    pub fn from_batch(values: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let (max_log_energy, max_log_distance) = values.into_iter().fold(
            (0.0_f64, 0.0_f64),
            |(energy, distance), (energy_tj, miss_distance)| {
                (
                    energy.max(energy_tj.ln_1p()),
                    distance.max(miss_distance.ln_1p()),
                )
            },
        );

        Self {
            max_log_energy: guard_zero(max_log_energy),
            max_log_distance: guard_zero(max_log_distance),
        }
    }

    /// Risk score in [0, 100], rounded to two decimals.
    #[must_use]
    pub fn score(&self, energy_tj: f64, miss_distance: f64) -> f64 {
        let norm_energy = energy_tj.ln_1p() / self.max_log_energy;
        let norm_distance = 1.0 - miss_distance.ln_1p() / self.max_log_distance;
        let raw = (ENERGY_WEIGHT * norm_energy + DISTANCE_WEIGHT * norm_distance) * MAX_RISK_SCORE;
        round2(raw).clamp(0.0, MAX_RISK_SCORE)
    }
}

fn guard_zero(max: f64) -> f64 {
    if max == 0.0 { 1.0 } else { max }
}

// =============================================================================
// ENGINE
// =============================================================================

/// The risk & pricing stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskEngine {
    pricing: PricingConfig,
}

impl RiskEngine {
    /// Create an engine. Fails if the base premium is not positive.
    pub fn new(pricing: PricingConfig) -> Result<Self, NeoError> {
        pricing.validate()?;
        Ok(Self { pricing })
    }

    /// Hazardous objects are always declined, whatever their score.
    #[must_use]
    pub fn decide(&self, record: &CanonicalRecord) -> PolicyStatus {
        if record.hazardous {
            PolicyStatus::Declined
        } else {
            PolicyStatus::Accepted
        }
    }

    /// Premium for a decision: `base + base * score * 5` if accepted, else 0.
    #[must_use]
    pub fn price(&self, status: PolicyStatus, risk_score: f64) -> f64 {
        match status {
            PolicyStatus::Accepted => {
                let base = self.pricing.base_premium;
                round2(base + base * risk_score * RISK_LOADING_FACTOR)
            }
            PolicyStatus::Declined => 0.0,
        }
    }

    /// Enrich a whole canonical table without instrumentation.
    pub fn evaluate_portfolio(
        &self,
        records: &[CanonicalRecord],
    ) -> Result<Vec<EnrichedRecord>, NeoError> {
        self.evaluate_portfolio_observed(records, &NoopObserver)
    }

    /// Enrich a whole canonical table. Output order matches input order.
    ///
    /// Fails with `InvariantViolation` if any record has non-finite physics or
    /// a negative or non-finite miss distance, since one such value would
    /// poison the batch maxima for every other record.
    pub fn evaluate_portfolio_observed(
        &self,
        records: &[CanonicalRecord],
        observer: &dyn StageObserver,
    ) -> Result<Vec<EnrichedRecord>, NeoError> {
        let started = Instant::now();
        observer.stage_started(Stage::RiskPricing, records.len());

        let physics: Vec<Physics> = records.iter().map(calculate_physics).collect();
        for (record, physics) in records.iter().zip(&physics) {
            check_scoring_inputs(record, physics)?;
        }

        let normalizer = RiskNormalizer::from_batch(
            physics
                .iter()
                .zip(records)
                .map(|(p, r)| (p.energy_tj, r.miss_distance)),
        );

        let enriched: Vec<EnrichedRecord> = records
            .iter()
            .zip(physics)
            .map(|(record, physics)| {
                let risk_score = normalizer.score(physics.energy_tj, record.miss_distance);
                let policy_status = self.decide(record);
                EnrichedRecord {
                    record: record.clone(),
                    physics,
                    risk_score,
                    policy_status,
                    premium_eur: self.price(policy_status, risk_score),
                }
            })
            .collect();

        observer.stage_finished(Stage::RiskPricing, enriched.len(), started.elapsed());
        Ok(enriched)
    }
}

fn check_scoring_inputs(record: &CanonicalRecord, physics: &Physics) -> Result<(), NeoError> {
    if !physics.energy_tj.is_finite() || !physics.mass_kg.is_finite() {
        return Err(NeoError::InvariantViolation(format!(
            "non-finite physics for id {} (avg_diameter {}, velocity_km_s {})",
            record.id.value(),
            record.avg_diameter,
            record.velocity_km_s
        )));
    }
    if !record.miss_distance.is_finite() || record.miss_distance < 0.0 {
        return Err(NeoError::InvariantViolation(format!(
            "negative or non-finite miss_distance {} for id {}",
            record.miss_distance,
            record.id.value()
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NeoId;
    use crate::observer::{ObserverEvent, RecordingObserver};

    fn record(
        id: i64,
        dmin: f64,
        dmax: f64,
        velocity_kmh: f64,
        dist: f64,
        hazardous: bool,
    ) -> CanonicalRecord {
        CanonicalRecord::new(
            NeoId(id),
            format!("obj {id}"),
            dmin,
            dmax,
            velocity_kmh,
            dist,
            hazardous,
        )
    }

    #[test]
    fn physics_of_one_kilometre_body() {
        // 1 km across, 36 / 3.6 = 10 velocity units
        let physics = calculate_physics(&record(1, 1.0, 1.0, 36.0, 1e6, false));

        let expected_mass = (4.0 / 3.0) * PI * 500.0_f64.powi(3) * 2500.0;
        assert!((physics.mass_kg - expected_mass).abs() / expected_mass < 1e-12);
        assert!((physics.energy_joule - 0.5 * expected_mass * 100.0).abs() < 1.0);
        assert!((physics.energy_tj - physics.energy_joule / 1e12).abs() < 1e-12);
    }

    #[test]
    fn scenario_hazardous_declined_safe_accepted() {
        let records = vec![
            record(1, 0.01, 0.03, 54.0, 5_000_000.0, false),
            record(2, 2.0, 3.0, 90.0, 100_000.0, true),
        ];
        let enriched = RiskEngine::default()
            .evaluate_portfolio(&records)
            .expect("evaluate");

        assert_eq!(enriched[1].policy_status, PolicyStatus::Declined);
        assert_eq!(enriched[1].premium_eur, 0.0);
        assert_eq!(enriched[0].policy_status, PolicyStatus::Accepted);
        assert!(enriched[0].premium_eur >= 10_000.0);
    }

    #[test]
    fn scores_stay_in_bounds_and_are_rounded() {
        let records = vec![
            record(1, 0.5, 1.5, 90_000.0, 2_000.0, false),
            record(2, 0.001, 0.002, 400.0, 70_000_000.0, false),
            record(3, 0.2, 0.4, 30_000.0, 400_000.0, false),
        ];
        for enriched in RiskEngine::default()
            .evaluate_portfolio(&records)
            .expect("evaluate")
        {
            assert!((0.0..=100.0).contains(&enriched.risk_score));
            assert_eq!(round2(enriched.risk_score), enriched.risk_score);
        }
    }

    #[test]
    fn single_record_batch_scores_from_energy_only() {
        // Alone in its batch: norm_energy = 1, norm_distance = 0
        let enriched = RiskEngine::default()
            .evaluate_portfolio(&[record(1, 0.5, 0.7, 50_000.0, 80_000.0, false)])
            .expect("evaluate");
        assert_eq!(enriched[0].risk_score, 70.0);
    }

    #[test]
    fn score_depends_on_batch() {
        let target = record(1, 0.1, 0.2, 20_000.0, 300_000.0, false);
        let alone = RiskEngine::default()
            .evaluate_portfolio(std::slice::from_ref(&target))
            .expect("evaluate");
        let bigger = record(2, 3.0, 4.0, 90_000.0, 5_000.0, false);
        let together = RiskEngine::default()
            .evaluate_portfolio(&[target, bigger])
            .expect("evaluate");

        assert_ne!(alone[0].risk_score, together[0].risk_score);
    }

    #[test]
    fn zero_energy_batch_does_not_divide_by_zero() {
        let normalizer = RiskNormalizer::from_batch([(0.0, 5_000.0), (0.0, 10_000.0)]);
        let score = normalizer.score(0.0, 5_000.0);
        assert!(score.is_finite());

        let empty = RiskNormalizer::from_batch(std::iter::empty());
        assert!(empty.score(0.0, 0.0).is_finite());
    }

    #[test]
    fn overflowing_energy_is_rejected() {
        // Finite diameter, infinite mass
        let records = vec![
            record(1, 1e120, 1e120, 36_000.0, 10_000.0, false),
            record(2, 1.0, 2.0, 36_000.0, 20_000.0, false),
        ];
        let result = RiskEngine::default().evaluate_portfolio(&records);
        assert!(matches!(result, Err(NeoError::InvariantViolation(_))));
    }

    #[test]
    fn negative_miss_distance_is_rejected() {
        let records = vec![record(1, 0.1, 0.2, 36_000.0, -5.0, false)];
        let result = RiskEngine::default().evaluate_portfolio(&records);
        assert!(matches!(result, Err(NeoError::InvariantViolation(_))));
    }

    #[test]
    fn extreme_but_finite_inputs_score_in_bounds() {
        let records = vec![
            record(1, 1e-9, 1e-9, 1e-3, 1e-6, false),
            record(2, 50.0, 60.0, 1e9, 1e15, false),
            record(3, 1e30, 1e30, 1.0, 0.0, false),
        ];
        for enriched in RiskEngine::default()
            .evaluate_portfolio(&records)
            .expect("evaluate")
        {
            assert!((0.0..=100.0).contains(&enriched.risk_score));
            assert!(enriched.premium_eur.is_finite() && enriched.premium_eur >= 0.0);
        }
    }

    #[test]
    fn premium_formula() {
        let engine = RiskEngine::new(PricingConfig { base_premium: 100.0 }).expect("engine");
        assert_eq!(engine.price(PolicyStatus::Accepted, 0.0), 100.0);
        assert_eq!(engine.price(PolicyStatus::Accepted, 10.0), 5_100.0);
        assert_eq!(engine.price(PolicyStatus::Declined, 99.0), 0.0);
    }

    #[test]
    fn rejects_non_positive_base_premium() {
        assert!(RiskEngine::new(PricingConfig { base_premium: 0.0 }).is_err());
    }

    #[test]
    fn empty_portfolio() {
        assert!(
            RiskEngine::default()
                .evaluate_portfolio(&[])
                .expect("evaluate")
                .is_empty()
        );
    }

    #[test]
    fn observer_sees_stage_boundaries() {
        let observer = RecordingObserver::new();
        let records = vec![record(1, 0.1, 0.2, 36_000.0, 10_000.0, false)];
        RiskEngine::default()
            .evaluate_portfolio_observed(&records, &observer)
            .expect("evaluate");

        assert_eq!(
            observer.events(),
            vec![
                ObserverEvent::Started {
                    stage: Stage::RiskPricing,
                    rows: 1
                },
                ObserverEvent::Finished {
                    stage: Stage::RiskPricing,
                    rows: 1
                },
            ]
        );
    }
}
