//! # Portfolio Summary
//!
//! Aggregate figures over stored tables, for the presentation layer.
//! Every aggregate of an empty table is zero.

use crate::{CanonicalRecord, EnrichedRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Figures over a canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_objects: usize,
    pub hazardous_count: usize,
    pub avg_diameter_km: f64,
    pub avg_velocity_km_s: f64,
}

impl CatalogStats {
    #[must_use]
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        Self {
            total_objects: records.len(),
            hazardous_count: records.iter().filter(|r| r.hazardous).count(),
            avg_diameter_km: mean(records.iter().map(|r| r.avg_diameter)),
            avg_velocity_km_s: mean(records.iter().map(|r| r.velocity_km_s)),
        }
    }
}

/// Dashboard KPIs over an enriched table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub catalog: CatalogStats,
    pub accepted_count: usize,
    pub declined_count: usize,
    /// Share of accepted policies, in percent.
    pub approval_rate_pct: f64,
    pub total_premium_eur: f64,
    /// Mean premium over accepted policies only.
    pub avg_premium_eur: f64,
    pub avg_risk_score: f64,
    pub max_risk_score: f64,
    /// Threshold used for `critical_count`.
    pub risk_tolerance: f64,
    /// Objects with `risk_score > risk_tolerance`.
    pub critical_count: usize,
    pub max_energy_tj: f64,
}

impl PortfolioSummary {
    #[must_use]
    pub fn from_records(records: &[EnrichedRecord], risk_tolerance: f64) -> Self {
        let accepted: Vec<&EnrichedRecord> = records
            .iter()
            .filter(|r| r.policy_status.is_accepted())
            .collect();
        let canonical: Vec<CanonicalRecord> = records.iter().map(|r| r.record.clone()).collect();

        let approval_rate_pct = if records.is_empty() {
            0.0
        } else {
            accepted.len() as f64 / records.len() as f64 * 100.0
        };

        Self {
            catalog: CatalogStats::from_records(&canonical),
            accepted_count: accepted.len(),
            declined_count: records.len() - accepted.len(),
            approval_rate_pct,
            total_premium_eur: records.iter().map(|r| r.premium_eur).sum(),
            avg_premium_eur: mean(accepted.iter().map(|r| r.premium_eur)),
            avg_risk_score: mean(records.iter().map(|r| r.risk_score)),
            max_risk_score: max(records.iter().map(|r| r.risk_score)),
            risk_tolerance,
            critical_count: records
                .iter()
                .filter(|r| r.risk_score > risk_tolerance)
                .count(),
            max_energy_tj: max(records.iter().map(|r| r.physics.energy_tj)),
        }
    }
}

/// The `n` highest-risk records, ties broken by ascending id.
#[must_use]
pub fn top_by_risk(records: &[EnrichedRecord], n: usize) -> Vec<&EnrichedRecord> {
    let mut ranked: Vec<&EnrichedRecord> = records.iter().collect();
    ranked.sort_by(|a, b| rank(a, b));
    ranked.truncate(n);
    ranked
}

fn rank(a: &EnrichedRecord, b: &EnrichedRecord) -> Ordering {
    b.risk_score
        .total_cmp(&a.risk_score)
        .then_with(|| a.id().cmp(&b.id()))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (count, sum) = values.fold((0usize, 0.0), |(count, sum), v| (count + 1, sum + v));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn max(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(0.0)
}
