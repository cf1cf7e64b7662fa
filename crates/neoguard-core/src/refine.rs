//! # Refinement Stage
//!
//! Turns a raw table into a canonical table.
//!
//! The stage runs nine ordered steps over the whole table:
//!
//! 1. Deduplicate by id, keeping the closest approach (worst case)
//! 2. Drop rows with a null required measurement
//! 3. Fill optional-field defaults
//! 4. Derive `avg_diameter`
//! 5. Derive `velocity_km_s`
//! 6. Normalize types (`id` → integer)
//! 7. Filter invalid values against the configured thresholds
//! 8. Validate derived values (fatal on failure)
//! 9. Project onto the canonical record shape
//!
//! Deduplication runs before derivation so the survivor's own measurements
//! produce its derived values. Filtering runs after derivation because it
//! filters on derived values.
//!
//! Row-level problems are never errors: rows are dropped and the drop is
//! counted in the [`RefineReport`]. Only schema and invariant problems abort.

use crate::config::RefineConfig;
use crate::observer::{NoopObserver, RefineStep, Stage, StageObserver, StepReport};
use crate::primitives::{
    COL_AVG_DIAMETER, COL_VELOCITY_KM_S, DEFAULT_ABSOLUTE_MAGNITUDE, DEFAULT_ORBITING_BODY,
};
use crate::{CanonicalRecord, NeoError, NeoId, RawRecord, RawTable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Instant;

// =============================================================================
// REPORT
// =============================================================================

/// Min / mean / max of one column over the surviving rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl ValueRange {
    /// Compute the range of a column. Returns `None` for an empty column.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        (count > 0).then(|| Self {
            min,
            mean: sum / count as f64,
            max,
        })
    }
}

/// What the refinement stage did to a table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RefineReport {
    pub rows_in: usize,
    pub rows_out: usize,
    /// One entry per step, in execution order.
    pub steps: Vec<StepReport>,
    pub avg_diameter: Option<ValueRange>,
    pub velocity_km_s: Option<ValueRange>,
}

impl RefineReport {
    /// Rows removed by a single step.
    #[must_use]
    pub fn removed_by(&self, step: RefineStep) -> usize {
        self.steps
            .iter()
            .filter(|report| report.step == step)
            .map(StepReport::removed)
            .sum()
    }

    /// Rows removed over the whole stage.
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }
}

/// Output of the refinement stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Refined {
    /// Canonical records ordered by ascending `miss_distance`.
    pub records: Vec<CanonicalRecord>,
    pub report: RefineReport,
}

// =============================================================================
// WORKING ROW
// =============================================================================

/// Key used to detect duplicate ids before type normalization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum DedupKey {
    Id(NeoId),
    Text(String),
}

impl DedupKey {
    fn of(record: &RawRecord) -> Self {
        match NeoId::parse(&record.id) {
            Some(id) => DedupKey::Id(id),
            None => DedupKey::Text(record.id.trim().to_string()),
        }
    }
}

/// A row in flight between steps 2 and 9.
///
/// Required measurements are already known to be present; derived values
/// and the normalized id are filled in by their steps.
#[derive(Debug, Clone)]
struct WorkingRow<'a> {
    source: &'a RawRecord,
    est_diameter_min: f64,
    est_diameter_max: f64,
    relative_velocity: f64,
    miss_distance: f64,
    orbiting_body: Option<String>,
    absolute_magnitude: Option<f64>,
    hazardous: Option<bool>,
    sentry_object: Option<bool>,
    avg_diameter: Option<f64>,
    velocity_km_s: Option<f64>,
    id: Option<NeoId>,
}

impl<'a> WorkingRow<'a> {
    /// Returns `None` when any required measurement is null or non-finite.
    fn from_raw(source: &'a RawRecord) -> Option<Self> {
        Some(Self {
            source,
            est_diameter_min: usable(source.est_diameter_min)?,
            est_diameter_max: usable(source.est_diameter_max)?,
            relative_velocity: usable(source.relative_velocity)?,
            miss_distance: usable(source.miss_distance)?,
            orbiting_body: source.orbiting_body.clone(),
            absolute_magnitude: usable(source.absolute_magnitude),
            hazardous: source.hazardous,
            sentry_object: source.sentry_object,
            avg_diameter: None,
            velocity_km_s: None,
            id: None,
        })
    }

    fn into_canonical(self) -> Result<CanonicalRecord, NeoError> {
        let (Some(id), Some(avg_diameter), Some(velocity_km_s)) =
            (self.id, self.avg_diameter, self.velocity_km_s)
        else {
            return Err(NeoError::InvariantViolation(format!(
                "row '{}' reached projection without normalized values",
                self.source.id
            )));
        };

        Ok(CanonicalRecord {
            id,
            name: self.source.name.clone(),
            est_diameter_min: self.est_diameter_min,
            est_diameter_max: self.est_diameter_max,
            avg_diameter,
            relative_velocity: self.relative_velocity,
            velocity_km_s,
            miss_distance: self.miss_distance,
            orbiting_body: self
                .orbiting_body
                .unwrap_or_else(|| DEFAULT_ORBITING_BODY.to_string()),
            absolute_magnitude: self
                .absolute_magnitude
                .unwrap_or(DEFAULT_ABSOLUTE_MAGNITUDE),
            hazardous: self.hazardous.unwrap_or(false),
            sentry_object: self.sentry_object,
        })
    }
}

/// Treat NaN and infinities like nulls.
fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Ascending miss distance with nulls last.
fn compare_distance(a: &RawRecord, b: &RawRecord) -> Ordering {
    match (usable(a.miss_distance), usable(b.miss_distance)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// =============================================================================
// REFINER
// =============================================================================

/// The refinement stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Refiner {
    config: RefineConfig,
}

impl Refiner {
    /// Create a refiner. Fails if the configuration is out of range.
    pub fn new(config: RefineConfig) -> Result<Self, NeoError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Refine a raw table without instrumentation.
    pub fn refine(&self, table: &RawTable) -> Result<Refined, NeoError> {
        self.refine_observed(table, &NoopObserver)
    }

    /// Refine a raw table, reporting every step to `observer`.
    ///
    /// An empty table is valid and yields an empty canonical table.
    pub fn refine_observed(
        &self,
        table: &RawTable,
        observer: &dyn StageObserver,
    ) -> Result<Refined, NeoError> {
        let started = Instant::now();
        let rows_in = table.len();
        observer.stage_started(Stage::Refinement, rows_in);

        let mut steps = Vec::with_capacity(RefineStep::ALL.len());
        let mut record = |step: RefineStep, before: usize, after: usize| {
            let report = StepReport::new(step, before, after);
            observer.step_completed(&report);
            steps.push(report);
        };

        // 1. Deduplicate
        let survivors = deduplicate(table.records());
        record(RefineStep::Deduplicate, rows_in, survivors.len());

        // 2. Drop rows with missing required measurements
        let before = survivors.len();
        let mut rows: Vec<WorkingRow<'_>> = survivors
            .into_iter()
            .filter_map(WorkingRow::from_raw)
            .collect();
        record(RefineStep::DropMissing, before, rows.len());

        // 3. Fill defaults
        let fill_sentry = table.has_sentry_column();
        for row in &mut rows {
            row.orbiting_body
                .get_or_insert_with(|| DEFAULT_ORBITING_BODY.to_string());
            row.absolute_magnitude
                .get_or_insert(DEFAULT_ABSOLUTE_MAGNITUDE);
            row.hazardous.get_or_insert(false);
            if fill_sentry {
                row.sentry_object.get_or_insert(false);
            }
        }
        record(RefineStep::FillDefaults, rows.len(), rows.len());

        // 4. avg_diameter
        for row in &mut rows {
            row.avg_diameter = Some((row.est_diameter_min + row.est_diameter_max) / 2.0);
        }
        record(RefineStep::DeriveDiameter, rows.len(), rows.len());

        // 5. velocity_km_s
        let divisor = self.config.velocity_divisor;
        for row in &mut rows {
            row.velocity_km_s = Some(row.relative_velocity / divisor);
        }
        record(RefineStep::DeriveVelocity, rows.len(), rows.len());

        // 6. Normalize types; ids that are not integer-like are dropped
        let before = rows.len();
        rows.retain_mut(|row| {
            row.id = NeoId::parse(&row.source.id);
            row.id.is_some()
        });
        record(RefineStep::NormalizeTypes, before, rows.len());

        // 7. Filter invalid values (strict bounds)
        let before = rows.len();
        let min_velocity = self.config.min_velocity_km_s;
        let min_distance = self.config.min_miss_distance_km;
        rows.retain(|row| {
            row.velocity_km_s.is_none_or(|v| v > min_velocity)
                && row.miss_distance > min_distance
                && row.avg_diameter.is_none_or(|d| d > 0.0)
        });
        record(RefineStep::FilterInvalid, before, rows.len());

        // 8. Validate
        validate(&rows)?;
        record(RefineStep::Validate, rows.len(), rows.len());

        // 9. Project
        let before = rows.len();
        let records = rows
            .into_iter()
            .map(WorkingRow::into_canonical)
            .collect::<Result<Vec<_>, _>>()?;
        record(RefineStep::Project, before, records.len());

        let report = RefineReport {
            rows_in,
            rows_out: records.len(),
            steps,
            avg_diameter: ValueRange::of(records.iter().map(|r| r.avg_diameter)),
            velocity_km_s: ValueRange::of(records.iter().map(|r| r.velocity_km_s)),
        };

        observer.stage_finished(Stage::Refinement, records.len(), started.elapsed());
        Ok(Refined { records, report })
    }
}

/// Sort by miss distance (stable) and keep the first row of every id.
fn deduplicate(records: &[RawRecord]) -> Vec<&RawRecord> {
    let mut ordered: Vec<&RawRecord> = records.iter().collect();
    ordered.sort_by(|a, b| compare_distance(a, b));

    let mut seen = BTreeSet::new();
    ordered.retain(|record| seen.insert(DedupKey::of(record)));
    ordered
}

/// Derived columns must exist on every row, and derived values and the miss
/// distance must be finite and not negative.
fn validate(rows: &[WorkingRow<'_>]) -> Result<(), NeoError> {
    let mut missing = Vec::new();
    if rows.iter().any(|row| row.avg_diameter.is_none()) {
        missing.push(COL_AVG_DIAMETER.to_string());
    }
    if rows.iter().any(|row| row.velocity_km_s.is_none()) {
        missing.push(COL_VELOCITY_KM_S.to_string());
    }
    if !missing.is_empty() {
        return Err(NeoError::Schema { missing });
    }

    for row in rows {
        if let Some(diameter) = row.avg_diameter.filter(|d| *d < 0.0 || !d.is_finite()) {
            return Err(NeoError::InvariantViolation(format!(
                "negative or non-finite avg_diameter {} for id '{}'",
                diameter, row.source.id
            )));
        }
        if let Some(velocity) = row.velocity_km_s.filter(|v| *v < 0.0 || !v.is_finite()) {
            return Err(NeoError::InvariantViolation(format!(
                "negative or non-finite velocity_km_s {} for id '{}'",
                velocity, row.source.id
            )));
        }
        if row.miss_distance < 0.0 || !row.miss_distance.is_finite() {
            return Err(NeoError::InvariantViolation(format!(
                "negative or non-finite miss_distance {} for id '{}'",
                row.miss_distance, row.source.id
            )));
        }
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::primitives::REQUIRED_COLUMNS;

    fn raw(id: &str, dist: f64) -> RawRecord {
        RawRecord::new(id, format!("obj {id}"), 0.1, 0.3, 36_000.0, dist)
    }

    fn refine(records: Vec<RawRecord>) -> Refined {
        Refiner::default()
            .refine(&RawTable::from_records(records))
            .expect("refine")
    }

    #[test]
    fn empty_table_is_valid() {
        let refined = refine(Vec::new());
        assert!(refined.records.is_empty());
        assert_eq!(refined.report.rows_in, 0);
        assert_eq!(refined.report.steps.len(), RefineStep::ALL.len());
        assert!(refined.report.avg_diameter.is_none());
    }

    #[test]
    fn dedup_keeps_closest_approach() {
        let refined = refine(vec![raw("5", 50_000.0), raw("5", 9_000.0), raw("6", 20_000.0)]);

        assert_eq!(refined.records.len(), 2);
        let five = refined
            .records
            .iter()
            .find(|r| r.id == NeoId(5))
            .expect("id 5");
        assert_eq!(five.miss_distance, 9_000.0);
        assert_eq!(refined.report.removed_by(RefineStep::Deduplicate), 1);
    }

    #[test]
    fn dedup_step_keeps_row_below_distance_threshold() {
        let records = vec![raw("5", 50_000.0), raw("5", 900.0)];
        let survivors = deduplicate(&records);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].miss_distance, Some(900.0));

        // The 1000 km filter then removes it with default thresholds.
        let refined = refine(records.clone());
        assert!(refined.records.is_empty());
        assert_eq!(refined.report.removed_by(RefineStep::FilterInvalid), 1);

        // A lower threshold lets it through.
        let refiner = Refiner::new(RefineConfig {
            min_miss_distance_km: 500.0,
            ..RefineConfig::default()
        })
        .expect("config");
        let refined = refiner
            .refine(&RawTable::from_records(records))
            .expect("refine");
        assert_eq!(refined.records.len(), 1);
        assert_eq!(refined.records[0].miss_distance, 900.0);
    }

    #[test]
    fn dedup_tie_keeps_first_row() {
        let refined = refine(vec![
            raw("7", 10_000.0).with_hazardous(true),
            raw("7", 10_000.0).with_hazardous(false),
        ]);
        assert_eq!(refined.records.len(), 1);
        assert!(refined.records[0].hazardous);
    }

    #[test]
    fn dedup_treats_equivalent_id_text_as_one_id() {
        let refined = refine(vec![raw("5", 30_000.0), raw(" 5 ", 20_000.0), raw("5.0", 25_000.0)]);
        assert_eq!(refined.records.len(), 1);
        assert_eq!(refined.records[0].miss_distance, 20_000.0);
    }

    #[test]
    fn null_distance_loses_dedup_and_is_dropped() {
        let mut no_distance = raw("3", 0.0);
        no_distance.miss_distance = None;
        let refined = refine(vec![no_distance, raw("3", 40_000.0)]);

        assert_eq!(refined.records.len(), 1);
        assert_eq!(refined.records[0].miss_distance, 40_000.0);
    }

    #[test]
    fn drops_nulls_in_required_fields_only() {
        let mut missing_diameter = raw("1", 10_000.0);
        missing_diameter.est_diameter_max = None;
        let mut nan_velocity = raw("2", 10_000.0);
        nan_velocity.relative_velocity = Some(f64::NAN);
        let optional_gaps = raw("3", 10_000.0);

        let refined = refine(vec![missing_diameter, nan_velocity, optional_gaps]);
        assert_eq!(refined.records.len(), 1);
        assert_eq!(refined.records[0].id, NeoId(3));
        assert_eq!(refined.report.removed_by(RefineStep::DropMissing), 2);
    }

    #[test]
    fn fills_optional_defaults() {
        let refined = refine(vec![raw("1", 10_000.0)]);
        let record = &refined.records[0];
        assert_eq!(record.orbiting_body, "Earth");
        assert_eq!(record.absolute_magnitude, 0.0);
        assert!(!record.hazardous);
        assert_eq!(record.sentry_object, Some(false));
    }

    #[test]
    fn sentry_default_requires_column() {
        let table = RawTable::new(REQUIRED_COLUMNS.iter().copied(), vec![raw("1", 10_000.0)])
            .expect("table");
        let refined = Refiner::default().refine(&table).expect("refine");
        assert_eq!(refined.records[0].sentry_object, None);
    }

    #[test]
    fn derives_values() {
        let refined = refine(vec![RawRecord::new("1", "a", 0.2, 0.4, 72_000.0, 10_000.0)]);
        let record = &refined.records[0];
        assert!((record.avg_diameter - 0.3).abs() < 1e-12);
        assert!((record.velocity_km_s - 20_000.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_threshold_is_strict() {
        let boundary = 0.1 * 3.6;
        assert_eq!(boundary / 3.6, 0.1);

        let refined = refine(vec![
            RawRecord::new("1", "slow", 0.1, 0.2, boundary, 10_000.0),
            RawRecord::new("2", "fast", 0.1, 0.2, boundary * 2.0, 10_000.0),
        ]);
        assert_eq!(refined.records.len(), 1);
        assert_eq!(refined.records[0].id, NeoId(2));
    }

    #[test]
    fn distance_threshold_is_strict() {
        let refined = refine(vec![raw("1", 1000.0), raw("2", 1000.5)]);
        assert_eq!(refined.records.len(), 1);
        assert_eq!(refined.records[0].id, NeoId(2));
    }

    #[test]
    fn non_positive_diameter_is_filtered() {
        let refined = refine(vec![RawRecord::new("1", "dust", 0.0, 0.0, 36_000.0, 10_000.0)]);
        assert!(refined.records.is_empty());
    }

    #[test]
    fn unparseable_ids_are_dropped() {
        let refined = refine(vec![raw("abc", 10_000.0), raw("4", 10_000.0)]);
        assert_eq!(refined.records.len(), 1);
        assert_eq!(refined.report.removed_by(RefineStep::NormalizeTypes), 1);
    }

    #[test]
    fn negative_thresholds_are_rejected_up_front() {
        let loose_velocity = RefineConfig {
            min_velocity_km_s: -100.0,
            ..RefineConfig::default()
        };
        assert!(matches!(
            Refiner::new(loose_velocity),
            Err(NeoError::InvalidConfig(_))
        ));

        let loose_distance = RefineConfig {
            min_miss_distance_km: -10.0,
            ..RefineConfig::default()
        };
        assert!(matches!(
            Refiner::new(loose_distance),
            Err(NeoError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_negative_values() {
        let retro = RawRecord::new("1", "retro", 0.1, 0.2, -36.0, 10_000.0);
        let mut row = WorkingRow::from_raw(&retro).expect("row");
        row.avg_diameter = Some(0.15);
        row.velocity_km_s = Some(-10.0);
        assert!(matches!(
            validate(std::slice::from_ref(&row)),
            Err(NeoError::InvariantViolation(_))
        ));

        let inside = RawRecord::new("2", "inside", 0.1, 0.2, 36.0, -5.0);
        let mut row = WorkingRow::from_raw(&inside).expect("row");
        row.avg_diameter = Some(0.15);
        row.velocity_km_s = Some(10.0);
        assert!(matches!(
            validate(std::slice::from_ref(&row)),
            Err(NeoError::InvariantViolation(_))
        ));
    }

    #[test]
    fn present_optional_values_survive() {
        let refined = refine(vec![
            raw("1", 10_000.0)
                .with_orbiting_body("Mars")
                .with_absolute_magnitude(19.25)
                .with_sentry_object(true),
        ]);
        let record = &refined.records[0];
        assert_eq!(record.orbiting_body, "Mars");
        assert_eq!(record.absolute_magnitude, 19.25);
        assert_eq!(record.sentry_object, Some(true));
    }

    #[test]
    fn output_is_ordered_by_distance() {
        let refined = refine(vec![raw("1", 30_000.0), raw("2", 10_000.0), raw("3", 20_000.0)]);
        let ids: Vec<i64> = refined.records.iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn refining_canonical_output_is_a_no_op() {
        let first = refine(vec![
            raw("1", 30_000.0),
            raw("1", 12_000.0),
            raw("2", 10_000.0).with_hazardous(true),
        ]);
        let again: Vec<RawRecord> = first.records.iter().map(RawRecord::from).collect();
        let second = refine(again);

        assert_eq!(first.records, second.records);
    }

    #[test]
    fn observer_sees_every_step() {
        let observer = RecordingObserver::new();
        let table = RawTable::from_records(vec![raw("1", 10_000.0), raw("1", 20_000.0)]);
        let refined = Refiner::default()
            .refine_observed(&table, &observer)
            .expect("refine");

        let steps = observer.steps();
        assert_eq!(steps.len(), RefineStep::ALL.len());
        for (report, step) in steps.iter().zip(RefineStep::ALL) {
            assert_eq!(report.step, step);
        }
        assert_eq!(steps, refined.report.steps);
        assert_eq!(refined.report.total_removed(), 1);
    }

    #[test]
    fn report_carries_value_ranges() {
        let refined = refine(vec![
            RawRecord::new("1", "a", 0.1, 0.3, 36_000.0, 10_000.0),
            RawRecord::new("2", "b", 0.3, 0.5, 72_000.0, 20_000.0),
        ]);
        let diameter = refined.report.avg_diameter.expect("range");
        assert!((diameter.min - 0.2).abs() < 1e-12);
        assert!((diameter.max - 0.4).abs() < 1e-12);
        assert!((diameter.mean - 0.3).abs() < 1e-12);
    }

    #[test]
    fn value_range_of_empty_is_none() {
        assert!(ValueRange::of(std::iter::empty()).is_none());
    }
}
