//! # Input Module
//!
//! CSV loader for the raw NEO catalog.
//!
//! - Header names are trimmed, lowercased and stripped of a UTF-8 BOM.
//! - A missing required column is a `NeoError::Schema` naming all of them.
//! - Empty cells and unparseable numbers/booleans load as null and are
//!   counted in the [`LoadReport`]; the refinement stage decides what to do
//!   with them.

use csv::StringRecord;
use neoguard_core::primitives::{
    COL_ABSOLUTE_MAGNITUDE, COL_EST_DIAMETER_MAX, COL_EST_DIAMETER_MIN, COL_HAZARDOUS, COL_ID,
    COL_MISS_DISTANCE, COL_NAME, COL_ORBITING_BODY, COL_RELATIVE_VELOCITY, COL_SENTRY_OBJECT,
};
use neoguard_core::{NeoError, RawRecord, RawTable, ensure_required_columns};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

/// Maximum CSV file size (500 MB).
pub const MAX_CSV_FILE_SIZE: u64 = 500 * 1024 * 1024;

// =============================================================================
// LOAD REPORT
// =============================================================================

/// A row the CSV reader could not decode at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line number in the file (header is line 1).
    pub line: usize,
    pub message: String,
}

/// Data-quality figures gathered while loading.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    /// Empty cells per column.
    pub null_cells: BTreeMap<String, usize>,
    /// Cells per column that held text but did not parse.
    pub invalid_cells: BTreeMap<String, usize>,
    pub row_errors: Vec<RowError>,
}

impl LoadReport {
    /// Empty plus invalid cells over all columns.
    #[must_use]
    pub fn total_nulls(&self) -> usize {
        self.null_cells.values().sum::<usize>() + self.invalid_cells.values().sum::<usize>()
    }
}

/// A loaded table and its report.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    pub report: LoadReport,
}

// =============================================================================
// LOADING
// =============================================================================

/// Load the raw catalog from a CSV file on disk.
///
/// The path must be an existing regular file no larger than
/// [`MAX_CSV_FILE_SIZE`].
pub fn load_csv(path: &Path) -> Result<LoadedTable, NeoError> {
    let canonical = path.canonicalize().map_err(|e| {
        NeoError::IoError(format!("Invalid CSV path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(NeoError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| NeoError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_CSV_FILE_SIZE {
        return Err(NeoError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CSV_FILE_SIZE
        )));
    }

    let file = std::fs::File::open(&canonical)
        .map_err(|e| NeoError::IoError(format!("Open CSV '{}': {}", path.display(), e)))?;
    read_csv(file)
}

/// Read the raw catalog from any CSV source with a header row.
pub fn read_csv<R: Read>(source: R) -> Result<LoadedTable, NeoError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| NeoError::DeserializationError(format!("Read CSV headers: {}", e)))?
        .clone();
    let columns = build_header_map(&headers);
    ensure_required_columns(columns.keys().map(String::as_str))?;

    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        report.rows_read += 1;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                report.row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {}", e),
                });
                continue;
            }
        };

        let mut cells = Cells {
            columns: &columns,
            row: &row,
            report: &mut report,
        };
        records.push(cells.record());
    }

    let table = RawTable::new(columns.into_keys(), records)?;
    Ok(LoadedTable { table, report })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_ascii_lowercase()
}

/// `true/false/1/0/yes/no`, case-insensitive.
fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// ROW DECODING
// =============================================================================

/// Typed access to one row's cells, counting nulls as it goes.
struct Cells<'a> {
    columns: &'a HashMap<String, usize>,
    row: &'a StringRecord,
    report: &'a mut LoadReport,
}

impl Cells<'_> {
    fn record(&mut self) -> RawRecord {
        RawRecord {
            id: self.text(COL_ID).unwrap_or_default(),
            name: self.text(COL_NAME).unwrap_or_default(),
            est_diameter_min: self.parsed(COL_EST_DIAMETER_MIN, parse_number),
            est_diameter_max: self.parsed(COL_EST_DIAMETER_MAX, parse_number),
            relative_velocity: self.parsed(COL_RELATIVE_VELOCITY, parse_number),
            miss_distance: self.parsed(COL_MISS_DISTANCE, parse_number),
            orbiting_body: self.text(COL_ORBITING_BODY),
            absolute_magnitude: self.parsed(COL_ABSOLUTE_MAGNITUDE, parse_number),
            hazardous: self.parsed(COL_HAZARDOUS, parse_flag),
            sentry_object: self.parsed(COL_SENTRY_OBJECT, parse_flag),
        }
    }

    /// Non-empty cell text. Absent columns are not counted as nulls.
    fn text(&mut self, column: &str) -> Option<String> {
        let idx = *self.columns.get(column)?;
        match self.row.get(idx).map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(s.to_string()),
            None => {
                *self.report.null_cells.entry(column.to_string()).or_default() += 1;
                None
            }
        }
    }

    fn parsed<T>(&mut self, column: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
        let text = self.text(column)?;
        let value = parse(&text);
        if value.is_none() {
            *self
                .report
                .invalid_cells
                .entry(column.to_string())
                .or_default() += 1;
        }
        value
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str =
        "id,name,est_diameter_min,est_diameter_max,relative_velocity,miss_distance,orbiting_body,sentry_object,absolute_magnitude,hazardous";

    fn csv(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn test_reads_full_rows() {
        let loaded = read_csv(
            csv(&["2162635,162635 (2000 SS164),1.19,2.67,13569.25,54839744.08,Earth,False,16.73,False"])
                .as_bytes(),
        )
        .expect("load");

        assert_eq!(loaded.report.rows_read, 1);
        assert_eq!(loaded.report.total_nulls(), 0);
        let record = &loaded.table.records()[0];
        assert_eq!(record.id, "2162635");
        assert_eq!(record.name, "162635 (2000 SS164)");
        assert_eq!(record.est_diameter_min, Some(1.19));
        assert_eq!(record.miss_distance, Some(54_839_744.08));
        assert_eq!(record.orbiting_body.as_deref(), Some("Earth"));
        assert_eq!(record.hazardous, Some(false));
        assert_eq!(record.sentry_object, Some(false));
        assert!(loaded.table.has_sentry_column());
    }

    #[test]
    fn test_missing_columns_named() {
        let err = read_csv("id,name,miss_distance\n1,a,5000".as_bytes()).expect_err("schema");
        assert!(matches!(
            &err,
            NeoError::Schema { missing }
                if missing.len() == 3
                    && missing.iter().any(|c| c == "est_diameter_min")
                    && missing.iter().any(|c| c == "relative_velocity")
        ));
    }

    #[test]
    fn test_empty_input_is_schema_error() {
        assert!(matches!(
            read_csv("".as_bytes()),
            Err(NeoError::Schema { .. })
        ));
    }

    #[test]
    fn test_headers_trimmed_and_bom_stripped() {
        let text = "\u{feff}id , Name,est_diameter_min,est_diameter_max, relative_velocity,miss_distance\n1,a,0.1,0.2,36000,5000";
        let loaded = read_csv(text.as_bytes()).expect("load");
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(loaded.table.records()[0].name, "a");
        assert!(!loaded.table.has_sentry_column());
    }

    #[test]
    fn test_bad_cells_load_as_null() {
        let loaded = read_csv(
            csv(&[
                "1,a,,0.2,fast,5000,Earth,,17.0,maybe",
                "2,b,0.1,0.2,36000,inf,,,,YES",
            ])
            .as_bytes(),
        )
        .expect("load");

        let first = &loaded.table.records()[0];
        assert_eq!(first.est_diameter_min, None);
        assert_eq!(first.relative_velocity, None);
        assert_eq!(first.hazardous, None);
        assert_eq!(first.sentry_object, None);

        let second = &loaded.table.records()[1];
        assert_eq!(second.miss_distance, None);
        assert_eq!(second.orbiting_body, None);
        assert_eq!(second.hazardous, Some(true));

        let report = &loaded.report;
        assert_eq!(report.null_cells.get(COL_EST_DIAMETER_MIN), Some(&1));
        assert_eq!(report.null_cells.get(COL_SENTRY_OBJECT), Some(&2));
        assert_eq!(report.invalid_cells.get(COL_RELATIVE_VELOCITY), Some(&1));
        assert_eq!(report.invalid_cells.get(COL_MISS_DISTANCE), Some(&1));
        assert_eq!(report.invalid_cells.get(COL_HAZARDOUS), Some(&1));
    }

    #[test]
    fn test_flag_spellings() {
        for (text, expected) in [
            ("true", Some(true)),
            ("False", Some(false)),
            ("1", Some(true)),
            ("0", Some(false)),
            ("yes", Some(true)),
            ("No", Some(false)),
            ("2", None),
        ] {
            assert_eq!(parse_flag(text), expected, "{text}");
        }
    }

    #[test]
    fn test_load_csv_from_disk() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("neo.csv");
        std::fs::write(&path, csv(&["1,a,0.1,0.2,36000,5000,Earth,False,20.0,False"]))
            .expect("write");

        let loaded = load_csv(&path).expect("load");
        assert_eq!(loaded.table.len(), 1);
    }

    #[test]
    fn test_load_csv_rejects_directories_and_missing_files() {
        let temp = tempdir().expect("temp dir");
        assert!(matches!(load_csv(temp.path()), Err(NeoError::IoError(_))));
        assert!(matches!(
            load_csv(&temp.path().join("absent.csv")),
            Err(NeoError::IoError(_))
        ));
    }
}
