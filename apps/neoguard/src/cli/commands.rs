//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{Backend, Context};
use crate::api::{self, RecordJson};
use crate::input::{LoadReport, load_csv};
use crate::telemetry::TracingObserver;
use neoguard_core::{
    Catalog, NeoError, Pipeline, PortfolioSummary, RefineReport, snapshot_checksum,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE HELPERS
// =============================================================================

/// Maximum snapshot file size for the file backend (500 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), NeoError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| NeoError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(NeoError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an output path: the parent directory must exist.
///
/// Returns the path with its parent canonicalized, so ".." and symlinks are
/// resolved before anything is written.
fn validate_output_path(path: &Path) -> Result<PathBuf, NeoError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        NeoError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(NeoError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| NeoError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &impl Serialize) -> Result<(), NeoError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| NeoError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// STORE HELPERS
// =============================================================================

/// Open the configured store, or an empty one if it does not exist yet.
pub fn load_or_create_catalog(db_path: &Path, backend: Backend) -> Result<Catalog, NeoError> {
    match backend {
        Backend::Redb => Catalog::with_redb(db_path),
        Backend::File => {
            if !db_path.exists() {
                return Ok(Catalog::new());
            }
            validate_file_size(db_path, MAX_SNAPSHOT_FILE_SIZE)?;
            let data = std::fs::read(db_path)
                .map_err(|e| NeoError::IoError(format!("Read db: {}", e)))?;
            Catalog::from_snapshot_bytes(&data)
        }
    }
}

/// Persist the catalog. A redb catalog is already durable.
///
/// Returns the checksum of the written snapshot for the file backend.
pub fn save_catalog(catalog: &Catalog, db_path: &Path) -> Result<Option<String>, NeoError> {
    if catalog.is_persistent() {
        return Ok(None);
    }

    let data = catalog.snapshot_bytes()?;
    std::fs::write(db_path, &data)
        .map_err(|e| NeoError::IoError(format!("Write db: {}", e)))?;
    Ok(Some(snapshot_checksum(&data)))
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new, empty store.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), NeoError> {
    let db_path = &ctx.database;
    if db_path.exists() {
        if !force {
            return Err(NeoError::IoError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| NeoError::IoError(format!("Remove existing db: {}", e)))?;
    }

    match ctx.backend {
        Backend::Redb => {
            let _catalog = Catalog::with_redb(db_path)?;
        }
        Backend::File => {
            save_catalog(&Catalog::new(), db_path)?;
        }
    }
    println!(
        "Initialized new {} database at {:?}",
        ctx.backend.name(),
        db_path
    );

    Ok(())
}

// =============================================================================
// RUN COMMAND
// =============================================================================

#[derive(Serialize)]
struct RunOutput<'a> {
    input: String,
    database: String,
    backend: &'static str,
    refine_only: bool,
    load: &'a LoadReport,
    refine: &'a RefineReport,
    summary: Option<PortfolioSummary>,
    checksum: Option<String>,
}

/// Load the raw CSV, run the pipeline and replace the stored tables.
pub fn cmd_run(ctx: &Context, input: Option<PathBuf>, refine_only: bool) -> Result<(), NeoError> {
    let input = input.unwrap_or_else(|| ctx.settings.paths.csv_raw.clone());
    let pipeline = Pipeline::new(&ctx.settings.pipeline_config()?)?;

    let loaded = load_csv(&input)?;
    tracing::info!(
        input = %input.display(),
        rows = loaded.report.rows_read,
        nulls = loaded.report.total_nulls(),
        row_errors = loaded.report.row_errors.len(),
        "Loaded raw catalog"
    );

    let mut catalog = load_or_create_catalog(&ctx.database, ctx.backend)?;
    let (report, summary) = if refine_only {
        let refined = pipeline.refine_only_observed(&loaded.table, &TracingObserver)?;
        catalog.store_canonical(&refined.records)?;
        (refined.report, None)
    } else {
        let output = pipeline.run_observed(&loaded.table, &TracingObserver)?;
        catalog.store_output(&output)?;
        let summary = PortfolioSummary::from_records(
            &output.enriched,
            ctx.settings.dashboard.risk_tolerance,
        );
        (output.report, Some(summary))
    };
    let checksum = save_catalog(&catalog, &ctx.database)?;

    if ctx.json_mode {
        return print_json(&RunOutput {
            input: input.to_string_lossy().into_owned(),
            database: ctx.database.to_string_lossy().into_owned(),
            backend: ctx.backend.name(),
            refine_only,
            load: &loaded.report,
            refine: &report,
            summary,
            checksum,
        });
    }

    println!("neoguard Run");
    println!("============");
    println!("Input:    {:?}", input);
    println!("Database: {:?}", ctx.database);
    println!("Backend:  {}", ctx.backend.name());
    println!();
    println!(
        "Rows read: {} ({} null cells, {} unreadable rows)",
        loaded.report.rows_read,
        loaded.report.total_nulls(),
        loaded.report.row_errors.len()
    );
    println!();
    println!("Refinement:");
    for step in &report.steps {
        println!(
            "  {:<20} {:>8} -> {:<8} (-{})",
            step.step.name(),
            step.rows_before,
            step.rows_after,
            step.removed()
        );
    }
    println!(
        "  Kept {} of {} rows",
        report.rows_out, report.rows_in
    );
    if let Some(range) = report.avg_diameter {
        println!(
            "  avg_diameter  min {:.4}  mean {:.4}  max {:.4} km",
            range.min, range.mean, range.max
        );
    }
    if let Some(range) = report.velocity_km_s {
        println!(
            "  velocity      min {:.4}  mean {:.4}  max {:.4} km/s",
            range.min, range.mean, range.max
        );
    }

    match summary {
        Some(summary) => {
            println!();
            print_summary(&summary);
        }
        None => {
            println!();
            println!("Refine-only run: stored enriched table cleared.");
        }
    }
    if let Some(checksum) = checksum {
        println!();
        println!("Checksum: {}", checksum);
    }

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

fn print_summary(summary: &PortfolioSummary) {
    println!("Portfolio");
    println!("---------");
    println!("Objects:          {}", summary.catalog.total_objects);
    println!("Hazardous:        {}", summary.catalog.hazardous_count);
    println!("Avg diameter:     {:.4} km", summary.catalog.avg_diameter_km);
    println!("Avg velocity:     {:.4} km/s", summary.catalog.avg_velocity_km_s);
    println!("Accepted:         {}", summary.accepted_count);
    println!("Declined:         {}", summary.declined_count);
    println!("Approval rate:    {:.2} %", summary.approval_rate_pct);
    println!("Total premium:    {:.2} EUR", summary.total_premium_eur);
    println!("Avg premium:      {:.2} EUR", summary.avg_premium_eur);
    println!("Avg risk score:   {:.2}", summary.avg_risk_score);
    println!("Max risk score:   {:.2}", summary.max_risk_score);
    println!(
        "Critical (> {:.1}): {}",
        summary.risk_tolerance, summary.critical_count
    );
    println!("Max energy:       {:.2} TJ", summary.max_energy_tj);
}

/// Show the portfolio summary of the stored enriched table.
pub fn cmd_status(ctx: &Context, tolerance: Option<f64>) -> Result<(), NeoError> {
    let tolerance = tolerance.unwrap_or(ctx.settings.dashboard.risk_tolerance);
    if !tolerance.is_finite() {
        return Err(NeoError::InvalidConfig(
            "tolerance must be a finite number".to_string(),
        ));
    }

    let catalog = load_or_create_catalog(&ctx.database, ctx.backend)?;
    let summary = catalog.summary(tolerance)?;
    let store = catalog.store();
    let canonical_rows = store.canonical_count()?;
    let enriched_rows = store.enriched_count()?;
    let runs = store.run_count()?;

    if ctx.json_mode {
        return print_json(&serde_json::json!({
            "database": ctx.database.to_string_lossy(),
            "backend": catalog.backend_name(),
            "canonical_rows": canonical_rows,
            "enriched_rows": enriched_rows,
            "runs": runs,
            "summary": summary,
        }));
    }

    println!("neoguard Status");
    println!("===============");
    println!("Database: {:?}", ctx.database);
    println!("Backend:  {}", catalog.backend_name());
    println!();
    println!("Canonical rows: {}", canonical_rows);
    println!("Enriched rows:  {}", enriched_rows);
    println!("Runs stored:    {}", runs);
    println!();
    print_summary(&summary);

    Ok(())
}

// =============================================================================
// TOP COMMAND
// =============================================================================

/// List the `n` highest-risk objects.
pub fn cmd_top(ctx: &Context, n: usize) -> Result<(), NeoError> {
    let catalog = load_or_create_catalog(&ctx.database, ctx.backend)?;
    let records = catalog.top(n)?;

    if ctx.json_mode {
        let rows: Vec<RecordJson> = records.iter().map(RecordJson::from).collect();
        return print_json(&rows);
    }

    println!(
        "{:<10} {:<28} {:>8} {:>12} {:>9} {:>14}",
        "id", "name", "risk", "energy_tj", "decision", "premium_eur"
    );
    for record in &records {
        println!(
            "{:<10} {:<28} {:>8.2} {:>12.2} {:>9} {:>14.2}",
            record.id().0,
            record.record.name,
            record.risk_score,
            record.physics.energy_tj,
            record.policy_status.label(),
            record.premium_eur
        );
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Encode the enriched table as CSV.
fn records_to_csv(records: &[RecordJson]) -> Result<Vec<u8>, NeoError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| NeoError::SerializationError(format!("CSV: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| NeoError::SerializationError(format!("CSV: {}", e)))
}

/// Export the enriched table (csv, json) or the whole store (snapshot).
pub fn cmd_export(ctx: &Context, output: &Path, format: &str) -> Result<(), NeoError> {
    let validated_output = validate_output_path(output)?;
    let catalog = load_or_create_catalog(&ctx.database, ctx.backend)?;

    let data = match format {
        "csv" | "json" => {
            let records: Vec<RecordJson> = catalog
                .store()
                .load_enriched()?
                .iter()
                .map(RecordJson::from)
                .collect();
            if format == "csv" {
                records_to_csv(&records)?
            } else {
                serde_json::to_vec_pretty(&records)
                    .map_err(|e| NeoError::SerializationError(e.to_string()))?
            }
        }
        "snapshot" => {
            let data = catalog.snapshot_bytes()?;
            println!("Checksum: {}", snapshot_checksum(&data));
            data
        }
        _ => {
            return Err(NeoError::InvalidConfig(format!(
                "Unknown format: {}. Use: csv, json, snapshot",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| NeoError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the read-only HTTP server.
pub async fn cmd_server(ctx: &Context, host: &str, port: u16) -> Result<(), NeoError> {
    let catalog = load_or_create_catalog(&ctx.database, ctx.backend)?;

    println!("neoguard HTTP Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", ctx.backend.name());
    println!("  Database: {:?}", ctx.database);
    match ctx.settings.server.rate_limit {
        0 => println!("  Rate:     unlimited"),
        rps => println!("  Rate:     {} req/s", rps),
    }
    println!();
    println!("Endpoints:");
    println!("  GET /health       - Health check");
    println!("  GET /summary      - Portfolio KPIs");
    println!("  GET /records      - Paged records");
    println!("  GET /records/top  - Highest-risk records");
    println!("  GET /records/{{id}} - One record");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, catalog, &ctx.settings).await
}

// =============================================================================
// TESTS
// =============================================================================
