//! `vpnrecon run` and `vpnrecon validate`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use vpn_io::store::{ArtifactStore, LocalStore};
use vpn_io::warehouse::{self, LoadContext, NdjsonWarehouse, WarehouseSink};
use vpn_io::{csv, read_path, xlsx};
use vpn_recon::header;
use vpn_recon::model::Warning;
use vpn_recon::schema::{FieldSpec, R033_FIELDS, R065_FIELDS};
use vpn_recon::{ReconConfig, ReconInput, ReconOutput};

use crate::{load_config, CliError, Common};

pub struct RunArgs {
    pub r033: PathBuf,
    pub r065: PathBuf,
    pub common: Common,
    pub warehouse: Option<PathBuf>,
    pub csv_dir: Option<PathBuf>,
    pub json: bool,
}

/// Success envelope printed with `--json`.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub message: String,
    pub rows_processed: usize,
    pub filename: String,
    pub gcs_path: String,
    pub download_url: String,
    pub timestamp: String,
    /// Data rows read from each input, and R065 rows left after the filter.
    pub rows_r033: usize,
    pub rows_r065_original: usize,
    pub rows_r065_filtrado: usize,
    pub invalid_row_count: usize,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    match run_and_store(&args) {
        Ok(response) => {
            if args.json {
                print_json(&response)?;
            }
            eprintln!(
                "reconciled {} rows ({} invalid) -> {}",
                response.rows_processed, response.invalid_row_count, response.gcs_path,
            );
            for warning in &response.warnings {
                eprintln!("warning: {}", describe_warning(warning));
            }
            Ok(())
        }
        Err(err) => {
            if args.json {
                print_json(&FailureResponse { success: false, error: err.message.clone() })?;
            }
            Err(err)
        }
    }
}

fn run_and_store(args: &RunArgs) -> Result<RunResponse, CliError> {
    let config = load_config(&args.common)?;
    let input = ReconInput {
        r033: read_path(&args.r033).map_err(CliError::recon)?,
        r065: read_path(&args.r065).map_err(CliError::recon)?,
    };

    let output = vpn_recon::run(&config, &input).map_err(CliError::failure)?;

    let bytes = xlsx::write_artifact(&output.artifact).map_err(CliError::recon)?;
    let filename = format!("{}.xlsx", output.artifact.name());
    let store = LocalStore::new(&args.common.store, config.storage.prefix.as_str());
    let stored = store
        .put(output.artifact.generated_at().date(), &filename, &bytes)
        .map_err(CliError::recon)?;

    if let Some(dir) = &args.csv_dir {
        write_csv_views(dir, &output)?;
    }

    if let Some(path) = &args.warehouse {
        let ctx = LoadContext {
            ingested_at: output.meta.timestamp.clone(),
            source_r065_file: input.r065.source.clone(),
            source_r033_file: input.r033.source.clone(),
        };
        let mut sink = NdjsonWarehouse::new(path);
        sink.append(&warehouse::rows(&output.records, &ctx)).map_err(CliError::recon)?;
    }

    info!(config = %config.name, filename = %stored.filename, "run complete");
    Ok(RunResponse {
        success: true,
        message: format!("Reporte generado: {}", stored.filename),
        rows_processed: output.meta.rows_processed,
        filename: stored.filename,
        gcs_path: stored.gcs_path,
        download_url: stored.download_url,
        timestamp: output.meta.timestamp,
        rows_r033: output.meta.r033.data_rows,
        rows_r065_original: output.meta.r065.data_rows,
        rows_r065_filtrado: output.meta.r065.valid_rows - output.meta.filtered_out,
        invalid_row_count: output.meta.invalid_row_count,
        warnings: output.meta.warnings,
    })
}

fn write_csv_views(dir: &Path, output: &ReconOutput) -> Result<(), CliError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CliError::io(format!("cannot create {}: {}", dir.display(), e.kind())))?;
    for view in output.artifact.views() {
        let path = dir.join(format!("{}_{}.csv", output.artifact.name(), view.name()));
        let bytes = csv::view_to_bytes(view).map_err(CliError::recon)?;
        std::fs::write(&path, bytes)
            .map_err(|e| CliError::io(format!("cannot write {}: {}", path.display(), e.kind())))?;
    }
    Ok(())
}

fn describe_warning(warning: &Warning) -> String {
    match warning {
        Warning::TypeCoercion { source, invalid_rows, nulled_fields } => {
            format!("{source}: {invalid_rows} rows rejected, {nulled_fields} fields nulled")
        }
        Warning::DuplicateKeyPolicyApplied { duplicates, sample } => {
            format!("{duplicates} duplicate purchase orders, last row kept ({})", sample.join(", "))
        }
        Warning::UnmatchedPurchaseOrders { rows } => {
            format!("{rows} rows have no matching purchase order")
        }
        Warning::EmptyResult => "no rows survived the message filter".to_string(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    println!("{text}");
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(common: &Common, r033: Option<PathBuf>, r065: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(common)?;
    println!(
        "config '{}' OK: {} message codes, {} payment rules",
        config.name,
        config.filter.messages.len(),
        config.payment_groups.rules.len(),
    );

    if let Some(path) = r033 {
        check_header(&config, &path, &config.r033, R033_FIELDS)?;
    }
    if let Some(path) = r065 {
        check_header(&config, &path, &config.r065, R065_FIELDS)?;
    }
    Ok(())
}

fn check_header(
    config: &ReconConfig,
    path: &Path,
    report: &vpn_recon::config::ReportConfig,
    fields: &[FieldSpec],
) -> Result<(), CliError> {
    let sheet = read_path(path).map_err(CliError::recon)?;
    let map = header::locate(&sheet, report, fields, config.header_scan_rows).map_err(CliError::recon)?;
    let mapped = fields.iter().filter(|f| map.column(f.name).is_some()).count();
    println!(
        "{}: header at row {} ({} of {} columns mapped)",
        sheet.source,
        map.header_row() + 1,
        mapped,
        fields.len(),
    );
    Ok(())
}
