use std::fmt;

use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::aggregate::aggregate;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::filter::{filter_messages, AllowList};
use crate::header;
use crate::model::{ReconInput, ReconOutput, RunMeta, SheetStats, Warning};
use crate::reconcile::{reconcile, PurchaseOrderIndex};
use crate::report;
use crate::schema::{R033_FIELDS, R065_FIELDS};
use crate::sheet::{parse_r033, parse_r065};

/// Keys shown in a duplicate-key warning.
const DUPLICATE_SAMPLE: usize = 5;

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Pipeline states, in order. A failure reports the last state reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    HeadersLocated,
    Parsed,
    Filtered,
    Reconciled,
    Aggregated,
    Built,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::HeadersLocated => "headers_located",
            Self::Parsed => "parsed",
            Self::Filtered => "filtered",
            Self::Reconciled => "reconciled",
            Self::Aggregated => "aggregated",
            Self::Built => "built",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Terminal failure. No partial artifact exists when this is returned.
#[derive(Debug, Error)]
#[error("pipeline failed after '{stage}': {error}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub error: ReconError,
}

struct Pipeline {
    stage: Stage,
}

impl Pipeline {
    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage);
        self.stage = next;
    }

    fn fail(&self, error: ReconError) -> RunFailure {
        tracing::error!(stage = %self.stage, code = error.code(), "pipeline failed: {error}");
        RunFailure { stage: self.stage, error }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run the full pipeline, stamping the artifact with the local wall clock.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconOutput, RunFailure> {
    run_at(config, input, Local::now().fixed_offset())
}

/// Same as [`run`] with an explicit build timestamp.
pub fn run_at(
    config: &ReconConfig,
    input: &ReconInput,
    now: DateTime<FixedOffset>,
) -> Result<ReconOutput, RunFailure> {
    let mut p = Pipeline { stage: Stage::Received };
    info!(
        config = %config.name,
        r033 = %input.r033.source,
        r065 = %input.r065.source,
        "received inputs"
    );

    // Headers
    let scan = config.header_scan_rows;
    let r033_header = header::locate(&input.r033, &config.r033, R033_FIELDS, scan)
        .map_err(|e| p.fail(e))?;
    let r065_header = header::locate(&input.r065, &config.r065, R065_FIELDS, scan)
        .map_err(|e| p.fail(e))?;
    p.advance(Stage::HeadersLocated);
    info!(
        r033_header_row = r033_header.header_row(),
        r065_header_row = r065_header.header_row(),
        "headers located"
    );

    // Typed rows
    let r033 = parse_r033(&input.r033, &r033_header);
    let r065 = parse_r065(&input.r065, &r065_header);
    p.advance(Stage::Parsed);
    info!(
        r033_valid = r033.stats.valid_rows,
        r065_valid = r065.stats.valid_rows,
        invalid = r033.stats.invalid_rows + r065.stats.invalid_rows,
        "sheets parsed"
    );

    let mut warnings = Vec::new();
    for stats in [&r033.stats, &r065.stats] {
        if let Some(w) = coercion_warning(stats) {
            warnings.push(w);
        }
    }

    // Filter
    let allow = AllowList::from_config(&config.filter);
    let parsed_invoices = r065.rows.len();
    let filtered = filter_messages(r065.rows, &allow);
    let filtered_out = parsed_invoices - filtered.len();
    let kept_rows: Vec<usize> = filtered.iter().map(|r| r.row).collect();
    p.advance(Stage::Filtered);
    info!(kept = filtered.len(), dropped = filtered_out, "messages filtered");
    if filtered.is_empty() {
        warnings.push(Warning::EmptyResult);
    }

    // Join
    let index = PurchaseOrderIndex::build(r033.rows);
    if !index.duplicates().is_empty() {
        let mut sample: Vec<String> = Vec::new();
        for key in index.duplicates() {
            if sample.len() == DUPLICATE_SAMPLE {
                break;
            }
            if !sample.contains(key) {
                sample.push(key.clone());
            }
        }
        warnings.push(Warning::DuplicateKeyPolicyApplied {
            duplicates: index.duplicates().len(),
            sample,
        });
    }
    let joined = reconcile(filtered, &index, config);
    p.advance(Stage::Reconciled);
    info!(rows = joined.records.len(), unmatched = joined.unmatched, "rows reconciled");
    if joined.unmatched > 0 {
        warnings.push(Warning::UnmatchedPurchaseOrders { rows: joined.unmatched });
    }

    // Rollup
    let summaries = aggregate(&joined.records);
    p.advance(Stage::Aggregated);
    info!(vendors = summaries.len(), "vendors aggregated");

    // Artifact
    let passthrough: Vec<String> = r065_header
        .passthrough()
        .iter()
        .map(|(name, _)| name.clone())
        .collect();
    let r033_row = r033_header.header_row();
    let r065_row = r065_header.header_row();
    let audit = vec![
        report::sheet_view(report::FILTERED_VIEW, &input.r065, r065_row, kept_rows),
        report::sheet_view(
            report::R033_ORIGINAL_VIEW,
            &input.r033,
            r033_row,
            report::data_rows(&input.r033, r033_row),
        ),
        report::sheet_view(
            report::R065_ORIGINAL_VIEW,
            &input.r065,
            r065_row,
            report::data_rows(&input.r065, r065_row),
        ),
    ];
    let artifact = report::build(
        &joined.records,
        &summaries,
        &passthrough,
        audit,
        now.naive_local(),
    );
    p.advance(Stage::Built);
    info!(artifact = %artifact.name(), rows = artifact.row_count(), "report built");

    let meta = RunMeta {
        config_name: config.name.clone(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_filename: artifact.name().to_string(),
        timestamp: now.to_rfc3339(),
        rows_processed: joined.records.len(),
        invalid_row_count: r033.stats.invalid_rows + r065.stats.invalid_rows,
        filtered_out,
        r033: r033.stats,
        r065: r065.stats,
        warnings,
    };
    p.advance(Stage::Done);
    info!(rows_processed = meta.rows_processed, warnings = meta.warnings.len(), "done");

    Ok(ReconOutput {
        meta,
        records: joined.records,
        summaries,
        artifact,
    })
}

fn coercion_warning(stats: &SheetStats) -> Option<Warning> {
    (stats.invalid_rows > 0 || stats.coercion_warnings > 0).then(|| Warning::TypeCoercion {
        source: stats.source.clone(),
        invalid_rows: stats.invalid_rows,
        nulled_fields: stats.coercion_warnings,
    })
}
