//! Header-row detection for sheets that carry banner rows above the real headers.
//!
//! Each candidate row is scored by how many required fields it names (any
//! configured label counts). The first row naming all of them wins.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ReportConfig;
use crate::error::ReconError;
use crate::model::RawSheet;
use crate::schema::FieldSpec;

/// Trim, collapse internal whitespace, case-fold.
pub fn normalize_label(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Canonical field name -> column index, for one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    header_row: usize,
    columns: BTreeMap<&'static str, usize>,
    passthrough: Vec<(String, usize)>,
}

impl HeaderMap {
    /// 0-based index of the header row; data starts on the next row.
    pub fn header_row(&self) -> usize {
        self.header_row
    }

    pub fn column(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied()
    }

    /// Non-blank header cells that no canonical field claimed.
    pub fn passthrough(&self) -> &[(String, usize)] {
        &self.passthrough
    }
}

struct Target<'a> {
    field: FieldSpec,
    labels: Vec<String>,
    display: Option<&'a str>,
}

/// Locate the header row of `sheet` within the first `scan_rows` rows.
///
/// Fails with `HeaderNotFound` when no row names any required field, and with
/// `RequiredColumnMissing` (pointing at the best partial candidate) when some
/// row names only part of them.
pub fn locate(
    sheet: &RawSheet,
    report: &ReportConfig,
    fields: &[FieldSpec],
    scan_rows: usize,
) -> Result<HeaderMap, ReconError> {
    let targets: Vec<Target<'_>> = fields
        .iter()
        .map(|f| {
            let labels = report.labels(f.name);
            Target {
                field: *f,
                labels: labels.iter().map(|l| normalize_label(l)).collect(),
                display: labels.first().map(|s| s.as_str()),
            }
        })
        .collect();
    let required: Vec<&Target<'_>> = targets.iter().filter(|t| t.field.required).collect();

    let window = sheet.rows.len().min(scan_rows);
    let mut best: Option<(usize, usize)> = None;

    for row in 0..window {
        let cells: Vec<String> = sheet.rows[row]
            .iter()
            .map(|c| normalize_label(&c.to_text()))
            .collect();

        let hits = required
            .iter()
            .filter(|t| cells.iter().any(|c| t.labels.contains(c)))
            .count();

        if hits == required.len() {
            let map = build_map(sheet, row, &cells, &targets);
            debug!(
                source = %sheet.source,
                header_row = row,
                mapped = map.columns.len(),
                passthrough = map.passthrough.len(),
                "header row located"
            );
            return Ok(map);
        }

        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((row, hits));
        }
    }

    match best {
        None => Err(ReconError::HeaderNotFound {
            source_name: sheet.source.clone(),
            scanned: window,
        }),
        Some((row, _)) => {
            let cells: Vec<String> = sheet.rows[row]
                .iter()
                .map(|c| normalize_label(&c.to_text()))
                .collect();
            let missing = required
                .iter()
                .filter(|t| !cells.iter().any(|c| t.labels.contains(c)))
                .map(|t| match t.display {
                    Some(label) => format!("{} ({label})", t.field.name),
                    None => t.field.name.to_string(),
                })
                .collect();
            Err(ReconError::RequiredColumnMissing {
                source_name: sheet.source.clone(),
                row: row + 1,
                missing,
            })
        }
    }
}

/// Assign each field the leftmost unclaimed column carrying one of its labels.
/// Required fields claim first so an optional field can never steal their column.
fn build_map(sheet: &RawSheet, row: usize, cells: &[String], targets: &[Target<'_>]) -> HeaderMap {
    let mut claimed = vec![false; cells.len()];
    let mut columns = BTreeMap::new();

    let ordered = targets
        .iter()
        .filter(|t| t.field.required)
        .chain(targets.iter().filter(|t| !t.field.required));

    for target in ordered {
        let found = cells
            .iter()
            .enumerate()
            .find(|(i, c)| !claimed[*i] && target.labels.contains(*c));
        if let Some((i, _)) = found {
            claimed[i] = true;
            columns.insert(target.field.name, i);
        }
    }

    let passthrough = cells
        .iter()
        .enumerate()
        .filter(|(i, c)| !claimed[*i] && !c.is_empty())
        .map(|(i, _)| (sheet.cell(row, i).to_text().trim().to_string(), i))
        .collect();

    HeaderMap {
        header_row: row,
        columns,
        passthrough,
    }
}
