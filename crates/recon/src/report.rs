//! Detail and summary views of a reconciliation run, plus audit copies of
//! the input sheets.

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::{
    cents_to_amount, CellValue, RawSheet, ReconciledRecord, ReportArtifact, TabularView,
    VendorSummary,
};
use crate::schema::{DERIVED_COLUMNS, R065_FIELDS};

pub const DETAIL_VIEW: &str = "detalle";
pub const SUMMARY_VIEW: &str = "resumen";
pub const FILTERED_VIEW: &str = "R065_Filtrado";
pub const R033_ORIGINAL_VIEW: &str = "R033_Original";
pub const R065_ORIGINAL_VIEW: &str = "R065_Original";
pub const SUMMARY_COLUMNS: &[&str] = &["vendor", "invoice_count", "total_amount", "item_count"];

/// Build timestamp stamped on every detail row.
pub const STAMP_COLUMN: &str = "fecha_procesamiento";

/// `reporte_vpn_<YYYYMMDD_HHMMSS>`.
pub fn artifact_name(generated_at: NaiveDateTime) -> String {
    format!("reporte_vpn_{}", generated_at.format("%Y%m%d_%H%M%S"))
}

/// Detail columns: every R065 field in canonical order, the R065 columns with
/// no canonical meaning, the derived fields, then the processing stamp.
pub fn detail_columns(passthrough: &[String]) -> Vec<String> {
    R065_FIELDS
        .iter()
        .map(|f| f.name.to_string())
        .chain(passthrough.iter().cloned())
        .chain(DERIVED_COLUMNS.iter().map(|c| c.to_string()))
        .chain(std::iter::once(STAMP_COLUMN.to_string()))
        .collect()
}

/// Assemble the artifact. `passthrough` names the extra R065 columns carried
/// on each record; `audit` views are appended after the summary unchanged.
pub fn build(
    records: &[ReconciledRecord],
    summaries: &[VendorSummary],
    passthrough: &[String],
    audit: Vec<TabularView>,
    generated_at: NaiveDateTime,
) -> ReportArtifact {
    let stamp = CellValue::Text(generated_at.format("%Y-%m-%d %H:%M:%S").to_string());
    let detail = TabularView::new(
        DETAIL_VIEW,
        detail_columns(passthrough),
        records
            .iter()
            .map(|rec| detail_row(rec, passthrough.len(), &stamp))
            .collect(),
    );
    let summary = TabularView::new(
        SUMMARY_VIEW,
        SUMMARY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        summaries.iter().map(summary_row).collect(),
    );
    ReportArtifact::new(artifact_name(generated_at), generated_at, detail, summary, audit)
}

// ---------------------------------------------------------------------------
// Audit views
// ---------------------------------------------------------------------------

/// Non-blank rows below `header_row`.
pub fn data_rows(sheet: &RawSheet, header_row: usize) -> Vec<usize> {
    ((header_row + 1)..sheet.rows.len())
        .filter(|&r| sheet.rows[r].iter().any(|c| !c.is_blank()))
        .collect()
}

/// `rows` of `sheet` as read, under the labels of its header row. Trailing
/// unlabeled columns are dropped.
pub fn sheet_view(
    name: &str,
    sheet: &RawSheet,
    header_row: usize,
    rows: impl IntoIterator<Item = usize>,
) -> TabularView {
    let labels: &[CellValue] = sheet.rows.get(header_row).map(Vec::as_slice).unwrap_or_default();
    let width = labels.iter().rposition(|c| !c.is_blank()).map_or(0, |i| i + 1);
    let columns = labels[..width]
        .iter()
        .map(|c| c.to_text().trim().to_string())
        .collect();
    let rows = rows
        .into_iter()
        .map(|r| (0..width).map(|c| sheet.cell(r, c).clone()).collect())
        .collect();
    TabularView::new(name, columns, rows)
}

// ---------------------------------------------------------------------------
// Row rendering
// ---------------------------------------------------------------------------

fn text(v: &str) -> CellValue {
    CellValue::Text(v.to_string())
}

fn opt_text(v: Option<&str>) -> CellValue {
    v.map(text).unwrap_or_default()
}

fn money(v: Option<i64>) -> CellValue {
    v.map(|c| CellValue::Number(cents_to_amount(c))).unwrap_or_default()
}

fn date(v: Option<NaiveDate>) -> CellValue {
    v.map(|d| CellValue::Date(d.and_time(chrono::NaiveTime::MIN)))
        .unwrap_or_default()
}

/// Must stay in step with `detail_columns`.
fn detail_row(rec: &ReconciledRecord, passthrough: usize, stamp: &CellValue) -> Vec<CellValue> {
    let inv = &rec.invoice;
    let mut row = vec![
        text(&inv.purchase_order),
        text(&inv.invoice_number),
        text(&inv.vendor_id),
        text(&inv.vendor_name),
        text(&inv.message),
        opt_text(inv.item_key.as_deref()),
        opt_text(inv.item_description.as_deref()),
        inv.quantity.map(CellValue::Number).unwrap_or_default(),
        money(inv.unit_price_cents),
        money(inv.subtotal_cents),
        money(inv.tax_cents),
        money(Some(inv.total_cents)),
        date(inv.invoice_date),
        date(inv.received_date),
        text(&rec.parent_vendor.id),
        text(&rec.parent_vendor.name),
    ];
    row.extend(
        (0..passthrough).map(|i| inv.passthrough.get(i).map(|(_, v)| v.clone()).unwrap_or_default()),
    );
    row.extend([
        opt_text(rec.cost_center.as_deref()),
        opt_text(rec.estatus_r033.as_deref()),
        opt_text(rec.grupo_pago.as_deref()),
        stamp.clone(),
    ]);
    row
}

fn summary_row(s: &VendorSummary) -> Vec<CellValue> {
    vec![
        text(&s.parent_vendor),
        CellValue::Number(s.invoice_count as f64),
        CellValue::Number(s.total_amount()),
        CellValue::Number(s.item_count as f64),
    ]
}
