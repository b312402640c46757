use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// One spreadsheet cell as read from the source file, before any coercion.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    /// Empty cells and whitespace-only text both count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the cell as text. Whole numbers drop the decimal point so that
    /// keys stored as floats (`1234.0`) read back as `1234`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Self::Date(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    dt.date().format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }
}

/// A sheet exactly as it came out of the file: banner rows, header row and
/// data rows are all still mixed together.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub source: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(source: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { source: source.into(), rows }
    }

    /// Cell at (row, col); positions past the ragged edge read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY)
    }
}

/// Both reports, fully materialized.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub r033: RawSheet,
    pub r065: RawSheet,
}

// ---------------------------------------------------------------------------
// Typed records
// ---------------------------------------------------------------------------

/// Purchase-order row from R033.
#[derive(Debug, Clone, PartialEq)]
pub struct R033Record {
    /// 0-based row index in the raw sheet.
    pub row: usize,
    pub purchase_order: String,
    pub cost_center: String,
    pub status: String,
}

/// Invoice-validation row from R065. Money is held in cents.
#[derive(Debug, Clone, PartialEq)]
pub struct R065Record {
    /// 0-based row index in the raw sheet.
    pub row: usize,
    pub purchase_order: String,
    pub invoice_number: String,
    pub vendor_id: String,
    pub vendor_name: String,
    pub message: String,
    pub item_key: Option<String>,
    pub item_description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price_cents: Option<i64>,
    pub subtotal_cents: Option<i64>,
    pub tax_cents: Option<i64>,
    pub total_cents: i64,
    pub invoice_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub parent_vendor_id: Option<String>,
    pub parent_vendor_name: Option<String>,
    /// Cells under header labels with no canonical meaning, in sheet order.
    pub passthrough: Vec<(String, CellValue)>,
}

/// Vendor-hierarchy node used for the summary rollup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VendorRef {
    pub id: String,
    pub name: String,
}

/// An R065 row joined against the purchase-order index.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub invoice: R065Record,
    /// `None` when the purchase order is absent from R033.
    pub cost_center: Option<String>,
    pub estatus_r033: Option<String>,
    pub grupo_pago: Option<String>,
    pub parent_vendor: VendorRef,
}

/// Per-parent-vendor rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorSummary {
    pub parent_vendor_id: String,
    pub parent_vendor: String,
    /// Distinct invoice numbers.
    pub invoice_count: usize,
    /// Sum of `total`, taken once per distinct invoice.
    pub total_cents: i64,
    /// Distinct item keys across all of the vendor's invoices.
    pub item_count: usize,
}

impl VendorSummary {
    pub fn total_amount(&self) -> f64 {
        cents_to_amount(self.total_cents)
    }
}

pub fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A named table: column headers plus rows of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabularView {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularView {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { name: name.into(), columns, rows }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// The finished report: detail and summary views, stamped with its build time,
/// plus audit copies of the inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportArtifact {
    name: String,
    generated_at: NaiveDateTime,
    row_count: usize,
    detail: TabularView,
    summary: TabularView,
    audit: Vec<TabularView>,
}

impl ReportArtifact {
    pub(crate) fn new(
        name: String,
        generated_at: NaiveDateTime,
        detail: TabularView,
        summary: TabularView,
        audit: Vec<TabularView>,
    ) -> Self {
        Self {
            name,
            generated_at,
            row_count: detail.rows().len(),
            detail,
            summary,
            audit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generated_at(&self) -> NaiveDateTime {
        self.generated_at
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn detail(&self) -> &TabularView {
        &self.detail
    }

    pub fn summary(&self) -> &TabularView {
        &self.summary
    }

    /// Filtered R065 rows and both inputs as read, below their header rows.
    pub fn audit(&self) -> &[TabularView] {
        &self.audit
    }

    /// Every view in workbook order: detail, summary, then the audit views.
    pub fn views(&self) -> Vec<&TabularView> {
        let mut views = vec![&self.detail, &self.summary];
        views.extend(self.audit.iter());
        views
    }
}

// ---------------------------------------------------------------------------
// Run metadata
// ---------------------------------------------------------------------------

/// Per-sheet parse statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetStats {
    pub source: String,
    /// 0-based index of the detected header row.
    pub header_row: usize,
    pub data_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    /// 0-based indices of rejected rows, capped at [`SheetStats::MAX_REPORTED_ROWS`].
    pub invalid_row_indices: Vec<usize>,
    pub coercion_warnings: usize,
}

impl SheetStats {
    pub const MAX_REPORTED_ROWS: usize = 50;

    pub(crate) fn record_invalid(&mut self, row: usize) {
        self.invalid_rows += 1;
        if self.invalid_row_indices.len() < Self::MAX_REPORTED_ROWS {
            self.invalid_row_indices.push(row);
        }
    }
}

/// Non-fatal conditions absorbed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Rows rejected or fields nulled because a cell did not coerce.
    TypeCoercion {
        source: String,
        invalid_rows: usize,
        nulled_fields: usize,
    },
    /// Duplicate purchase-order keys in R033; the later row won.
    DuplicateKeyPolicyApplied { duplicates: usize, sample: Vec<String> },
    /// Filtered R065 rows whose purchase order is absent from R033.
    UnmatchedPurchaseOrders { rows: usize },
    /// Nothing survived the message filter.
    EmptyResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub generated_filename: String,
    pub timestamp: String,
    pub rows_processed: usize,
    pub invalid_row_count: usize,
    pub filtered_out: usize,
    pub r033: SheetStats,
    pub r065: SheetStats,
    pub warnings: Vec<Warning>,
}

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct ReconOutput {
    pub meta: RunMeta,
    pub records: Vec<ReconciledRecord>,
    pub summaries: Vec<VendorSummary>,
    pub artifact: ReportArtifact,
}
