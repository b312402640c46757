//! Typed row extraction. Human-edited exports are expected to contain junk
//! rows; a row whose required fields fail coercion is dropped and counted.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::header::HeaderMap;
use crate::model::{CellValue, R033Record, R065Record, RawSheet, SheetStats};
use crate::schema::*;

/// Rows that survived coercion plus the statistics of the pass.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub stats: SheetStats,
}

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

/// Parse a financial number string:
/// - Strip `$` and whitespace
/// - Handle `(123.45)` → `-123.45`
/// - Accept both `1,234.56` and `1.234,56`
/// - Returns None if non-numeric characters remain after stripping
pub fn parse_financial_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (is_negative, inner) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (true, &trimmed[1..trimmed.len() - 1])
    } else {
        (false, trimmed)
    };

    let stripped: String = inner
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();
    let cleaned = normalize_separators(&stripped);

    if cleaned.is_empty() {
        return None;
    }

    for (i, c) in cleaned.chars().enumerate() {
        match c {
            '0'..='9' | '.' => {}
            '-' | '+' if i == 0 && !is_negative => {}
            _ => return None,
        }
    }

    let value: f64 = cleaned.parse().ok()?;
    Some(if is_negative { -value } else { value })
}

/// Rewrite grouping and decimal marks to plain `1234.56`. The rightmost mark
/// is the decimal separator when both appear. A lone comma followed by
/// exactly three digits is a thousands separator.
fn normalize_separators(s: &str) -> String {
    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');
    let decimal_comma = match (last_dot, last_comma) {
        (Some(d), Some(c)) => c > d,
        (None, Some(c)) => s.matches(',').count() == 1 && s.len() - c - 1 != 3,
        _ => false,
    };
    let repeated_dots = last_comma.is_none() && s.matches('.').count() > 1;

    s.chars()
        .filter_map(|c| match c {
            ',' if decimal_comma => Some('.'),
            ',' => None,
            '.' if decimal_comma || repeated_dots => None,
            other => Some(other),
        })
        .collect()
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];

/// Convert an Excel 1900-system serial to a date. Serial 60 is Excel's
/// phantom 1900-02-29 and has no date; serials below it count from 1899-12-31.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let epoch = match days {
        60 => return None,
        d if d < 60 => NaiveDate::from_ymd_opt(1899, 12, 31)?,
        _ => NaiveDate::from_ymd_opt(1899, 12, 30)?,
    }
    .and_hms_opt(0, 0, 0)?;
    let seconds = ((serial.fract() * 86_400.0).round()) as i64;
    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

pub fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// Outcome of coercing one cell.
enum Coerced<T> {
    Value(T),
    Blank,
    Invalid,
}

fn coerce_text(cell: &CellValue) -> Coerced<String> {
    if cell.is_blank() {
        return Coerced::Blank;
    }
    Coerced::Value(cell.to_text().trim().to_string())
}

fn coerce_number(cell: &CellValue) -> Coerced<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Coerced::Value(*n),
        CellValue::Text(s) if s.trim().is_empty() => Coerced::Blank,
        CellValue::Text(s) => match parse_financial_number(s) {
            Some(n) => Coerced::Value(n),
            None => Coerced::Invalid,
        },
        CellValue::Empty => Coerced::Blank,
        _ => Coerced::Invalid,
    }
}

fn coerce_date(cell: &CellValue) -> Coerced<NaiveDate> {
    match cell {
        CellValue::Date(dt) => Coerced::Value(dt.date()),
        CellValue::Number(n) => match excel_serial_to_datetime(*n) {
            Some(dt) => Coerced::Value(dt.date()),
            None => Coerced::Invalid,
        },
        CellValue::Text(s) if s.trim().is_empty() => Coerced::Blank,
        CellValue::Text(s) => match parse_date_text(s) {
            Some(d) => Coerced::Value(d),
            None => Coerced::Invalid,
        },
        CellValue::Empty => Coerced::Blank,
        CellValue::Bool(_) => Coerced::Invalid,
    }
}

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

// ---------------------------------------------------------------------------
// Row reader
// ---------------------------------------------------------------------------

/// Reads typed fields from one data row, remembering which required fields
/// failed and how many optional fields were nulled.
struct RowReader<'a> {
    sheet: &'a RawSheet,
    header: &'a HeaderMap,
    row: usize,
    failed_required: Vec<&'static str>,
    nulled_optional: usize,
}

impl<'a> RowReader<'a> {
    fn new(sheet: &'a RawSheet, header: &'a HeaderMap, row: usize) -> Self {
        Self {
            sheet,
            header,
            row,
            failed_required: Vec::new(),
            nulled_optional: 0,
        }
    }

    fn cell(&self, field: FieldSpec) -> &'a CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        match self.header.column(field.name) {
            Some(col) => self.sheet.cell(self.row, col),
            None => &EMPTY,
        }
    }

    fn settle<T>(&mut self, field: FieldSpec, coerced: Coerced<T>) -> Option<T> {
        match coerced {
            Coerced::Value(v) => Some(v),
            Coerced::Blank => {
                if field.required {
                    self.failed_required.push(field.name);
                }
                None
            }
            Coerced::Invalid => {
                if field.required {
                    self.failed_required.push(field.name);
                } else {
                    self.nulled_optional += 1;
                }
                None
            }
        }
    }

    fn text(&mut self, field: FieldSpec) -> Option<String> {
        debug_assert_eq!(field.ty, FieldType::Text);
        let coerced = coerce_text(self.cell(field));
        self.settle(field, coerced)
    }

    fn number(&mut self, field: FieldSpec) -> Option<f64> {
        debug_assert_eq!(field.ty, FieldType::Number);
        let coerced = coerce_number(self.cell(field));
        self.settle(field, coerced)
    }

    fn cents(&mut self, field: FieldSpec) -> Option<i64> {
        self.number(field).map(to_cents)
    }

    fn date(&mut self, field: FieldSpec) -> Option<NaiveDate> {
        debug_assert_eq!(field.ty, FieldType::Date);
        let coerced = coerce_date(self.cell(field));
        self.settle(field, coerced)
    }

    fn is_valid(&self) -> bool {
        self.failed_required.is_empty()
    }
}

fn row_is_blank(sheet: &RawSheet, row: usize) -> bool {
    sheet.rows[row].iter().all(|c| c.is_blank())
}

/// Walk every row below the header, skipping fully blank ones.
fn parse_rows<T>(
    sheet: &RawSheet,
    header: &HeaderMap,
    mut read: impl FnMut(&mut RowReader<'_>) -> Option<T>,
) -> Parsed<T> {
    let mut stats = SheetStats {
        source: sheet.source.clone(),
        header_row: header.header_row(),
        ..Default::default()
    };
    let mut rows = Vec::new();

    for row in (header.header_row() + 1)..sheet.rows.len() {
        if row_is_blank(sheet, row) {
            continue;
        }
        stats.data_rows += 1;

        let mut reader = RowReader::new(sheet, header, row);
        let record = read(&mut reader);
        stats.coercion_warnings += reader.nulled_optional;

        match record {
            Some(record) if reader.is_valid() => {
                stats.valid_rows += 1;
                rows.push(record);
            }
            _ => {
                debug!(
                    source = %sheet.source,
                    row,
                    fields = ?reader.failed_required,
                    "row rejected"
                );
                stats.record_invalid(row);
            }
        }
    }

    if stats.invalid_rows > 0 {
        warn!(
            source = %sheet.source,
            invalid = stats.invalid_rows,
            valid = stats.valid_rows,
            "rows rejected during coercion"
        );
    }

    Parsed { rows, stats }
}

// ---------------------------------------------------------------------------
// Report parsers
// ---------------------------------------------------------------------------

pub fn parse_r033(sheet: &RawSheet, header: &HeaderMap) -> Parsed<R033Record> {
    parse_rows(sheet, header, |r| {
        let purchase_order = r.text(PO_PURCHASE_ORDER);
        let cost_center = r.text(PO_COST_CENTER);
        let status = r.text(PO_STATUS);

        Some(R033Record {
            row: r.row,
            purchase_order: purchase_order?,
            cost_center: cost_center?,
            status: status?,
        })
    })
}

pub fn parse_r065(sheet: &RawSheet, header: &HeaderMap) -> Parsed<R065Record> {
    parse_rows(sheet, header, |r| {
        // Read every field before bailing so all failures are recorded.
        let purchase_order = r.text(INV_PURCHASE_ORDER);
        let invoice_number = r.text(INV_INVOICE_NUMBER);
        let vendor_id = r.text(INV_VENDOR_ID);
        let vendor_name = r.text(INV_VENDOR_NAME);
        let message = r.text(INV_MESSAGE);
        let item_key = r.text(INV_ITEM_KEY);
        let item_description = r.text(INV_ITEM_DESCRIPTION);
        let quantity = r.number(INV_QUANTITY);
        let unit_price_cents = r.cents(INV_UNIT_PRICE);
        let subtotal_cents = r.cents(INV_SUBTOTAL);
        let tax_cents = r.cents(INV_TAX);
        let total_cents = r.cents(INV_TOTAL);
        let invoice_date = r.date(INV_INVOICE_DATE);
        let received_date = r.date(INV_RECEIVED_DATE);
        let parent_vendor_id = r.text(INV_PARENT_VENDOR_ID);
        let parent_vendor_name = r.text(INV_PARENT_VENDOR_NAME);

        let passthrough = header
            .passthrough()
            .iter()
            .map(|(name, col)| (name.clone(), sheet.cell(r.row, *col).clone()))
            .collect();

        Some(R065Record {
            row: r.row,
            purchase_order: purchase_order?,
            invoice_number: invoice_number?,
            vendor_id: vendor_id?,
            vendor_name: vendor_name?,
            message: message?,
            item_key,
            item_description,
            quantity,
            unit_price_cents,
            subtotal_cents,
            tax_cents,
            total_cents: total_cents?,
            invoice_date,
            received_date,
            parent_vendor_id,
            parent_vendor_name,
            passthrough,
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
