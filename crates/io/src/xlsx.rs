// Excel file import (xlsx, xls, xlsb, ods) and artifact export (xlsx only)
//
// Import: first non-empty worksheet, positioned so row/column indices match
//         what the user sees in Excel.
// Export: one worksheet per artifact view, header row frozen.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::debug;
use vpn_recon::sheet::excel_serial_to_datetime;
use vpn_recon::{CellValue, RawSheet, ReconError, ReportArtifact, TabularView};

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

pub fn read_sheet(source: &str, bytes: &[u8]) -> Result<RawSheet, ReconError> {
    let input_err = |reason: String| ReconError::InputFormat {
        source_name: source.to_string(),
        reason,
    };

    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| input_err(format!("failed to open workbook: {e}")))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(input_err("workbook contains no sheets".into()));
    }

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| input_err(format!("failed to read sheet '{sheet_name}': {e}")))?;

        let (height, width) = range.get_size();
        if height == 0 || width == 0 {
            continue;
        }

        // Range start offset (data may not begin at A1)
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
        for row in range.rows() {
            let mut cells = vec![CellValue::Empty; start_col as usize];
            cells.extend(row.iter().map(convert_cell));
            rows.push(cells);
        }

        debug!(source, sheet = %sheet_name, rows = rows.len(), "worksheet loaded");
        return Ok(RawSheet::new(source, rows));
    }

    Ok(RawSheet::new(source, Vec::new()))
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
        Data::DateTime(dt) => {
            // 1900 date system assumed, as Excel on Windows writes it.
            let serial = dt.as_f64();
            match excel_serial_to_datetime(serial) {
                Some(d) => CellValue::Date(d),
                None => CellValue::Number(serial),
            }
        }
        Data::DateTimeIso(s) => parse_iso(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn storage_err(e: XlsxError) -> ReconError {
    ReconError::Storage(format!("xlsx export failed: {e}"))
}

/// Render the artifact as an in-memory xlsx workbook.
pub fn write_artifact(artifact: &ReportArtifact) -> Result<Vec<u8>, ReconError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let date = Format::new().set_num_format("yyyy-mm-dd");

    for view in artifact.views() {
        let worksheet = workbook
            .add_worksheet()
            .set_name(view.name())
            .map_err(storage_err)?;
        write_view(worksheet, view, &header, &date)?;
    }

    workbook.save_to_buffer().map_err(storage_err)
}

fn write_view(
    worksheet: &mut Worksheet,
    view: &TabularView,
    header: &Format,
    date: &Format,
) -> Result<(), ReconError> {
    for (col, name) in view.columns().iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, name, header)
            .map_err(storage_err)?;
    }

    for (r, row) in view.rows().iter().enumerate() {
        let row32 = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let col16 = c as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    worksheet.write_string(row32, col16, s).map_err(storage_err)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(row32, col16, *n).map_err(storage_err)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row32, col16, *b).map_err(storage_err)?;
                }
                CellValue::Date(dt) => {
                    worksheet
                        .write_number_with_format(row32, col16, excel_serial(*dt), date)
                        .map_err(storage_err)?;
                }
            }
        }
    }

    worksheet.set_freeze_panes(1, 0).map_err(storage_err)?;
    worksheet.autofit();
    Ok(())
}

/// Days since 1899-12-30, matching the 1900 date system for dates after February 1900.
fn excel_serial(dt: NaiveDateTime) -> f64 {
    dt.and_utc().timestamp_millis() as f64 / 86_400_000.0 + 25_569.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpn_recon::model::{R065Record, ReconciledRecord, VendorRef, VendorSummary};
    use vpn_recon::report;

    fn artifact() -> ReportArtifact {
        let record = ReconciledRecord {
            invoice: R065Record {
                row: 1,
                purchase_order: "4500012345".into(),
                invoice_number: "INV1".into(),
                vendor_id: "V1".into(),
                vendor_name: "Acme".into(),
                message: "Diferencia en precio".into(),
                item_key: Some("10".into()),
                item_description: None,
                quantity: Some(2.0),
                unit_price_cents: Some(5000),
                subtotal_cents: Some(10000),
                tax_cents: Some(1600),
                total_cents: 11600,
                invoice_date: NaiveDate::from_ymd_opt(2026, 3, 1),
                received_date: None,
                parent_vendor_id: None,
                parent_vendor_name: None,
                passthrough: Vec::new(),
            },
            cost_center: Some("CC-100".into()),
            estatus_r033: Some("Liberada".into()),
            grupo_pago: Some("AJUSTE DE PRECIO".into()),
            parent_vendor: VendorRef { id: "V1".into(), name: "Acme".into() },
        };
        let summary = VendorSummary {
            parent_vendor_id: "V1".into(),
            parent_vendor: "Acme".into(),
            invoice_count: 1,
            total_cents: 11600,
            item_count: 1,
        };
        let at = NaiveDate::from_ymd_opt(2026, 3, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let input = RawSheet::new(
            "r065.csv",
            vec![
                vec![CellValue::Text("ORDEN COMPRA".into()), CellValue::Text("NRO FACTURA".into())],
                vec![CellValue::Text("4500012345".into()), CellValue::Text("INV1".into())],
            ],
        );
        let audit = vec![
            report::sheet_view(report::FILTERED_VIEW, &input, 0, vec![1]),
            report::sheet_view(report::R033_ORIGINAL_VIEW, &input, 0, Vec::new()),
            report::sheet_view(report::R065_ORIGINAL_VIEW, &input, 0, vec![1]),
        ];
        report::build(&[record], &[summary], &[], audit, at)
    }

    #[test]
    fn serial_matches_excel() {
        let dt = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_time(NaiveTime::MIN);
        assert_eq!(excel_serial(dt), 46082.0);
        assert_eq!(excel_serial_to_datetime(excel_serial(dt)), Some(dt));
    }

    #[test]
    fn artifact_reads_back() {
        let artifact = artifact();
        let bytes = write_artifact(&artifact).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        // First worksheet is the detail view.
        let sheet = read_sheet("reporte.xlsx", &bytes).unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.cell(0, 0), &CellValue::Text("purchase_order".into()));

        let detail = artifact.detail();
        let col = |name: &str| detail.column_index(name).unwrap();
        assert_eq!(sheet.cell(1, col("purchase_order")).to_text(), "4500012345");
        assert_eq!(sheet.cell(1, col("total")), &CellValue::Number(116.0));
        assert_eq!(sheet.cell(1, col("invoice_date")).to_text(), "2026-03-01");
        assert_eq!(sheet.cell(1, col("received_date")), &CellValue::Empty);
    }

    #[test]
    fn artifact_has_every_view() {
        let bytes = write_artifact(&artifact()).unwrap();
        let mut workbook: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "detalle".to_string(),
                "resumen".to_string(),
                "R065_Filtrado".to_string(),
                "R033_Original".to_string(),
                "R065_Original".to_string(),
            ]
        );

        let filtered = workbook.worksheet_range("R065_Filtrado").unwrap();
        assert_eq!(filtered.get_size(), (2, 2));
        assert_eq!(filtered.get((1, 1)), Some(&Data::String("INV1".into())));
        // Audit views with no rows still carry their header.
        let r033 = workbook.worksheet_range("R033_Original").unwrap();
        assert_eq!(r033.get_size(), (1, 2));
    }

    #[test]
    fn garbage_is_input_format_error() {
        let err = read_sheet("r033.xlsx", b"PK\x03\x04not really a zip").unwrap_err();
        assert!(matches!(err, ReconError::InputFormat { .. }));
    }
}
