use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_xlsxwriter::{Format, Workbook};
use tempfile::tempdir;
use vpn_io::store::{ArtifactStore, LocalStore};
use vpn_io::warehouse::{self, LoadContext, NdjsonWarehouse, WarehouseRow, WarehouseSink};
use vpn_io::{read_path, read_sheet, xlsx};
use vpn_recon::model::Warning;
use vpn_recon::{run_at, CellValue, ReconConfig, ReconInput};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-03-05T09:30:00-06:00").unwrap()
}

fn input() -> ReconInput {
    ReconInput {
        r033: read_path(&fixtures_dir().join("r033_win1252.csv")).unwrap(),
        r065: read_path(&fixtures_dir().join("r065.csv")).unwrap(),
    }
}

#[test]
fn csv_exports_reconcile_with_builtin_layout() {
    let config = ReconConfig::builtin().unwrap();
    let input = input();
    assert_eq!(input.r033.source, "r033_win1252.csv");
    assert_eq!(input.r033.cell(3, 3), &CellValue::Text("Ana Muñoz".into()));

    let out = run_at(&config, &input, now()).unwrap();

    assert_eq!(out.meta.r033.header_row, 2);
    assert_eq!(out.meta.r033.valid_rows, 3);
    assert_eq!(out.meta.r065.valid_rows, 5);
    assert_eq!(out.meta.filtered_out, 1);
    assert_eq!(out.meta.rows_processed, 4);
    assert!(out.meta.warnings.contains(&Warning::UnmatchedPurchaseOrders { rows: 1 }));
    assert!(out
        .meta
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::TypeCoercion { nulled_fields: 1, .. })));

    let groups: Vec<Option<&str>> = out.records.iter().map(|r| r.grupo_pago.as_deref()).collect();
    assert_eq!(
        groups,
        vec![
            Some("AJUSTE DE PRECIO"),
            Some("AJUSTE DE PRECIO"),
            Some("OC CERRADA"),
            Some("REVISION MANUAL"),
        ]
    );
    assert_eq!(out.records[0].cost_center.as_deref(), Some("CC-100"));
    assert_eq!(out.records[0].invoice.total_cents, 116_000);
    assert_eq!(out.records[0].invoice.invoice_date, NaiveDate::from_ymd_opt(2026, 3, 1));

    assert_eq!(out.summaries.len(), 2);
    let acme = &out.summaries[0];
    assert_eq!(acme.parent_vendor, "Acme S.A.");
    assert_eq!(acme.invoice_count, 2);
    // Item 10 appears on both F-001 and F-003.
    assert_eq!(acme.item_count, 2);
    assert_eq!(acme.total_cents, 127_600);
    assert_eq!(out.summaries[1].parent_vendor, "Beta SA de CV");
}

#[test]
fn xlsx_input_with_offset_range() {
    // Data starts at B3 so calamine reports a non-zero range start.
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("dd/mm/yyyy");
    let ws = workbook.add_worksheet();
    ws.write_string(0, 1, "Reporte R065").unwrap();
    let headers = ["Orden de Compra", "Factura", "Id Proveedor", "Proveedor", "Mensaje", "Total", "Fecha Factura"];
    for (i, h) in headers.iter().enumerate() {
        ws.write_string(2, 1 + i as u16, *h).unwrap();
    }
    ws.write_number(3, 1, 4500012345.0).unwrap();
    ws.write_string(3, 2, "F-001").unwrap();
    ws.write_string(3, 3, "V001").unwrap();
    ws.write_string(3, 4, "Acme S.A.").unwrap();
    ws.write_string(3, 5, "Diferencia en precio").unwrap();
    ws.write_number(3, 6, 1160.0).unwrap();
    ws.write_number_with_format(3, 7, 46082.0, &date).unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let sheet = read_sheet("r065.xlsx", &bytes).unwrap();
    assert_eq!(sheet.cell(2, 1), &CellValue::Text("Orden de Compra".into()));

    let config = ReconConfig::builtin().unwrap();
    let input = ReconInput {
        r033: read_path(&fixtures_dir().join("r033_win1252.csv")).unwrap(),
        r065: sheet,
    };
    let out = run_at(&config, &input, now()).unwrap();
    assert_eq!(out.meta.r065.header_row, 2);
    assert_eq!(out.records.len(), 1);
    let rec = &out.records[0];
    assert_eq!(rec.invoice.purchase_order, "4500012345");
    assert_eq!(rec.cost_center.as_deref(), Some("CC-100"));
    assert_eq!(rec.invoice.invoice_date, NaiveDate::from_ymd_opt(2026, 3, 1));
}

#[test]
fn artifact_is_stored_and_loaded() {
    let config = ReconConfig::builtin().unwrap();
    let input = input();
    let out = run_at(&config, &input, now()).unwrap();

    let dir = tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("store"), &config.storage.prefix);
    let filename = format!("{}.xlsx", out.artifact.name());
    let bytes = xlsx::write_artifact(&out.artifact).unwrap();
    let stored = store.put(now().date_naive(), &filename, &bytes).unwrap();
    assert_eq!(stored.gcs_path, "reportes/2026-03-05/reporte_vpn_20260305_093000.xlsx");

    let fetched = store.get(now().date_naive(), &filename).unwrap();
    let detail = read_sheet(&filename, &fetched).unwrap();
    assert_eq!(detail.rows.len(), out.meta.rows_processed + 1);

    let mut sink = NdjsonWarehouse::new(dir.path().join("warehouse.ndjson"));
    let ctx = LoadContext {
        ingested_at: out.meta.timestamp.clone(),
        source_r065_file: input.r065.source.clone(),
        source_r033_file: input.r033.source.clone(),
    };
    let written = sink.append(&warehouse::rows(&out.records, &ctx)).unwrap();
    assert_eq!(written, 4);

    let text = std::fs::read_to_string(sink.path()).unwrap();
    let first: WarehouseRow = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(first.source_r065_file, "r065.csv");
    assert_eq!(first.total, 1160.0);
    assert_eq!(first.grupo_pago.as_deref(), Some("AJUSTE DE PRECIO"));
}
