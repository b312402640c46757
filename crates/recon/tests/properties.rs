//! Property tests over the pipeline stages.

use chrono::DateTime;
use proptest::prelude::*;

use vpn_recon::aggregate::aggregate;
use vpn_recon::config::MessageMatch;
use vpn_recon::filter::{filter_messages, AllowList};
use vpn_recon::header::locate;
use vpn_recon::model::{R033Record, R065Record};
use vpn_recon::reconcile::{reconcile, PurchaseOrderIndex};
use vpn_recon::schema::R033_FIELDS;
use vpn_recon::{run_at, CellValue, RawSheet, ReconConfig, ReconInput};

const CONFIG: &str = r#"
name = "Propiedades"

[r033.columns]
purchase_order = ["Orden de Compra"]
cost_center    = ["Centro de Costos"]
status         = ["Estatus"]

[r065.columns]
purchase_order = ["Orden de Compra"]
invoice_number = ["Factura"]
vendor_id      = ["Id Proveedor"]
vendor_name    = ["Proveedor"]
message        = ["Mensaje"]
item_key       = ["Partida"]
total          = ["Total"]

[filter.messages]
"ERR_A" = true
"ERR_B" = true
"OK"    = false
"#;

fn config() -> ReconConfig {
    ReconConfig::from_toml(CONFIG).unwrap()
}

// ============================================================================
// Strategies
// ============================================================================

fn arb_message() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ERR_A".to_string()),
        Just(" err_a ".to_string()),
        Just("ERR_B".to_string()),
        Just("OK".to_string()),
        Just("ERR_C".to_string()),
    ]
}

fn arb_invoice() -> impl Strategy<Value = R065Record> {
    (
        0u8..6,
        0u8..5,
        0u8..3,
        prop::option::of(0u8..4),
        arb_message(),
        0i64..1_000_000,
    )
        .prop_map(|(po, inv, vendor, item, message, total)| R065Record {
            row: 0,
            purchase_order: format!("PO{po}"),
            invoice_number: format!("INV{inv}"),
            vendor_id: format!("V{vendor}"),
            vendor_name: format!("Proveedor {vendor}"),
            message,
            item_key: item.map(|i| format!("P{i}")),
            item_description: None,
            quantity: None,
            unit_price_cents: None,
            subtotal_cents: None,
            tax_cents: None,
            total_cents: total,
            invoice_date: None,
            received_date: None,
            parent_vendor_id: None,
            parent_vendor_name: None,
            passthrough: Vec::new(),
        })
}

fn arb_invoices() -> impl Strategy<Value = Vec<R065Record>> {
    prop::collection::vec(arb_invoice(), 0..40).prop_map(|mut rows| {
        for (i, r) in rows.iter_mut().enumerate() {
            r.row = i + 1;
        }
        rows
    })
}

fn purchase_orders() -> Vec<R033Record> {
    (0..4)
        .map(|i| R033Record {
            row: i + 1,
            purchase_order: format!("PO{i}"),
            cost_center: format!("CC-{i}"),
            status: "Liberada".into(),
        })
        .collect()
}

fn allow_list() -> AllowList {
    AllowList::from_config(&config().filter)
}

fn text(s: &str) -> CellValue {
    CellValue::Text(s.to_string())
}

fn r065_sheet(rows: &[R065Record]) -> RawSheet {
    let mut out = vec![vec![
        text("Orden de Compra"),
        text("Factura"),
        text("Id Proveedor"),
        text("Proveedor"),
        text("Mensaje"),
        text("Partida"),
        text("Total"),
    ]];
    for r in rows {
        out.push(vec![
            text(&r.purchase_order),
            text(&r.invoice_number),
            text(&r.vendor_id),
            text(&r.vendor_name),
            text(&r.message),
            r.item_key.as_deref().map(text).unwrap_or_default(),
            CellValue::Number(r.total_cents as f64 / 100.0),
        ]);
    }
    RawSheet::new("r065.xlsx", out)
}

fn r033_sheet() -> RawSheet {
    let mut rows = vec![
        vec![text("Reporte R033")],
        vec![text("Orden de Compra"), text("Centro de Costos"), text("Estatus")],
    ];
    for po in purchase_orders() {
        rows.push(vec![text(&po.purchase_order), text(&po.cost_center), text(&po.status)]);
    }
    RawSheet::new("r033.xlsx", rows)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn filter_is_idempotent(rows in arb_invoices()) {
        let allow = allow_list();
        let once = filter_messages(rows, &allow);
        let twice = filter_messages(once.clone(), &allow);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn reconcile_is_one_to_one(rows in arb_invoices()) {
        let config = config();
        let filtered = filter_messages(rows, &allow_list());
        let expected: Vec<usize> = filtered.iter().map(|r| r.row).collect();

        let index = PurchaseOrderIndex::build(purchase_orders());
        let out = reconcile(filtered, &index, &config);
        let got: Vec<usize> = out.records.iter().map(|r| r.invoice.row).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn vendor_counts_are_bounded(rows in arb_invoices()) {
        let config = config();
        let index = PurchaseOrderIndex::build(purchase_orders());
        let records = reconcile(rows, &index, &config).records;

        for s in aggregate(&records) {
            let attributed = records
                .iter()
                .filter(|r| r.parent_vendor.id == s.parent_vendor_id)
                .count();
            prop_assert!(s.invoice_count >= 1);
            prop_assert!(s.invoice_count <= attributed);
            prop_assert!(s.item_count <= attributed);
            prop_assert!(s.total_cents >= 0);
        }
    }

    #[test]
    fn header_location_is_deterministic(banners in 0usize..15) {
        let config = config();
        let mut rows: Vec<Vec<CellValue>> = (0..banners)
            .map(|i| vec![text(&format!("Encabezado {i}")), CellValue::Empty])
            .collect();
        rows.extend(r033_sheet().rows.into_iter().skip(1));
        let sheet = RawSheet::new("r033.xlsx", rows);

        let a = locate(&sheet, &config.r033, R033_FIELDS, 20).unwrap();
        let b = locate(&sheet, &config.r033, R033_FIELDS, 20).unwrap();
        prop_assert_eq!(a.header_row(), banners);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn runs_are_deterministic(rows in arb_invoices()) {
        let config = config();
        let input = ReconInput { r033: r033_sheet(), r065: r065_sheet(&rows) };
        let now = DateTime::parse_from_rfc3339("2026-03-05T09:30:00+00:00").unwrap();

        let a = run_at(&config, &input, now).unwrap();
        let b = run_at(&config, &input, now).unwrap();
        prop_assert_eq!(&a.summaries, &b.summaries);
        prop_assert_eq!(a.meta.rows_processed, b.meta.rows_processed);
        prop_assert_eq!(a.artifact.detail(), b.artifact.detail());
    }
}

#[test]
fn prefix_allow_list_is_idempotent_on_fixed_rows() {
    let allow = AllowList::new(
        MessageMatch::Prefix,
        [("ERR".to_string(), true), ("ERR_C".to_string(), false)],
    );
    let rows: Vec<R065Record> = ["ERR_A x", "ERR_C y", "OK"]
        .iter()
        .enumerate()
        .map(|(i, m)| R065Record {
            row: i,
            purchase_order: "PO1".into(),
            invoice_number: "INV1".into(),
            vendor_id: "V1".into(),
            vendor_name: "Uno".into(),
            message: m.to_string(),
            item_key: None,
            item_description: None,
            quantity: None,
            unit_price_cents: None,
            subtotal_cents: None,
            tax_cents: None,
            total_cents: 0,
            invoice_date: None,
            received_date: None,
            parent_vendor_id: None,
            parent_vendor_name: None,
            passthrough: Vec::new(),
        })
        .collect();
    let once = filter_messages(rows, &allow);
    assert_eq!(once.len(), 1);
    assert_eq!(filter_messages(once.clone(), &allow), once);
}
