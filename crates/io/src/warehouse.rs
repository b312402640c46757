//! Warehouse loading: one flat 22-column row per reconciled record.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use vpn_recon::model::{cents_to_amount, ReconciledRecord};
use vpn_recon::ReconError;

/// Column order of the warehouse table.
pub const WAREHOUSE_COLUMNS: [&str; 22] = [
    "purchase_order",
    "invoice_number",
    "vendor_id",
    "vendor_name",
    "message",
    "item_key",
    "item_description",
    "quantity",
    "unit_price",
    "subtotal",
    "tax",
    "total",
    "invoice_date",
    "received_date",
    "cost_center",
    "estatus_r033",
    "grupo_pago",
    "ingested_at",
    "parent_vendor_id",
    "parent_vendor_name",
    "source_r065_file",
    "source_r033_file",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseRow {
    pub purchase_order: String,
    pub invoice_number: String,
    pub vendor_id: String,
    pub vendor_name: String,
    pub message: String,
    pub item_key: Option<String>,
    pub item_description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: f64,
    pub invoice_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub cost_center: Option<String>,
    pub estatus_r033: Option<String>,
    pub grupo_pago: Option<String>,
    /// RFC 3339.
    pub ingested_at: String,
    pub parent_vendor_id: String,
    pub parent_vendor_name: String,
    pub source_r065_file: String,
    pub source_r033_file: String,
}

/// Provenance stamped onto every row of one load.
#[derive(Debug, Clone)]
pub struct LoadContext {
    pub ingested_at: String,
    pub source_r065_file: String,
    pub source_r033_file: String,
}

impl WarehouseRow {
    pub fn from_record(rec: &ReconciledRecord, ctx: &LoadContext) -> Self {
        let inv = &rec.invoice;
        Self {
            purchase_order: inv.purchase_order.clone(),
            invoice_number: inv.invoice_number.clone(),
            vendor_id: inv.vendor_id.clone(),
            vendor_name: inv.vendor_name.clone(),
            message: inv.message.clone(),
            item_key: inv.item_key.clone(),
            item_description: inv.item_description.clone(),
            quantity: inv.quantity,
            unit_price: inv.unit_price_cents.map(cents_to_amount),
            subtotal: inv.subtotal_cents.map(cents_to_amount),
            tax: inv.tax_cents.map(cents_to_amount),
            total: cents_to_amount(inv.total_cents),
            invoice_date: inv.invoice_date,
            received_date: inv.received_date,
            cost_center: rec.cost_center.clone(),
            estatus_r033: rec.estatus_r033.clone(),
            grupo_pago: rec.grupo_pago.clone(),
            ingested_at: ctx.ingested_at.clone(),
            parent_vendor_id: rec.parent_vendor.id.clone(),
            parent_vendor_name: rec.parent_vendor.name.clone(),
            source_r065_file: ctx.source_r065_file.clone(),
            source_r033_file: ctx.source_r033_file.clone(),
        }
    }
}

pub fn rows(records: &[ReconciledRecord], ctx: &LoadContext) -> Vec<WarehouseRow> {
    records.iter().map(|r| WarehouseRow::from_record(r, ctx)).collect()
}

pub trait WarehouseSink {
    /// Append rows; returns how many were written.
    fn append(&mut self, rows: &[WarehouseRow]) -> Result<usize, ReconError>;
}

/// Appends newline-delimited JSON objects to a local file.
#[derive(Debug, Clone)]
pub struct NdjsonWarehouse {
    path: PathBuf,
}

impl NdjsonWarehouse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WarehouseSink for NdjsonWarehouse {
    /// The whole batch is encoded before the file is opened and lands in a
    /// single write, so an encoding failure leaves the file untouched.
    fn append(&mut self, rows: &[WarehouseRow]) -> Result<usize, ReconError> {
        let io_err = |e: std::io::Error| ReconError::Warehouse(format!("append failed: {}", e.kind()));
        if rows.is_empty() {
            return Ok(0);
        }

        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row)
                .map_err(|e| ReconError::Warehouse(format!("encode failed: {e}")))?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(&buf).map_err(io_err)?;

        info!(rows = rows.len(), "warehouse rows appended");
        Ok(rows.len())
    }
}
