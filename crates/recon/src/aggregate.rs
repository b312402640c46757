use std::collections::{BTreeMap, BTreeSet};

use crate::model::{ReconciledRecord, VendorSummary};

/// Per-vendor accumulator. Invoice totals are kept per invoice so a total
/// repeated on every line of a multi-line invoice is only counted once.
#[derive(Default)]
struct VendorAcc {
    name: String,
    invoice_totals: BTreeMap<String, i64>,
    items: BTreeSet<String>,
    unkeyed_items: usize,
}

fn invoice_key(invoice_number: &str) -> String {
    invoice_number.trim().to_uppercase()
}

/// Group reconciled records by parent vendor, sorted by vendor name then id.
///
/// - `invoice_count`: distinct invoice numbers.
/// - `total_cents`: `total` of the first line seen for each distinct invoice.
/// - `item_count`: distinct item keys across the vendor's invoices; a line with
///   no item key counts as an item on its own.
pub fn aggregate(records: &[ReconciledRecord]) -> Vec<VendorSummary> {
    let mut groups: BTreeMap<String, VendorAcc> = BTreeMap::new();

    for rec in records {
        let acc = groups
            .entry(rec.parent_vendor.id.clone())
            .or_insert_with(|| VendorAcc {
                name: rec.parent_vendor.name.clone(),
                ..VendorAcc::default()
            });

        let invoice = invoice_key(&rec.invoice.invoice_number);
        acc.invoice_totals
            .entry(invoice)
            .or_insert(rec.invoice.total_cents);

        match rec.invoice.item_key.as_deref().map(str::trim) {
            Some(item) if !item.is_empty() => {
                acc.items.insert(item.to_uppercase());
            }
            _ => acc.unkeyed_items += 1,
        }
    }

    let mut summaries: Vec<VendorSummary> = groups
        .into_iter()
        .map(|(id, acc)| VendorSummary {
            parent_vendor_id: id,
            parent_vendor: acc.name,
            invoice_count: acc.invoice_totals.len(),
            total_cents: acc.invoice_totals.values().sum(),
            item_count: acc.items.len() + acc.unkeyed_items,
        })
        .collect();

    summaries.sort_by(|a, b| {
        a.parent_vendor
            .cmp(&b.parent_vendor)
            .then_with(|| a.parent_vendor_id.cmp(&b.parent_vendor_id))
    });
    summaries
}
