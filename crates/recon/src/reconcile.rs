//! Join filtered R065 rows against R033 by purchase-order key.
//!
//! Left-join: a row whose purchase order is missing from R033 is kept with
//! null cost center and status. Duplicate R033 keys resolve last-write-wins.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::config::{MessageMatch, PaymentGroupTable, ReconConfig};
use crate::filter::{message_matches, normalize_message};
use crate::model::{R033Record, R065Record, ReconciledRecord, VendorRef};

// ---------------------------------------------------------------------------
// Key normalization
// ---------------------------------------------------------------------------

/// Trim, strip leading zeros, case-fold. An all-zero key collapses to "0".
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() && !trimmed.is_empty() {
        return "0".into();
    }
    stripped.to_lowercase()
}

// ---------------------------------------------------------------------------
// Purchase-order index
// ---------------------------------------------------------------------------

/// R033 rows keyed by normalized purchase order.
#[derive(Debug, Clone, Default)]
pub struct PurchaseOrderIndex {
    entries: HashMap<String, R033Record>,
    duplicates: Vec<String>,
}

impl PurchaseOrderIndex {
    /// Later rows overwrite earlier ones with the same key.
    pub fn build(rows: Vec<R033Record>) -> Self {
        let mut index = Self::default();
        for row in rows {
            let key = normalize_key(&row.purchase_order);
            if index.entries.insert(key.clone(), row).is_some() {
                index.duplicates.push(key);
            }
        }
        if !index.duplicates.is_empty() {
            warn!(
                duplicates = index.duplicates.len(),
                "duplicate purchase orders in R033, last row wins"
            );
        }
        debug!(orders = index.entries.len(), "purchase-order index built");
        index
    }

    pub fn get(&self, purchase_order: &str) -> Option<&R033Record> {
        self.entries.get(&normalize_key(purchase_order))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized keys that were overwritten, one entry per overwrite, in input order.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

// ---------------------------------------------------------------------------
// Payment group
// ---------------------------------------------------------------------------

impl PaymentGroupTable {
    /// First rule whose status and message both match; else the default.
    /// A rule naming a status never matches a row with no R033 status.
    pub fn resolve(&self, status: Option<&str>, message: &str, mode: MessageMatch) -> Option<&str> {
        let status = status.map(normalize_message);
        let message = normalize_message(message);

        self.rules
            .iter()
            .find(|rule| {
                let status_ok = match (&rule.status, &status) {
                    (None, _) => true,
                    (Some(want), Some(have)) => normalize_message(want) == *have,
                    (Some(_), None) => false,
                };
                let message_ok = match &rule.message {
                    None => true,
                    Some(want) => message_matches(mode, &message, &normalize_message(want)),
                };
                status_ok && message_ok
            })
            .map(|rule| rule.group.as_str())
            .or(self.default.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Parent vendor
// ---------------------------------------------------------------------------

/// Explicit parent columns first, then the configured hierarchy, then the vendor itself.
pub fn resolve_parent_vendor(row: &R065Record, parents: &BTreeMap<String, VendorRef>) -> VendorRef {
    match (&row.parent_vendor_id, &row.parent_vendor_name) {
        (Some(id), Some(name)) => VendorRef { id: id.clone(), name: name.clone() },
        (Some(id), None) => VendorRef { id: id.clone(), name: id.clone() },
        (None, Some(name)) => VendorRef { id: name.clone(), name: name.clone() },
        (None, None) => parents.get(row.vendor_id.trim()).cloned().unwrap_or_else(|| VendorRef {
            id: row.vendor_id.clone(),
            name: row.vendor_name.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub records: Vec<ReconciledRecord>,
    /// Rows whose purchase order is absent from R033.
    pub unmatched: usize,
}

/// One output per input row, in input order.
pub fn reconcile(rows: Vec<R065Record>, index: &PurchaseOrderIndex, config: &ReconConfig) -> Reconciled {
    let mut unmatched = 0;
    let records = rows
        .into_iter()
        .map(|row| {
            let po = index.get(&row.purchase_order);
            if po.is_none() {
                unmatched += 1;
            }
            let cost_center = po.map(|p| p.cost_center.clone());
            let estatus_r033 = po.map(|p| p.status.clone());
            let grupo_pago = config
                .payment_groups
                .resolve(estatus_r033.as_deref(), &row.message, config.filter.mode)
                .map(str::to_string);
            let parent_vendor = resolve_parent_vendor(&row, &config.vendor_parents);

            ReconciledRecord {
                invoice: row,
                cost_center,
                estatus_r033,
                grupo_pago,
                parent_vendor,
            }
        })
        .collect::<Vec<_>>();

    if unmatched > 0 {
        warn!(rows = unmatched, "R065 rows reference purchase orders missing from R033");
    }

    Reconciled { records, unmatched }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
