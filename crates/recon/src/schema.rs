//! Canonical field declarations for the two fixed report shapes.
//!
//! Each report's config maps these canonical names to the header labels that
//! appear in the actual files. The type and requiredness are fixed here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

const fn field(name: &'static str, ty: FieldType, required: bool) -> FieldSpec {
    FieldSpec { name, ty, required }
}

// ---------------------------------------------------------------------------
// R033: purchase orders
// ---------------------------------------------------------------------------

pub const PO_PURCHASE_ORDER: FieldSpec = field("purchase_order", FieldType::Text, true);
pub const PO_COST_CENTER: FieldSpec = field("cost_center", FieldType::Text, true);
pub const PO_STATUS: FieldSpec = field("status", FieldType::Text, true);

pub const R033_FIELDS: &[FieldSpec] = &[PO_PURCHASE_ORDER, PO_COST_CENTER, PO_STATUS];

// ---------------------------------------------------------------------------
// R065: invoice validation results
// ---------------------------------------------------------------------------

pub const INV_PURCHASE_ORDER: FieldSpec = field("purchase_order", FieldType::Text, true);
pub const INV_INVOICE_NUMBER: FieldSpec = field("invoice_number", FieldType::Text, true);
pub const INV_VENDOR_ID: FieldSpec = field("vendor_id", FieldType::Text, true);
pub const INV_VENDOR_NAME: FieldSpec = field("vendor_name", FieldType::Text, true);
pub const INV_MESSAGE: FieldSpec = field("message", FieldType::Text, true);
pub const INV_ITEM_KEY: FieldSpec = field("item_key", FieldType::Text, false);
pub const INV_ITEM_DESCRIPTION: FieldSpec = field("item_description", FieldType::Text, false);
pub const INV_QUANTITY: FieldSpec = field("quantity", FieldType::Number, false);
pub const INV_UNIT_PRICE: FieldSpec = field("unit_price", FieldType::Number, false);
pub const INV_SUBTOTAL: FieldSpec = field("subtotal", FieldType::Number, false);
pub const INV_TAX: FieldSpec = field("tax", FieldType::Number, false);
pub const INV_TOTAL: FieldSpec = field("total", FieldType::Number, true);
pub const INV_INVOICE_DATE: FieldSpec = field("invoice_date", FieldType::Date, false);
pub const INV_RECEIVED_DATE: FieldSpec = field("received_date", FieldType::Date, false);
pub const INV_PARENT_VENDOR_ID: FieldSpec = field("parent_vendor_id", FieldType::Text, false);
pub const INV_PARENT_VENDOR_NAME: FieldSpec = field("parent_vendor_name", FieldType::Text, false);

/// R065 fields in canonical output order.
pub const R065_FIELDS: &[FieldSpec] = &[
    INV_PURCHASE_ORDER,
    INV_INVOICE_NUMBER,
    INV_VENDOR_ID,
    INV_VENDOR_NAME,
    INV_MESSAGE,
    INV_ITEM_KEY,
    INV_ITEM_DESCRIPTION,
    INV_QUANTITY,
    INV_UNIT_PRICE,
    INV_SUBTOTAL,
    INV_TAX,
    INV_TOTAL,
    INV_INVOICE_DATE,
    INV_RECEIVED_DATE,
    INV_PARENT_VENDOR_ID,
    INV_PARENT_VENDOR_NAME,
];

/// Columns the reconciler appends after the R065 fields.
pub const DERIVED_COLUMNS: &[&str] = &["cost_center", "estatus_r033", "grupo_pago"];

pub fn find(fields: &[FieldSpec], name: &str) -> Option<FieldSpec> {
    fields.iter().find(|f| f.name == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_are_unique() {
        for fields in [R033_FIELDS, R065_FIELDS] {
            let mut names: Vec<_> = fields.iter().map(|f| f.name).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), fields.len());
        }
    }

    #[test]
    fn join_key_is_required_on_both_sides() {
        assert!(find(R033_FIELDS, "purchase_order").unwrap().required);
        assert!(find(R065_FIELDS, "purchase_order").unwrap().required);
    }
}
