use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::VendorRef;
use crate::schema::{self, FieldSpec};

/// Config shipped with the crate, describing the standard R033/R065 layouts.
const BUILTIN_TOML: &str = include_str!("../config/default.recon.toml");

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// How many leading rows HeaderLocator inspects.
    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,
    pub r033: ReportConfig,
    pub r065: ReportConfig,
    pub filter: FilterConfig,
    #[serde(default)]
    pub payment_groups: PaymentGroupTable,
    /// vendor_id -> parent vendor, used when R065 carries no parent columns.
    #[serde(default)]
    pub vendor_parents: BTreeMap<String, VendorRef>,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_header_scan_rows() -> usize {
    20
}

// ---------------------------------------------------------------------------
// Report layout
// ---------------------------------------------------------------------------

/// Canonical field name -> accepted header labels.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub columns: BTreeMap<String, Vec<String>>,
}

impl ReportConfig {
    pub fn labels(&self, field: &str) -> &[String] {
        self.columns.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn validate(&self, report: &str, fields: &[FieldSpec]) -> Result<(), ReconError> {
        for name in self.columns.keys() {
            if schema::find(fields, name).is_none() {
                return Err(ReconError::ConfigValidation(format!(
                    "{report}: unknown column '{name}'"
                )));
            }
        }

        for field in fields.iter().filter(|f| f.required) {
            if self.labels(field.name).is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "{report}: required column '{}' has no header labels",
                    field.name
                )));
            }
        }

        for (name, labels) in &self.columns {
            if labels.iter().any(|l| l.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "{report}: column '{name}' has a blank header label"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Message filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub mode: MessageMatch,
    /// Message code -> include. With prefix matching the longest matching
    /// code decides, so a `false` entry can carve an exception out of a
    /// broader `true` prefix.
    pub messages: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageMatch {
    #[default]
    Exact,
    Prefix,
}

// ---------------------------------------------------------------------------
// Payment group decision table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentGroupTable {
    /// Group assigned when no rule matches.
    #[serde(default)]
    pub default: Option<String>,
    /// Evaluated in order; first match wins.
    #[serde(default)]
    pub rules: Vec<PaymentGroupRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentGroupRule {
    /// R033 status to match. Omitted matches any status, including a missing one.
    #[serde(default)]
    pub status: Option<String>,
    /// R065 message to match, compared like the filter. Omitted matches any.
    #[serde(default)]
    pub message: Option<String>,
    pub group: String,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { prefix: default_prefix() }
    }
}

fn default_prefix() -> String {
    "reportes".into()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The standard layout bundled with the crate.
    pub fn builtin() -> Result<Self, ReconError> {
        Self::from_toml(BUILTIN_TOML)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.header_scan_rows == 0 {
            return Err(ReconError::ConfigValidation(
                "header_scan_rows must be at least 1".into(),
            ));
        }

        self.r033.validate("r033", schema::R033_FIELDS)?;
        self.r065.validate("r065", schema::R065_FIELDS)?;

        if !self.filter.messages.values().any(|include| *include) {
            return Err(ReconError::ConfigValidation(
                "filter.messages must include at least one message code".into(),
            ));
        }
        if self.filter.messages.keys().any(|code| code.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "filter.messages contains a blank message code".into(),
            ));
        }

        for (i, rule) in self.payment_groups.rules.iter().enumerate() {
            if rule.group.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "payment_groups.rules[{i}]: group must not be blank"
                )));
            }
        }

        if self.storage.prefix.contains("..") {
            return Err(ReconError::ConfigValidation(
                "storage.prefix must not contain '..'".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MINIMAL: &str = r#"
name = "Test"

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
"OK"    = false
"#;

    #[test]
    fn parse_minimal() {
        let config = ReconConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.name, "Test");
        assert_eq!(config.header_scan_rows, 20);
        assert_eq!(config.filter.mode, MessageMatch::Exact);
        assert_eq!(config.r065.labels("total"), &["Total".to_string()]);
        assert!(config.r065.labels("tax").is_empty());
        assert!(config.payment_groups.rules.is_empty());
        assert_eq!(config.storage.prefix, "reportes");
    }

    #[test]
    fn builtin_config_is_valid() {
        let config = ReconConfig::builtin().unwrap();
        assert!(!config.payment_groups.rules.is_empty());
        for field in schema::R065_FIELDS {
            assert!(
                !config.r065.labels(field.name).is_empty(),
                "builtin config should label {}",
                field.name
            );
        }
    }

    #[test]
    fn parse_payment_groups_and_parents() {
        let input = format!(
            r#"{MINIMAL}
[payment_groups]
default = "REVISION"

[[payment_groups.rules]]
status = "Liberada"
message = "ERR_A"
group = "PAGO NORMAL"

[[payment_groups.rules]]
group = "OTRO"

[vendor_parents]
"V001" = {{ id = "P01", name = "Grupo Uno" }}
"#
        );
        let config = ReconConfig::from_toml(&input).unwrap();
        assert_eq!(config.payment_groups.default.as_deref(), Some("REVISION"));
        assert_eq!(config.payment_groups.rules.len(), 2);
        assert_eq!(config.payment_groups.rules[1].status, None);
        assert_eq!(config.vendor_parents["V001"].name, "Grupo Uno");
    }

    #[test]
    fn reject_unknown_column() {
        let input = MINIMAL.replace("item_key", "line_item");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("unknown column 'line_item'"));
    }

    #[test]
    fn reject_missing_required_column() {
        let input: String = MINIMAL
            .lines()
            .filter(|l| !l.starts_with("total"))
            .map(|l| format!("{l}\n"))
            .collect();
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'total'"));
    }

    #[test]
    fn reject_allow_list_without_includes() {
        let input = MINIMAL.replace("\"ERR_A\" = true", "\"ERR_A\" = false");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn reject_zero_scan_window() {
        let input = MINIMAL.replace("name = \"Test\"", "name = \"Test\"\nheader_scan_rows = 0");
        assert!(ReconConfig::from_toml(&input).is_err());
    }

    #[test]
    fn reject_invalid_match_mode() {
        let input = MINIMAL.replace("[filter.messages]", "[filter]\nmode = \"fuzzy\"\n\n[filter.messages]");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn prefix_mode_parses() {
        let input = MINIMAL.replace("[filter.messages]", "[filter]\nmode = \"prefix\"\n\n[filter.messages]");
        let config = ReconConfig::from_toml(&input).unwrap();
        assert_eq!(config.filter.mode, MessageMatch::Prefix);
    }
}
