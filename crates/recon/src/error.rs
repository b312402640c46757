use thiserror::Error;

/// Structural failures. Row-level problems never surface here; they are
/// counted in [`crate::model::RunMeta`] instead.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (unknown column, blank label, empty allow-list, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Input bytes could not be read as a spreadsheet.
    #[error("{source_name}: unreadable input: {reason}")]
    InputFormat { source_name: String, reason: String },
    /// No row in the scan window overlaps the required header labels at all.
    #[error("{source_name}: no header row found in the first {scanned} rows")]
    HeaderNotFound { source_name: String, scanned: usize },
    /// The best header candidate is missing some required columns.
    /// `row` is 1-based, as shown by spreadsheet tools.
    #[error(
        "{source_name}: header candidate at row {row} is missing required column(s): {}",
        .missing.join(", ")
    )]
    RequiredColumnMissing {
        source_name: String,
        row: usize,
        missing: Vec<String>,
    },
    /// Raised by an artifact store; the engine only passes it through.
    #[error("storage error: {0}")]
    Storage(String),
    /// Raised by a warehouse sink; the engine only passes it through.
    #[error("warehouse error: {0}")]
    Warehouse(String),
}

impl ReconError {
    /// Short machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "config_parse",
            Self::ConfigValidation(_) => "config_validation",
            Self::InputFormat { .. } => "input_format",
            Self::HeaderNotFound { .. } => "header_not_found",
            Self::RequiredColumnMissing { .. } => "required_column_missing",
            Self::Storage(_) => "storage",
            Self::Warehouse(_) => "warehouse",
        }
    }
}
