// File I/O for the reconciliation engine: report input, artifact output,
// storage and warehouse collaborators.

pub mod csv;
pub mod store;
pub mod warehouse;
pub mod xlsx;

use std::path::Path;

use vpn_recon::{RawSheet, ReconError};

/// How a byte stream will be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Zip container (xlsx, xlsb, ods) or OLE compound file (xls).
    Workbook,
    /// Anything else is treated as delimited text.
    Delimited,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Sniff the container from its leading bytes; file names are not trusted.
pub fn detect_format(bytes: &[u8]) -> SheetFormat {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        SheetFormat::Workbook
    } else {
        SheetFormat::Delimited
    }
}

/// Materialize one uploaded report as a raw sheet.
pub fn read_sheet(source: &str, bytes: &[u8]) -> Result<RawSheet, ReconError> {
    if bytes.is_empty() {
        return Err(ReconError::InputFormat {
            source_name: source.to_string(),
            reason: "file is empty".into(),
        });
    }
    match detect_format(bytes) {
        SheetFormat::Workbook => xlsx::read_sheet(source, bytes),
        SheetFormat::Delimited => csv::read_sheet(source, bytes),
    }
}

/// Read a report from disk. Only the file name is kept as the sheet source,
/// so errors never echo the directory layout.
pub fn read_path(path: &Path) -> Result<RawSheet, ReconError> {
    let source = source_name(path);
    let bytes = std::fs::read(path).map_err(|e| ReconError::InputFormat {
        source_name: source.clone(),
        reason: e.kind().to_string(),
    })?;
    read_sheet(&source, &bytes)
}

pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}
