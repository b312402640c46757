//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | recon            | Config, input and header failures        |
//! | 10-19   | output           | Artifact store and warehouse failures    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into [`recon_exit_code`]

use vpn_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors. Warnings (empty result,
/// unmatched purchase orders) still exit 0.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (3-9)
// =============================================================================

/// Config file unreadable, unparseable or failing validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// Input report unreadable (not a workbook, not decodable text, missing file).
pub const EXIT_RECON_INPUT: u8 = 4;

/// No header row found within the scan window.
pub const EXIT_RECON_HEADER_NOT_FOUND: u8 = 5;

/// Header row found but some required columns are absent.
pub const EXIT_RECON_MISSING_COLUMN: u8 = 6;

// =============================================================================
// Output (10-19)
// =============================================================================

/// Artifact store rejected a write or read.
pub const EXIT_STORAGE: u8 = 10;

/// Warehouse sink rejected the load.
pub const EXIT_WAREHOUSE: u8 = 11;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::InputFormat { .. } => EXIT_RECON_INPUT,
        ReconError::HeaderNotFound { .. } => EXIT_RECON_HEADER_NOT_FOUND,
        ReconError::RequiredColumnMissing { .. } => EXIT_RECON_MISSING_COLUMN,
        ReconError::Storage(_) => EXIT_STORAGE,
        ReconError::Warehouse(_) => EXIT_WAREHOUSE,
    }
}
