//! `vpn-recon`: R033/R065 purchase-order vs invoice-validation reconciliation engine.
//!
//! Pure engine crate: receives raw sheets already in memory, returns the
//! reconciled records, vendor rollup and report artifact.
//! No CLI or IO dependencies.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod header;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod sheet;

pub use config::ReconConfig;
pub use engine::{run, run_at, RunFailure, Stage};
pub use error::ReconError;
pub use model::{CellValue, RawSheet, ReconInput, ReconOutput, ReportArtifact, TabularView};
