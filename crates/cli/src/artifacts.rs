//! Stored report commands: `list`, `fetch`, `health`.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use vpn_io::store::{ArtifactStore, LocalStore, StoredArtifact};

use crate::{load_config, CliError, Common};

fn open_store(common: &Common) -> Result<LocalStore, CliError> {
    let config = load_config(common)?;
    Ok(LocalStore::new(&common.store, config.storage.prefix))
}

/// `list --json` envelope.
#[derive(Debug, Serialize)]
struct ListResponse {
    files: Vec<StoredArtifact>,
    count: usize,
}

pub fn cmd_list(common: &Common, date: Option<NaiveDate>, json: bool) -> Result<(), CliError> {
    let store = open_store(common)?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let listed = store.list(date).map_err(CliError::recon)?;

    if json {
        let response = ListResponse { count: listed.len(), files: listed };
        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    if listed.is_empty() {
        eprintln!("no reports stored for {}", date.format("%Y-%m-%d"));
    }
    for artifact in &listed {
        println!("{:>10}  {}  {}", artifact.size_bytes, artifact.created, artifact.gcs_path);
    }
    Ok(())
}

/// Date encoded in a generated report name (`reporte_vpn_YYYYMMDD_HHMMSS.xlsx`).
fn date_from_filename(filename: &str) -> Option<NaiveDate> {
    let rest = filename.strip_prefix("reporte_vpn_")?;
    let digits = rest.get(..8)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

pub fn cmd_fetch(
    common: &Common,
    filename: &str,
    date: Option<NaiveDate>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let date = match date.or_else(|| date_from_filename(filename)) {
        Some(d) => d,
        None => {
            return Err(CliError::args(format!("cannot tell which day '{filename}' was stored"))
                .with_hint("pass --date YYYY-MM-DD"))
        }
    };

    let store = open_store(common)?;
    let bytes = store.get(date, filename).map_err(CliError::recon)?;
    let dest = output.unwrap_or_else(|| PathBuf::from(filename));
    std::fs::write(&dest, &bytes)
        .map_err(|e| CliError::io(format!("cannot write {}: {}", dest.display(), e.kind())))?;
    eprintln!("wrote {} ({} bytes)", dest.display(), bytes.len());
    Ok(())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
    config: String,
    engine_version: &'static str,
    store: String,
}

const SERVICE_NAME: &str = "col_reporte_vpn";

pub fn cmd_health(common: &Common, json: bool) -> Result<(), CliError> {
    let config = load_config(common)?;
    let store = LocalStore::new(&common.store, config.storage.prefix.as_str());
    store.check().map_err(CliError::recon)?;

    let response = HealthResponse {
        status: "healthy",
        timestamp: Local::now().to_rfc3339(),
        service: SERVICE_NAME,
        config: config.name,
        engine_version: env!("CARGO_PKG_VERSION"),
        store: store.root().display().to_string(),
    };
    if json {
        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        println!("{}: config '{}', store {}", response.status, response.config, response.store);
    }
    Ok(())
}
