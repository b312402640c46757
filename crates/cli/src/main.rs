// vpnrecon - R033/R065 reconciliation from the command line

mod artifacts;
mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use vpn_recon::{ReconConfig, ReconError, RunFailure};

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "vpnrecon")]
#[command(about = "Reconcile R033 purchase orders against R065 invoice validations")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that touches config or storage.
#[derive(Args, Debug, Clone)]
pub struct Common {
    /// Reconciliation config (.recon.toml). The builtin layout is used when omitted.
    #[arg(long, short = 'c', env = "VPNRECON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Artifact store root directory
    #[arg(long, env = "VPNRECON_STORE", default_value = "store")]
    pub store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one R033/R065 pair and store the report
    #[command(after_help = "\
Examples:
  vpnrecon run --r033 R033.xlsx --r065 R065.xlsx
  vpnrecon run --r033 R033.csv --r065 R065.csv --config vpn.recon.toml --json
  vpnrecon run --r033 R033.xlsx --r065 R065.xlsx --warehouse facturas.ndjson")]
    Run {
        /// Purchase-order report (xlsx, xls, ods or csv)
        #[arg(long)]
        r033: PathBuf,

        /// Invoice-validation report (xlsx, xls, ods or csv)
        #[arg(long)]
        r065: PathBuf,

        #[command(flatten)]
        common: Common,

        /// Append reconciled rows to this NDJSON warehouse file
        #[arg(long)]
        warehouse: Option<PathBuf>,

        /// Also write each view as CSV into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Print the response envelope as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate a config, and optionally locate headers in sample reports
    #[command(after_help = "\
Examples:
  vpnrecon validate --config vpn.recon.toml
  vpnrecon validate --r033 R033.xlsx --r065 R065.xlsx")]
    Validate {
        #[command(flatten)]
        common: Common,

        #[arg(long)]
        r033: Option<PathBuf>,

        #[arg(long)]
        r065: Option<PathBuf>,
    },

    /// List stored reports for a date
    List {
        #[command(flatten)]
        common: Common,

        /// Day to list (YYYY-MM-DD); defaults to today
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        #[arg(long)]
        json: bool,
    },

    /// Copy a stored report out of the store
    Fetch {
        /// Stored file name, e.g. reporte_vpn_20260305_093000.xlsx
        filename: String,

        #[command(flatten)]
        common: Common,

        /// Day the report was stored (YYYY-MM-DD); defaults to the date in the file name
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Destination path; defaults to the file name in the current directory
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Check that the config loads and the store is usable
    Health {
        #[command(flatten)]
        common: Common,

        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  vpn-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("expected YYYY-MM-DD, got {s:?}"))
}

fn init_logging() {
    // stdout carries the JSON envelope only; all logging goes to stderr.
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Run { r033, r065, common, warehouse, csv_dir, json } => {
            recon::cmd_run(recon::RunArgs { r033, r065, common, warehouse, csv_dir, json })
        }
        Commands::Validate { common, r033, r065 } => recon::cmd_validate(&common, r033, r065),
        Commands::List { common, date, json } => artifacts::cmd_list(&common, date, json),
        Commands::Fetch { filename, common, date, output } => {
            artifacts::cmd_fetch(&common, &filename, date, output)
        }
        Commands::Health { common, json } => artifacts::cmd_health(&common, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Load the config named on the command line, or the builtin layout.
pub fn load_config(common: &Common) -> Result<ReconConfig, CliError> {
    let config = match &common.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::args(format!("cannot read config: {}", e.kind())))?;
            ReconConfig::from_toml(&text)
        }
        None => ReconConfig::builtin(),
    };
    config.map_err(CliError::recon)
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from an engine error with its registry exit code.
    pub fn recon(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::HeaderNotFound { .. } => {
                Some("check header labels in the config, or raise header_scan_rows".to_string())
            }
            ReconError::RequiredColumnMissing { .. } => {
                Some("add the report's label for the missing column to the config".to_string())
            }
            ReconError::InputFormat { .. } => {
                Some("expected an xlsx, xls, ods or csv export".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }

    /// Pipeline failure; the message names the last stage reached.
    pub fn failure(failure: RunFailure) -> Self {
        let message = failure.to_string();
        Self { message, ..Self::recon(failure.error) }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
