//! Job commands: load a spreadsheet and process it record by record

use clap::Args;
use std::path::PathBuf;

pub mod handler;

pub use handler::handle_job_command;

#[derive(Debug, Clone, Args)]
pub struct JobArgs {
    /// Input spreadsheet (.csv, .xlsx, .xlsm, .xls or .ods)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Also append log output to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Resolve everything but make no changes
    #[arg(long)]
    pub dry_run: bool,
}
