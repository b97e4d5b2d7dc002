//! Template command: write an input file skeleton for a job

use clap::{Args, ValueEnum};
use std::path::PathBuf;

pub mod handler;

pub use handler::handle_template_command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobKind {
    Catalogs,
    AccessPackages,
    ResourceAssignments,
}

#[derive(Debug, Clone, Args)]
pub struct TemplateArgs {
    /// Job to write the header for
    #[arg(value_enum)]
    pub job: JobKind,

    /// Destination CSV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Overwrite the destination if it exists
    #[arg(long)]
    pub force: bool,
}
