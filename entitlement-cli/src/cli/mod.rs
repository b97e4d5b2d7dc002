//! Command line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod commands;

use commands::run::JobArgs;
use commands::template::TemplateArgs;

#[derive(Debug, Parser)]
#[command(
    name = "entitlement-cli",
    version,
    about = "Provision Entra entitlement management objects from spreadsheets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create catalogs
    Catalogs(JobArgs),
    /// Create access packages with approval and auto-assignment policies
    AccessPackages(JobArgs),
    /// Add resources to catalogs and assign their roles to access packages
    ResourceAssignments(JobArgs),
    /// Write an empty input file with the header a job expects
    Template(TemplateArgs),
}

impl Commands {
    /// Log file requested by a job command, if any
    pub fn log_file(&self) -> Option<&Path> {
        match self {
            Commands::Catalogs(args)
            | Commands::AccessPackages(args)
            | Commands::ResourceAssignments(args) => args.log_file.as_deref(),
            Commands::Template(_) => None,
        }
    }
}
