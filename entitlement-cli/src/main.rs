use clap::Parser;
use std::process::ExitCode;

mod api;
mod cli;
mod config;
mod input;
mod jobs;
mod logging;
mod policy;
mod report;
mod resolver;
mod roles;

#[cfg(test)]
mod testing;

use cli::commands::{run, template};
use cli::{Cli, Commands};
use config::Settings;
use jobs::{AccessPackageJob, CatalogJob, ResourceAssignmentJob};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = logging::init(cli.verbose, cli.command.log_file()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let settings = || Settings::load(cli.config.as_deref());

    match &cli.command {
        Commands::Template(args) => template::handle_template_command(args),
        Commands::Catalogs(args) => {
            run::handle_job_command(&CatalogJob, args, &settings()?).await
        }
        Commands::AccessPackages(args) => {
            run::handle_job_command(&AccessPackageJob, args, &settings()?).await
        }
        Commands::ResourceAssignments(args) => {
            run::handle_job_command(&ResourceAssignmentJob, args, &settings()?).await
        }
    }
}
