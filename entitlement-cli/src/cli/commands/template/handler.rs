use anyhow::{Context, Result, bail};
use colored::*;
use csv::Writer;
use std::path::Path;

use super::{JobKind, TemplateArgs};
use crate::input::FromRecord;
use crate::jobs::access_packages::AccessPackageRow;
use crate::jobs::catalogs::CatalogRow;
use crate::jobs::resource_assignments::ResourceAssignmentRow;

impl JobKind {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            JobKind::Catalogs => CatalogRow::REQUIRED_COLUMNS,
            JobKind::AccessPackages => AccessPackageRow::REQUIRED_COLUMNS,
            JobKind::ResourceAssignments => ResourceAssignmentRow::REQUIRED_COLUMNS,
        }
    }
}

pub fn handle_template_command(args: &TemplateArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            args.output.display()
        );
    }

    write_template(args.job, &args.output)?;

    println!(
        "Template written to {}",
        args.output.display().to_string().cyan()
    );
    Ok(())
}

fn write_template(job: JobKind, path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    wtr.write_record(job.columns())
        .context("Failed to write CSV header")?;
    wtr.flush().context("Failed to flush CSV writer")?;

    log::info!("Template for {:?} written to {}", job, path.display());
    Ok(())
}
