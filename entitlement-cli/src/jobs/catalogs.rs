//! Create catalogs that do not exist yet

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{Job, JobContext};
use crate::input::{FromRecord, Record};
use crate::report::Outcome;
use crate::resolver::Lookup;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub display_name: String,
    pub description: String,
}

impl FromRecord for CatalogRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &["DisplayName", "Description"];

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            display_name: record.required_text("DisplayName")?,
            description: record.text("Description"),
        })
    }

    fn label(&self) -> String {
        self.display_name.clone()
    }
}

pub struct CatalogJob;

#[async_trait]
impl Job for CatalogJob {
    type Row = CatalogRow;

    const NAME: &'static str = "catalogs";

    async fn process(&self, ctx: &JobContext<'_>, row: &CatalogRow) -> Result<Outcome> {
        if let Lookup::Found(existing) = ctx.resolver.catalog_by_name(&row.display_name).await? {
            return Ok(Outcome::Skipped(format!(
                "catalog already exists ({})",
                existing.id
            )));
        }

        if ctx.dry_run {
            return Ok(Outcome::Planned("would create catalog".to_string()));
        }

        let catalog = ctx
            .api
            .create_catalog(&row.display_name, &row.description)
            .await
            .context("Failed to create catalog")?;

        Ok(Outcome::Created(format!("catalog created ({})", catalog.id)))
    }
}
