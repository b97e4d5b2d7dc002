//! The three provisioning jobs and the record loop they share.
//!
//! Records are processed one at a time. A failure inside a record is turned
//! into a failed outcome and the loop moves on.

pub mod access_packages;
pub mod catalogs;
pub mod resource_assignments;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::api::GovernanceApi;
use crate::config::PolicyConfig;
use crate::input::{FromRecord, Row};
use crate::policy::PolicyBuilder;
use crate::report::{BatchReport, Outcome};
use crate::resolver::Resolver;

pub use access_packages::AccessPackageJob;
pub use catalogs::CatalogJob;
pub use resource_assignments::ResourceAssignmentJob;

/// Everything a job needs while processing records
pub struct JobContext<'a> {
    pub api: &'a dyn GovernanceApi,
    pub resolver: Resolver<'a>,
    pub policies: PolicyBuilder<'a>,
    /// Look everything up but issue no create calls
    pub dry_run: bool,
    /// Run start time, anchors access review schedules
    pub started_at: DateTime<Utc>,
}

impl<'a> JobContext<'a> {
    pub fn new(api: &'a dyn GovernanceApi, policy: &'a PolicyConfig, dry_run: bool) -> Self {
        Self {
            api,
            resolver: Resolver::new(api),
            policies: PolicyBuilder::new(policy),
            dry_run,
            started_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    type Row: FromRecord + Send + Sync;

    /// Name used in logs and the summary
    const NAME: &'static str;

    async fn process(&self, ctx: &JobContext<'_>, row: &Self::Row) -> Result<Outcome>;
}

/// Run `job` over every row in order
pub async fn run_batch<J: Job>(
    job: &J,
    ctx: &JobContext<'_>,
    rows: Vec<Row<J::Row>>,
) -> BatchReport {
    let mut report = BatchReport::new(J::NAME);
    let total = rows.len();

    if ctx.dry_run {
        log::info!("Dry run: no changes will be made");
    }

    for (idx, row) in rows.into_iter().enumerate() {
        match row.parsed {
            Err(e) => {
                log::info!("[{}/{}] row {}", idx + 1, total, row.number);
                report.record(
                    row.number,
                    format!("row {}", row.number),
                    Outcome::Failed(format!("{:#}", e)),
                );
            }
            Ok(parsed) => {
                let label = parsed.label();
                log::info!("[{}/{}] {}", idx + 1, total, label);

                let outcome = match job.process(ctx, &parsed).await {
                    Ok(outcome) => outcome,
                    Err(e) => Outcome::Failed(format!("{:#}", e)),
                };
                report.record(row.number, label, outcome);
            }
        }
    }

    report
}

/// Joins step messages into one outcome: created beats planned beats skipped
#[derive(Debug, Default)]
pub(crate) struct Steps {
    messages: Vec<String>,
    created: bool,
    planned: bool,
}

impl Steps {
    pub fn created(&mut self, message: impl Into<String>) {
        self.created = true;
        self.messages.push(message.into());
    }

    pub fn planned(&mut self, message: impl Into<String>) {
        self.planned = true;
        self.messages.push(message.into());
    }

    pub fn skipped(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// A later step failed; keep what already happened in the message
    pub fn fail(mut self, error: anyhow::Error) -> Outcome {
        self.messages.push(format!("{:#}", error));
        Outcome::Failed(self.messages.join("; "))
    }

    pub fn finish(self) -> Outcome {
        let message = self.messages.join("; ");
        if self.created {
            Outcome::Created(message)
        } else if self.planned {
            Outcome::Planned(message)
        } else {
            Outcome::Skipped(message)
        }
    }
}
