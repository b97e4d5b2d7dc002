//! Job command handler

use anyhow::{Context, Result};
use std::sync::Arc;

use super::JobArgs;
use crate::api::{GraphClient, GraphGovernance, Session};
use crate::config::Settings;
use crate::input;
use crate::jobs::{Job, JobContext, run_batch};

/// Load the input, open a Graph session and run `job` over every record.
///
/// Only load and session failures are returned as errors; per-record
/// problems end up in the summary.
pub async fn handle_job_command<J: Job>(
    job: &J,
    args: &JobArgs,
    settings: &Settings,
) -> Result<()> {
    log::info!("Starting {} from {}", J::NAME, args.file.display());

    let rows = input::load::<J::Row>(&args.file)?;

    let session = Arc::new(
        Session::connect(&settings.graph)
            .await
            .context("Could not open a Microsoft Graph session")?,
    );
    let api = GraphGovernance::new(GraphClient::new(session.clone(), &settings.graph));
    let ctx = JobContext::new(&api, &settings.policy, args.dry_run);

    let report = run_batch(job, &ctx, rows).await;

    if let Err(e) = session.disconnect().await {
        log::warn!("Failed to close the Graph session: {:#}", e);
    }

    report.log_summary();
    report.print_status();
    Ok(())
}
