//! Create access packages and their assignment policies

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use super::{Job, JobContext, Steps};
use crate::api::governance::NewAccessPackage;
use crate::input::{FromRecord, Record};
use crate::policy::{ApprovalPolicy, Approver, AutoAssignmentPolicy, Expiration};
use crate::report::Outcome;
use crate::resolver::{ApproverType, EntityKind, Lookup};

/// An approver reference as written in the sheet
#[derive(Debug, Clone, PartialEq)]
pub struct ApproverRef {
    pub approver_type: ApproverType,
    pub name: String,
}

/// Approval columns, present only when `ApprovalEnabled` is set
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalColumns {
    /// None when no approver is named; the approval policy is then skipped
    pub approver: Option<ApproverRef>,
    pub escalation: Option<ApproverRef>,
    pub duration_in_days: Option<u32>,
    pub access_reviews: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessPackageRow {
    pub catalog_name: String,
    pub access_package_name: String,
    pub description: String,
    pub target_group_name: String,
    pub is_hidden: bool,
    pub approval: Option<ApprovalColumns>,
    /// Dynamic membership rule, present only when `AutoAssignmentEnabled` is set
    pub auto_assignment_rule: Option<String>,
}

impl FromRecord for AccessPackageRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "CatalogName",
        "AccessPackageName",
        "Description",
        "TargetGroupName",
        "IsHidden",
        "ApprovalEnabled",
        "ApproverType",
        "Approver",
        "EscalationApproverType",
        "EscalationApprover",
        "DurationInDays",
        "AccessReviews",
        "AutoAssignmentEnabled",
        "DynamicMembershipRule",
    ];

    fn from_record(record: &Record) -> Result<Self> {
        let approval = if record.flag("ApprovalEnabled")? {
            // Approver types only matter when someone is named
            let approver = match record.optional_text("Approver") {
                Some(name) => Some(ApproverRef {
                    approver_type: record.text("ApproverType").parse()?,
                    name,
                }),
                None => None,
            };

            let escalation = match record.optional_text("EscalationApprover") {
                Some(name) => Some(ApproverRef {
                    approver_type: record
                        .text("EscalationApproverType")
                        .parse()
                        .context("EscalationApproverType")?,
                    name,
                }),
                None => None,
            };

            Some(ApprovalColumns {
                approver,
                escalation,
                duration_in_days: record.optional_count("DurationInDays")?,
                access_reviews: record.flag("AccessReviews")?,
            })
        } else {
            None
        };

        let auto_assignment_rule = if record.flag("AutoAssignmentEnabled")? {
            match record.optional_text("DynamicMembershipRule") {
                Some(rule) => Some(rule),
                None => bail!("AutoAssignmentEnabled is set but DynamicMembershipRule is empty"),
            }
        } else {
            None
        };

        Ok(Self {
            catalog_name: record.required_text("CatalogName")?,
            access_package_name: record.required_text("AccessPackageName")?,
            description: record.text("Description"),
            target_group_name: record.required_text("TargetGroupName")?,
            is_hidden: record.flag("IsHidden")?,
            approval,
            auto_assignment_rule,
        })
    }

    fn label(&self) -> String {
        self.access_package_name.clone()
    }
}

pub struct AccessPackageJob;

#[async_trait]
impl Job for AccessPackageJob {
    type Row = AccessPackageRow;

    const NAME: &'static str = "access-packages";

    async fn process(&self, ctx: &JobContext<'_>, row: &AccessPackageRow) -> Result<Outcome> {
        let mut steps = Steps::default();
        match provision(ctx, row, &mut steps).await {
            Ok(()) => Ok(steps.finish()),
            Err(e) => Ok(steps.fail(e)),
        }
    }
}

async fn provision(ctx: &JobContext<'_>, row: &AccessPackageRow, steps: &mut Steps) -> Result<()> {
    if !ctx
        .resolver
        .resolve(&row.target_group_name, EntityKind::Group)
        .await?
        .is_found()
    {
        log::warn!("Target group '{}' not found", row.target_group_name);
        steps.skipped(format!("target group '{}' not found", row.target_group_name));
        return Ok(());
    }

    let catalog = match ctx.resolver.catalog_by_name(&row.catalog_name).await? {
        Lookup::Found(catalog) => catalog,
        Lookup::NotFound => {
            log::warn!("Catalog '{}' not found", row.catalog_name);
            steps.skipped(format!("catalog '{}' not found", row.catalog_name));
            return Ok(());
        }
    };

    // None only in a dry run where the package does not exist yet
    let package_id = match ctx
        .resolver
        .resolve(&row.access_package_name, EntityKind::AccessPackage)
        .await?
    {
        Lookup::Found(existing) => {
            steps.skipped("access package already exists");
            Some(existing.id().to_string())
        }
        Lookup::NotFound if ctx.dry_run => {
            steps.planned("would create access package");
            None
        }
        Lookup::NotFound => {
            let package = ctx
                .api
                .create_access_package(&NewAccessPackage {
                    display_name: row.access_package_name.clone(),
                    description: row.description.clone(),
                    is_hidden: row.is_hidden,
                    catalog_id: catalog.id.clone(),
                })
                .await
                .context("Failed to create access package")?;
            steps.created(format!("access package created ({})", package.id));
            Some(package.id)
        }
    };

    if let Some(approval) = &row.approval {
        approval_policy(ctx, row, approval, package_id.as_deref(), steps).await?;
    }

    if let Some(rule) = &row.auto_assignment_rule {
        let name = ctx
            .policies
            .auto_assignment_policy_name(&row.access_package_name);
        ensure_policy(ctx, steps, "auto-assignment policy", &name, package_id.as_deref(), |id| {
            ctx.policies.auto_assignment(&AutoAssignmentPolicy {
                access_package_id: id.to_string(),
                access_package_name: row.access_package_name.clone(),
                membership_rule: rule.clone(),
            })
        })
        .await?;
    }

    Ok(())
}

async fn resolve_approver(ctx: &JobContext<'_>, approver: &ApproverRef) -> Result<Option<Approver>> {
    let lookup = ctx
        .resolver
        .resolve(&approver.name, approver.approver_type.kind())
        .await?;
    Ok(lookup
        .into_option()
        .as_ref()
        .and_then(Approver::from_resource))
}

async fn approval_policy(
    ctx: &JobContext<'_>,
    row: &AccessPackageRow,
    approval: &ApprovalColumns,
    package_id: Option<&str>,
    steps: &mut Steps,
) -> Result<()> {
    let Some(approver_ref) = &approval.approver else {
        log::warn!("No approver given, approval policy skipped");
        steps.skipped("no approver given, approval policy skipped");
        return Ok(());
    };

    let Some(approver) = resolve_approver(ctx, approver_ref).await? else {
        log::warn!(
            "Approver {} '{}' not found",
            approver_ref.approver_type.kind(),
            approver_ref.name
        );
        steps.skipped(format!(
            "approver '{}' not found, approval policy skipped",
            approver_ref.name
        ));
        return Ok(());
    };

    let escalation_approver = match &approval.escalation {
        Some(escalation) => {
            let resolved = resolve_approver(ctx, escalation).await?;
            if resolved.is_none() {
                log::warn!(
                    "Escalation approver '{}' not found, escalation disabled",
                    escalation.name
                );
            }
            resolved
        }
        None => None,
    };

    let name = ctx.policies.approval_policy_name(&row.access_package_name);
    ensure_policy(ctx, steps, "approval policy", &name, package_id, |id| {
        ctx.policies.approval(
            &ApprovalPolicy {
                access_package_id: id.to_string(),
                access_package_name: row.access_package_name.clone(),
                approver: approver.clone(),
                escalation_approver: escalation_approver.clone(),
                expiration: Expiration::from_days(approval.duration_in_days),
                access_reviews: approval.access_reviews,
            },
            ctx.started_at,
        )
    })
    .await
}

/// Create a policy unless one with the same name exists anywhere in the tenant
async fn ensure_policy(
    ctx: &JobContext<'_>,
    steps: &mut Steps,
    label: &str,
    name: &str,
    package_id: Option<&str>,
    build: impl FnOnce(&str) -> Value + Send,
) -> Result<()> {
    if ctx.api.find_assignment_policy(name).await?.is_some() {
        steps.skipped(format!("{} '{}' already exists", label, name));
        return Ok(());
    }

    match package_id {
        Some(id) if !ctx.dry_run => {
            let body = build(id);
            let policy = ctx
                .api
                .create_assignment_policy(&body)
                .await
                .with_context(|| format!("Failed to create {} '{}'", label, name))?;
            steps.created(format!("{} created ({})", label, policy.id));
        }
        _ => steps.planned(format!("would create {} '{}'", label, name)),
    }

    Ok(())
}
