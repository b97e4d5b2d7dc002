//! Register resources in a catalog and grant them to access packages

use anyhow::{Context, Result, bail};
use async_trait::async_trait;

use super::{Job, JobContext, Steps};
use crate::api::CatalogResource;
use crate::input::{FromRecord, Record};
use crate::report::Outcome;
use crate::resolver::{EntityKind, Lookup, Resource, ResourceType};
use crate::roles::{self, SharePointRole};

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAssignmentRow {
    pub access_package_name: String,
    pub resource_name: String,
    pub resource_type: ResourceType,
    pub permission_level: String,
}

impl FromRecord for ResourceAssignmentRow {
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "AccessPackageName",
        "ResourceName",
        "ResourceType",
        "PermissionLevel",
    ];

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            access_package_name: record.required_text("AccessPackageName")?,
            resource_name: record.required_text("ResourceName")?,
            resource_type: record.required_text("ResourceType")?.parse()?,
            permission_level: record.text("PermissionLevel"),
        })
    }

    fn label(&self) -> String {
        format!("{} -> {}", self.resource_name, self.access_package_name)
    }
}

pub struct ResourceAssignmentJob;

#[async_trait]
impl Job for ResourceAssignmentJob {
    type Row = ResourceAssignmentRow;

    const NAME: &'static str = "resource-assignments";

    async fn process(&self, ctx: &JobContext<'_>, row: &ResourceAssignmentRow) -> Result<Outcome> {
        let mut steps = Steps::default();
        match assign(ctx, row, &mut steps).await {
            Ok(()) => Ok(steps.finish()),
            Err(e) => Ok(steps.fail(e)),
        }
    }
}

async fn assign(ctx: &JobContext<'_>, row: &ResourceAssignmentRow, steps: &mut Steps) -> Result<()> {
    let package = match ctx
        .resolver
        .resolve(&row.access_package_name, EntityKind::AccessPackage)
        .await?
        .into_option()
        .and_then(Resource::into_access_package)
    {
        Some(package) => package,
        None => {
            log::warn!("Access package '{}' not found", row.access_package_name);
            steps.skipped(format!(
                "access package '{}' not found",
                row.access_package_name
            ));
            return Ok(());
        }
    };

    let catalog_id = match &package.catalog {
        Some(catalog) => catalog.id.clone(),
        None => bail!(
            "Access package '{}' has no catalog",
            package.display_name
        ),
    };

    let kind = row.resource_type.kind();
    let resource = match ctx.resolver.resolve(&row.resource_name, kind).await? {
        Lookup::Found(resource) => resource,
        Lookup::NotFound => {
            log::warn!("{} '{}' not found", kind, row.resource_name);
            steps.skipped(format!("{} '{}' not found", kind, row.resource_name));
            return Ok(());
        }
    };

    let registered = ctx
        .api
        .list_catalog_resources(&catalog_id)
        .await
        .context("Failed to list catalog resources")?;

    let already_in_catalog =
        roles::find_registered(&registered, resource.origin_id(), resource.display_name())
            .is_some();

    if already_in_catalog {
        steps.skipped("resource already in catalog");
    } else if ctx.dry_run {
        steps.planned("would add resource to catalog");
        steps.planned(format!("would assign '{}'", row.permission_level));
        return Ok(());
    } else {
        let request = roles::resource_request(&catalog_id, row.resource_type, resource.origin_id());
        ctx.api
            .request_resource(&request)
            .await
            .context("Failed to add resource to catalog")?;
        steps.created("resource added to catalog");
    }

    let registered = ctx
        .api
        .list_catalog_resources(&catalog_id)
        .await
        .context("Failed to list catalog resources")?;
    let catalog_resource = locate(&registered, &resource)?;

    let role_scope = match row.resource_type {
        ResourceType::Group | ResourceType::Application => {
            let available = ctx
                .api
                .list_resource_roles(
                    &catalog_id,
                    row.resource_type.origin_system(),
                    &catalog_resource.id,
                )
                .await
                .context("Failed to list resource roles")?;
            let role = roles::find_role(&available, &row.permission_level)?;
            roles::role_scope(catalog_resource, role)?
        }
        ResourceType::SharePoint => roles::sharepoint_role_scope(
            catalog_resource,
            SharePointRole::from_permission_level(&row.permission_level),
        ),
    };

    if ctx.dry_run {
        steps.planned(format!("would assign '{}'", row.permission_level));
        return Ok(());
    }

    ctx.api
        .add_resource_role_scope(&package.id, &role_scope)
        .await
        .context("Failed to assign resource role")?;
    steps.created(format!("'{}' assigned", row.permission_level));

    Ok(())
}

/// Find the catalog entry for a resolved resource
fn locate<'a>(registered: &'a [CatalogResource], resource: &Resource) -> Result<&'a CatalogResource> {
    roles::find_registered(registered, resource.origin_id(), resource.display_name())
        .with_context(|| {
            format!(
                "Resource '{}' is not registered in the catalog",
                resource.display_name().unwrap_or(resource.origin_id())
            )
        })
}
