//! Catalog resource registration and resource role scope payloads

use anyhow::{Result, bail};
use serde_json::{Value, json};

use crate::api::{CatalogResource, ResourceRole, ResourceScope};
use crate::resolver::ResourceType;

impl ResourceType {
    /// Origin system a resource of this type is registered under
    pub fn origin_system(&self) -> &'static str {
        match self {
            ResourceType::Group => "AadGroup",
            ResourceType::Application => "AadApplication",
            ResourceType::SharePoint => "SharePointOnline",
        }
    }
}

/// SharePoint permission levels map to the site's built-in group codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharePointRole {
    Owners,
    Members,
    Visitors,
}

impl SharePointRole {
    /// Unrecognized levels fall back to Visitors
    pub fn from_permission_level(level: &str) -> Self {
        match level.trim().to_lowercase().as_str() {
            "owners" => SharePointRole::Owners,
            "members" => SharePointRole::Members,
            _ => SharePointRole::Visitors,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            SharePointRole::Owners => 3,
            SharePointRole::Members => 5,
            SharePointRole::Visitors => 4,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SharePointRole::Owners => "Owners",
            SharePointRole::Members => "Members",
            SharePointRole::Visitors => "Visitors",
        }
    }
}

/// Body of an `adminAdd` resource request adding a resource to a catalog
pub fn resource_request(catalog_id: &str, resource_type: ResourceType, origin_id: &str) -> Value {
    json!({
        "requestType": "adminAdd",
        "resource": {
            "originId": origin_id,
            "originSystem": resource_type.origin_system(),
        },
        "catalog": { "id": catalog_id },
    })
}

/// Catalog entry for a resource: matched by origin id, else by display name.
///
/// Descriptions are not unique across resources and are never used to match.
pub fn find_registered<'a>(
    registered: &'a [CatalogResource],
    origin_id: &str,
    display_name: Option<&str>,
) -> Option<&'a CatalogResource> {
    registered
        .iter()
        .find(|r| r.origin_id.eq_ignore_ascii_case(origin_id))
        .or_else(|| {
            let name = display_name.filter(|n| !n.trim().is_empty())?;
            registered.iter().find(|r| {
                r.display_name
                    .as_deref()
                    .is_some_and(|registered| registered.eq_ignore_ascii_case(name))
            })
        })
}

/// Pick the role whose display name equals the requested permission level
pub fn find_role<'a>(roles: &'a [ResourceRole], permission_level: &str) -> Result<&'a ResourceRole> {
    match roles
        .iter()
        .find(|role| role.display_name.eq_ignore_ascii_case(permission_level.trim()))
    {
        Some(role) => Ok(role),
        None => {
            let available: Vec<&str> = roles.iter().map(|r| r.display_name.as_str()).collect();
            bail!(
                "Role '{}' not found on resource (available: {})",
                permission_level,
                if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                }
            )
        }
    }
}

fn resource_ref(resource: &CatalogResource) -> Value {
    json!({
        "id": resource.id,
        "originId": resource.origin_id,
        "originSystem": resource.origin_system,
    })
}

/// Role scope for a group or application role looked up in the catalog
pub fn role_scope(resource: &CatalogResource, role: &ResourceRole) -> Result<Value> {
    let scope: &ResourceScope = match resource.scopes.first() {
        Some(scope) => scope,
        None => bail!(
            "Resource '{}' has no scopes in the catalog",
            resource.display_name.as_deref().unwrap_or(&resource.origin_id)
        ),
    };

    Ok(json!({
        "role": {
            "id": role.id,
            "displayName": role.display_name,
            "description": role.description,
            "originId": role.origin_id,
            "originSystem": role.origin_system,
            "resource": resource_ref(resource),
        },
        "scope": {
            "id": scope.id,
            "originId": scope.origin_id,
            "originSystem": scope.origin_system,
        },
    }))
}

/// Role scope for a SharePoint site: fixed role code, synthesized root scope
pub fn sharepoint_role_scope(resource: &CatalogResource, role: SharePointRole) -> Value {
    json!({
        "role": {
            "displayName": role.display_name(),
            "originId": role.code().to_string(),
            "originSystem": ResourceType::SharePoint.origin_system(),
            "resource": resource_ref(resource),
        },
        "scope": {
            "displayName": "Root",
            "description": "Root Scope",
            "originId": resource.origin_id,
            "originSystem": ResourceType::SharePoint.origin_system(),
            "isRootScope": true,
        },
    })
}
