//! Name-based lookup of remote objects
//!
//! Every job references remote objects by a human readable name. The
//! resolver dispatches on the entity kind and reports a missing object as
//! `Lookup::NotFound` so callers can skip the record instead of failing.

use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

use crate::api::{AccessPackage, Catalog, DirectoryObject, GovernanceApi, Site};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    AccessPackage,
    Catalog,
    Group,
    Application,
    SharePoint,
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::AccessPackage => "access package",
            EntityKind::Catalog => "catalog",
            EntityKind::Group => "group",
            EntityKind::Application => "application",
            EntityKind::SharePoint => "SharePoint site",
            EntityKind::User => "user",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a lookup; absence is not an error
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

/// A resolved remote object
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    AccessPackage(AccessPackage),
    Catalog(Catalog),
    Group(DirectoryObject),
    Application(DirectoryObject),
    SharePoint {
        site: Site,
        /// The URL or name the site was searched by
        origin_id: String,
    },
    User(DirectoryObject),
}

impl Resource {
    pub fn kind(&self) -> EntityKind {
        match self {
            Resource::AccessPackage(_) => EntityKind::AccessPackage,
            Resource::Catalog(_) => EntityKind::Catalog,
            Resource::Group(_) => EntityKind::Group,
            Resource::Application(_) => EntityKind::Application,
            Resource::SharePoint { .. } => EntityKind::SharePoint,
            Resource::User(_) => EntityKind::User,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Resource::AccessPackage(p) => &p.id,
            Resource::Catalog(c) => &c.id,
            Resource::Group(o) | Resource::Application(o) | Resource::User(o) => &o.id,
            Resource::SharePoint { site, .. } => &site.id,
        }
    }

    /// Identifier the remote service knows the object by when it is added to
    /// a catalog. SharePoint sites are registered by URL.
    pub fn origin_id(&self) -> &str {
        match self {
            Resource::SharePoint { origin_id, .. } => origin_id,
            other => other.id(),
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            Resource::AccessPackage(p) => Some(&p.display_name),
            Resource::Catalog(c) => Some(&c.display_name),
            Resource::Group(o) | Resource::Application(o) => o.display_name.as_deref(),
            Resource::User(o) => o
                .display_name
                .as_deref()
                .or(o.user_principal_name.as_deref()),
            Resource::SharePoint { site, .. } => {
                site.display_name.as_deref().or(site.name.as_deref())
            }
        }
    }

    pub fn into_access_package(self) -> Option<AccessPackage> {
        match self {
            Resource::AccessPackage(p) => Some(p),
            _ => None,
        }
    }
}

/// Resource type column of the resource-assignment job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Group,
    Application,
    SharePoint,
}

impl ResourceType {
    pub fn kind(&self) -> EntityKind {
        match self {
            ResourceType::Group => EntityKind::Group,
            ResourceType::Application => EntityKind::Application,
            ResourceType::SharePoint => EntityKind::SharePoint,
        }
    }
}

impl FromStr for ResourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "group" => Ok(ResourceType::Group),
            "application" | "app" => Ok(ResourceType::Application),
            "sharepoint" | "sharepointonline" | "sharepoint online" => Ok(ResourceType::SharePoint),
            other => bail!(
                "Unknown resource type '{}' (expected Group, Application or SharePoint)",
                other
            ),
        }
    }
}

/// Approver type columns of the access-package job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproverType {
    User,
    Group,
}

impl ApproverType {
    pub fn kind(&self) -> EntityKind {
        match self {
            ApproverType::User => EntityKind::User,
            ApproverType::Group => EntityKind::Group,
        }
    }
}

impl FromStr for ApproverType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(ApproverType::User),
            "group" => Ok(ApproverType::Group),
            other => bail!("Invalid approver type '{}' (expected User or Group)", other),
        }
    }
}

pub struct Resolver<'a> {
    api: &'a dyn GovernanceApi,
}

impl<'a> Resolver<'a> {
    pub fn new(api: &'a dyn GovernanceApi) -> Self {
        Self { api }
    }

    /// Look up `name` as an object of `kind`.
    ///
    /// Catalogs are looked up by id; users by UPN; SharePoint sites by a
    /// search over the name or URL; everything else by exact display name.
    /// When several objects match, the first one wins.
    pub async fn resolve(&self, name: &str, kind: EntityKind) -> Result<Lookup<Resource>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Lookup::NotFound);
        }

        log::debug!("Resolving {} '{}'", kind, name);

        let found = match kind {
            EntityKind::AccessPackage => self
                .api
                .find_access_package(name)
                .await?
                .map(Resource::AccessPackage),
            EntityKind::Catalog => self.api.get_catalog(name).await?.map(Resource::Catalog),
            EntityKind::Group => self.api.find_group(name).await?.map(Resource::Group),
            EntityKind::Application => self
                .api
                .find_service_principal(name)
                .await?
                .map(Resource::Application),
            EntityKind::SharePoint => {
                self.api
                    .search_site(name)
                    .await?
                    .map(|site| Resource::SharePoint {
                        site,
                        origin_id: name.to_string(),
                    })
            }
            EntityKind::User => self.api.find_user(name).await?.map(Resource::User),
        };

        match &found {
            Some(resource) => {
                log::debug!("Resolved {} '{}' to {}", resource.kind(), name, resource.id())
            }
            None => log::debug!("No {} named '{}'", kind, name),
        }

        Ok(found.into())
    }

    /// Catalog by display name, used for existence checks before creation
    pub async fn catalog_by_name(&self, display_name: &str) -> Result<Lookup<Catalog>> {
        Ok(self.api.find_catalog(display_name.trim()).await?.into())
    }
}
