//! Microsoft Graph entitlement management API
//!
//! A thin client over the `identityGovernance/entitlementManagement` and
//! directory endpoints used by the provisioning jobs.

pub mod auth;
pub mod client;
pub mod filters;
pub mod governance;
pub mod models;

pub use auth::Session;
pub use client::GraphClient;
pub use governance::{GovernanceApi, GraphGovernance};
pub use models::{
    AccessPackage, AssignmentPolicy, Catalog, CatalogResource, DirectoryObject, ResourceRole,
    ResourceScope, Site,
};
