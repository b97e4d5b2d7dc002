//! In-memory `GovernanceApi` for job tests

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

use crate::api::governance::NewAccessPackage;
use crate::api::models::CatalogRef;
use crate::api::{
    AccessPackage, AssignmentPolicy, Catalog, CatalogResource, DirectoryObject, GovernanceApi,
    ResourceRole, ResourceScope, Site,
};

/// Calls the fake rejects with an error
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    CreateCatalog(String),
    CreatePolicy,
}

#[derive(Default)]
struct State {
    next_id: usize,
    calls: Vec<String>,
    failures: Vec<Failure>,
    catalogs: Vec<Catalog>,
    packages: Vec<AccessPackage>,
    policies: Vec<(AssignmentPolicy, Value)>,
    users: Vec<DirectoryObject>,
    groups: Vec<DirectoryObject>,
    service_principals: Vec<DirectoryObject>,
    sites: Vec<(String, Site)>,
    catalog_resources: Vec<(String, CatalogResource)>,
    roles: Vec<(String, ResourceRole)>,
    resource_requests: Vec<Value>,
    role_scopes: Vec<(String, Value)>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn directory_object(&mut self, prefix: &str, name: &str) -> DirectoryObject {
        DirectoryObject {
            id: self.id(prefix),
            display_name: Some(name.to_string()),
            description: None,
            user_principal_name: None,
        }
    }

    fn add_role(&mut self, resource_id: &str, origin_system: &str, name: &str) {
        let role = ResourceRole {
            id: self.id("role"),
            display_name: name.to_string(),
            description: None,
            origin_id: format!("{}_{}", name, resource_id),
            origin_system: origin_system.to_string(),
        };
        self.roles.push((resource_id.to_string(), role));
    }

    /// Display name of the directory object or site an origin id refers to
    fn origin_display_name(&self, origin_id: &str) -> Option<String> {
        self.groups
            .iter()
            .chain(self.service_principals.iter())
            .find(|o| o.id == origin_id)
            .and_then(|o| o.display_name.clone())
            .or_else(|| {
                self.sites
                    .iter()
                    .find(|(url, _)| url == origin_id)
                    .and_then(|(_, site)| site.display_name.clone())
            })
    }
}

pub struct FakeGovernance {
    state: Mutex<State>,
}

impl FakeGovernance {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Record a call and return the state
    fn call(&self, name: &str) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(name.to_string());
        state
    }

    pub fn fail_on(&self, failure: Failure) {
        self.state().failures.push(failure);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == name).count()
    }

    pub fn add_catalog(&self, name: &str) -> Catalog {
        let mut state = self.state();
        let catalog = Catalog {
            id: state.id("cat"),
            display_name: name.to_string(),
            description: None,
        };
        state.catalogs.push(catalog.clone());
        catalog
    }

    pub fn catalog_id(&self, name: &str) -> String {
        self.state()
            .catalogs
            .iter()
            .find(|c| c.display_name == name)
            .map(|c| c.id.clone())
            .unwrap()
    }

    pub fn catalog_names(&self) -> Vec<String> {
        self.state()
            .catalogs
            .iter()
            .map(|c| c.display_name.clone())
            .collect()
    }

    pub fn add_access_package(&self, name: &str, catalog_id: &str) -> AccessPackage {
        let mut state = self.state();
        let package = AccessPackage {
            id: state.id("ap"),
            display_name: name.to_string(),
            description: None,
            is_hidden: false,
            catalog: Some(CatalogRef {
                id: catalog_id.to_string(),
                display_name: None,
            }),
        };
        state.packages.push(package.clone());
        package
    }

    pub fn access_package_names(&self) -> Vec<String> {
        self.state()
            .packages
            .iter()
            .map(|p| p.display_name.clone())
            .collect()
    }

    /// Bodies of created assignment policies, in creation order
    pub fn policies(&self) -> Vec<Value> {
        self.state()
            .policies
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn add_user(&self, user_principal_name: &str) -> DirectoryObject {
        let mut state = self.state();
        let mut user = state.directory_object("user", user_principal_name);
        user.user_principal_name = Some(user_principal_name.to_string());
        state.users.push(user.clone());
        user
    }

    pub fn add_group(&self, name: &str) -> DirectoryObject {
        let mut state = self.state();
        let group = state.directory_object("group", name);
        state.groups.push(group.clone());
        group
    }

    pub fn add_group_with_description(&self, name: &str, description: &str) -> DirectoryObject {
        let mut state = self.state();
        let mut group = state.directory_object("group", name);
        group.description = Some(description.to_string());
        state.groups.push(group.clone());
        group
    }

    pub fn add_service_principal(&self, name: &str) -> DirectoryObject {
        let mut state = self.state();
        let sp = state.directory_object("sp", name);
        state.service_principals.push(sp.clone());
        sp
    }

    pub fn add_site(&self, url: &str, name: &str) -> Site {
        let mut state = self.state();
        let site = Site {
            id: state.id("site"),
            display_name: Some(name.to_string()),
            name: Some(name.to_lowercase()),
            description: None,
            web_url: Some(url.to_string()),
        };
        state.sites.push((url.to_string(), site.clone()));
        site
    }

    /// Register a resource in a catalog with a single root scope
    pub fn register_catalog_resource(
        &self,
        catalog_id: &str,
        origin_id: &str,
        origin_system: &str,
        display_name: &str,
    ) -> CatalogResource {
        let mut state = self.state();
        let resource = CatalogResource {
            id: state.id("res"),
            display_name: Some(display_name.to_string()),
            description: None,
            origin_id: origin_id.to_string(),
            origin_system: origin_system.to_string(),
            scopes: vec![ResourceScope {
                id: state.id("scope"),
                display_name: Some("Root".to_string()),
                description: None,
                origin_id: origin_id.to_string(),
                origin_system: origin_system.to_string(),
                is_root_scope: true,
            }],
        };
        state
            .catalog_resources
            .push((catalog_id.to_string(), resource.clone()));
        resource
    }

    pub fn describe_catalog_resource(&self, resource_id: &str, description: &str) {
        let mut state = self.state();
        if let Some((_, resource)) = state
            .catalog_resources
            .iter_mut()
            .find(|(_, r)| r.id == resource_id)
        {
            resource.description = Some(description.to_string());
        }
    }

    pub fn add_resource_role(&self, resource_id: &str, name: &str) {
        let mut state = self.state();
        let origin_system = state
            .catalog_resources
            .iter()
            .find(|(_, r)| r.id == resource_id)
            .map(|(_, r)| r.origin_system.clone())
            .unwrap_or_default();
        state.add_role(resource_id, &origin_system, name);
    }

    pub fn resource_requests(&self) -> Vec<Value> {
        self.state().resource_requests.clone()
    }

    /// `(access package id, body)` of every role scope added
    pub fn role_scopes(&self) -> Vec<(String, Value)> {
        self.state().role_scopes.clone()
    }
}

fn text<'a>(body: &'a Value, pointer: &str) -> Result<&'a str> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Request body is missing {}", pointer))
}

#[async_trait]
impl GovernanceApi for FakeGovernance {
    async fn find_catalog(&self, display_name: &str) -> Result<Option<Catalog>> {
        let state = self.call("find_catalog");
        Ok(state
            .catalogs
            .iter()
            .find(|c| c.display_name == display_name)
            .cloned())
    }

    async fn get_catalog(&self, id: &str) -> Result<Option<Catalog>> {
        let state = self.call("get_catalog");
        Ok(state.catalogs.iter().find(|c| c.id == id).cloned())
    }

    async fn create_catalog(&self, display_name: &str, description: &str) -> Result<Catalog> {
        let mut state = self.call("create_catalog");
        if state
            .failures
            .contains(&Failure::CreateCatalog(display_name.to_string()))
        {
            bail!("Graph API error 400 (InvalidRequest): rejected");
        }

        let catalog = Catalog {
            id: state.id("cat"),
            display_name: display_name.to_string(),
            description: Some(description.to_string()),
        };
        state.catalogs.push(catalog.clone());
        Ok(catalog)
    }

    async fn find_access_package(&self, display_name: &str) -> Result<Option<AccessPackage>> {
        let state = self.call("find_access_package");
        Ok(state
            .packages
            .iter()
            .find(|p| p.display_name == display_name)
            .cloned())
    }

    async fn create_access_package(&self, package: &NewAccessPackage) -> Result<AccessPackage> {
        let mut state = self.call("create_access_package");
        let created = AccessPackage {
            id: state.id("ap"),
            display_name: package.display_name.clone(),
            description: Some(package.description.clone()),
            is_hidden: package.is_hidden,
            catalog: Some(CatalogRef {
                id: package.catalog_id.clone(),
                display_name: None,
            }),
        };
        state.packages.push(created.clone());
        Ok(created)
    }

    async fn find_assignment_policy(
        &self,
        display_name: &str,
    ) -> Result<Option<AssignmentPolicy>> {
        let state = self.call("find_assignment_policy");
        Ok(state
            .policies
            .iter()
            .find(|(p, _)| p.display_name == display_name)
            .map(|(p, _)| p.clone()))
    }

    async fn create_assignment_policy(&self, body: &Value) -> Result<AssignmentPolicy> {
        let mut state = self.call("create_assignment_policy");
        if state.failures.contains(&Failure::CreatePolicy) {
            bail!("Graph API error 400 (InvalidRequest): policy rejected");
        }

        let policy = AssignmentPolicy {
            id: state.id("policy"),
            display_name: text(body, "/displayName")?.to_string(),
        };
        state.policies.push((policy.clone(), body.clone()));
        Ok(policy)
    }

    async fn find_user(&self, user_principal_name: &str) -> Result<Option<DirectoryObject>> {
        let state = self.call("find_user");
        Ok(state
            .users
            .iter()
            .find(|u| u.user_principal_name.as_deref() == Some(user_principal_name))
            .cloned())
    }

    async fn find_group(&self, display_name: &str) -> Result<Option<DirectoryObject>> {
        let state = self.call("find_group");
        Ok(state
            .groups
            .iter()
            .find(|g| g.display_name.as_deref() == Some(display_name))
            .cloned())
    }

    async fn find_service_principal(
        &self,
        display_name: &str,
    ) -> Result<Option<DirectoryObject>> {
        let state = self.call("find_service_principal");
        Ok(state
            .service_principals
            .iter()
            .find(|sp| sp.display_name.as_deref() == Some(display_name))
            .cloned())
    }

    async fn search_site(&self, query: &str) -> Result<Option<Site>> {
        let state = self.call("search_site");
        Ok(state
            .sites
            .iter()
            .find(|(url, site)| url == query || site.display_name.as_deref() == Some(query))
            .map(|(_, site)| site.clone()))
    }

    async fn list_catalog_resources(&self, catalog_id: &str) -> Result<Vec<CatalogResource>> {
        let state = self.call("list_catalog_resources");
        Ok(state
            .catalog_resources
            .iter()
            .filter(|(catalog, _)| catalog == catalog_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn request_resource(&self, body: &Value) -> Result<()> {
        let mut state = self.call("request_resource");
        let catalog_id = text(body, "/catalog/id")?.to_string();
        let origin_id = text(body, "/resource/originId")?.to_string();
        let origin_system = text(body, "/resource/originSystem")?.to_string();
        let display_name = state.origin_display_name(&origin_id);

        let resource = CatalogResource {
            id: state.id("res"),
            display_name,
            description: None,
            origin_id: origin_id.clone(),
            origin_system: origin_system.clone(),
            scopes: vec![ResourceScope {
                id: state.id("scope"),
                display_name: Some("Root".to_string()),
                description: None,
                origin_id,
                origin_system: origin_system.clone(),
                is_root_scope: true,
            }],
        };

        // Directory resources come with their built-in roles
        match origin_system.as_str() {
            "AadGroup" => {
                state.add_role(&resource.id, &origin_system, "Owner");
                state.add_role(&resource.id, &origin_system, "Member");
            }
            "AadApplication" => state.add_role(&resource.id, &origin_system, "Default Access"),
            _ => {}
        }

        state.catalog_resources.push((catalog_id, resource));
        state.resource_requests.push(body.clone());
        Ok(())
    }

    async fn list_resource_roles(
        &self,
        _catalog_id: &str,
        origin_system: &str,
        resource_id: &str,
    ) -> Result<Vec<ResourceRole>> {
        let state = self.call("list_resource_roles");
        Ok(state
            .roles
            .iter()
            .filter(|(resource, role)| resource == resource_id && role.origin_system == origin_system)
            .map(|(_, role)| role.clone())
            .collect())
    }

    async fn add_resource_role_scope(&self, access_package_id: &str, body: &Value) -> Result<()> {
        let mut state = self.call("add_resource_role_scope");
        state
            .role_scopes
            .push((access_package_id.to_string(), body.clone()));
        Ok(())
    }
}
