//! Entitlement management operations used by the provisioning jobs.
//!
//! `GovernanceApi` is the seam between the jobs and the remote service; the
//! Graph implementation lives here and tests substitute an in-memory one.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};

use super::client::GraphClient;
use super::filters::{self, eq, with_filter};
use super::models::{
    AccessPackage, AssignmentPolicy, Catalog, CatalogResource, DirectoryObject, ResourceRole, Site,
};

const EM_ROOT: &str = "identityGovernance/entitlementManagement";

/// Fields of an access package to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessPackage {
    pub display_name: String,
    pub description: String,
    pub is_hidden: bool,
    pub catalog_id: String,
}

impl NewAccessPackage {
    pub fn to_body(&self) -> Value {
        json!({
            "displayName": self.display_name,
            "description": self.description,
            "isHidden": self.is_hidden,
            "catalog": { "id": self.catalog_id },
        })
    }
}

#[async_trait]
pub trait GovernanceApi: Send + Sync {
    async fn find_catalog(&self, display_name: &str) -> Result<Option<Catalog>>;
    async fn get_catalog(&self, id: &str) -> Result<Option<Catalog>>;
    async fn create_catalog(&self, display_name: &str, description: &str) -> Result<Catalog>;

    /// Access package by display name, with its catalog expanded
    async fn find_access_package(&self, display_name: &str) -> Result<Option<AccessPackage>>;
    async fn create_access_package(&self, package: &NewAccessPackage) -> Result<AccessPackage>;

    /// Policy by display name anywhere in the tenant
    async fn find_assignment_policy(&self, display_name: &str)
    -> Result<Option<AssignmentPolicy>>;
    async fn create_assignment_policy(&self, body: &Value) -> Result<AssignmentPolicy>;

    async fn find_user(&self, user_principal_name: &str) -> Result<Option<DirectoryObject>>;
    async fn find_group(&self, display_name: &str) -> Result<Option<DirectoryObject>>;
    async fn find_service_principal(&self, display_name: &str)
    -> Result<Option<DirectoryObject>>;
    async fn search_site(&self, query: &str) -> Result<Option<Site>>;

    /// Resources registered in a catalog, scopes expanded
    async fn list_catalog_resources(&self, catalog_id: &str) -> Result<Vec<CatalogResource>>;
    async fn request_resource(&self, body: &Value) -> Result<()>;
    async fn list_resource_roles(
        &self,
        catalog_id: &str,
        origin_system: &str,
        resource_id: &str,
    ) -> Result<Vec<ResourceRole>>;
    async fn add_resource_role_scope(&self, access_package_id: &str, body: &Value) -> Result<()>;
}

/// `GovernanceApi` backed by Microsoft Graph
#[derive(Debug, Clone)]
pub struct GraphGovernance {
    client: GraphClient,
}

impl GraphGovernance {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

fn em(path: &str) -> String {
    format!("{}/{}", EM_ROOT, path)
}

#[async_trait]
impl GovernanceApi for GraphGovernance {
    async fn find_catalog(&self, display_name: &str) -> Result<Option<Catalog>> {
        let path = with_filter(&em("catalogs"), &eq("displayName", display_name));
        self.client.get_first(&path).await
    }

    async fn get_catalog(&self, id: &str) -> Result<Option<Catalog>> {
        self.client
            .get_optional(&em(&format!("catalogs/{}", id)))
            .await
    }

    async fn create_catalog(&self, display_name: &str, description: &str) -> Result<Catalog> {
        let body = json!({
            "displayName": display_name,
            "description": description,
        });
        self.client.post(&em("catalogs"), &body).await
    }

    async fn find_access_package(&self, display_name: &str) -> Result<Option<AccessPackage>> {
        let path = format!(
            "{}&$expand=catalog",
            with_filter(&em("accessPackages"), &eq("displayName", display_name))
        );
        self.client.get_first(&path).await
    }

    async fn create_access_package(&self, package: &NewAccessPackage) -> Result<AccessPackage> {
        self.client
            .post(&em("accessPackages"), &package.to_body())
            .await
    }

    async fn find_assignment_policy(
        &self,
        display_name: &str,
    ) -> Result<Option<AssignmentPolicy>> {
        let path = with_filter(&em("assignmentPolicies"), &eq("displayName", display_name));
        self.client.get_first(&path).await
    }

    async fn create_assignment_policy(&self, body: &Value) -> Result<AssignmentPolicy> {
        self.client.post(&em("assignmentPolicies"), body).await
    }

    async fn find_user(&self, user_principal_name: &str) -> Result<Option<DirectoryObject>> {
        let path = with_filter("users", &eq("userPrincipalName", user_principal_name));
        self.client.get_first(&path).await
    }

    async fn find_group(&self, display_name: &str) -> Result<Option<DirectoryObject>> {
        let path = with_filter("groups", &eq("displayName", display_name));
        self.client.get_first(&path).await
    }

    async fn find_service_principal(
        &self,
        display_name: &str,
    ) -> Result<Option<DirectoryObject>> {
        let path = with_filter("servicePrincipals", &eq("displayName", display_name));
        self.client.get_first(&path).await
    }

    async fn search_site(&self, query: &str) -> Result<Option<Site>> {
        let path = format!("sites?search={}", urlencoding::encode(query));
        self.client.get_first(&path).await
    }

    async fn list_catalog_resources(&self, catalog_id: &str) -> Result<Vec<CatalogResource>> {
        let path = em(&format!("catalogs/{}/resources?$expand=scopes", catalog_id));
        self.client.get_all(&path).await
    }

    async fn request_resource(&self, body: &Value) -> Result<()> {
        self.client.post_discard(&em("resourceRequests"), body).await
    }

    async fn list_resource_roles(
        &self,
        catalog_id: &str,
        origin_system: &str,
        resource_id: &str,
    ) -> Result<Vec<ResourceRole>> {
        let filter = filters::and(&[
            eq("originSystem", origin_system),
            eq("resource/id", resource_id),
        ]);
        let path = format!(
            "{}&$expand=resource",
            with_filter(&em(&format!("catalogs/{}/resourceRoles", catalog_id)), &filter)
        );
        self.client.get_all(&path).await
    }

    async fn add_resource_role_scope(&self, access_package_id: &str, body: &Value) -> Result<()> {
        let path = em(&format!("accessPackages/{}/resourceRoleScopes", access_package_id));
        self.client.post_discard(&path, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_access_package_body() {
        let package = NewAccessPackage {
            display_name: "Sales".to_string(),
            description: "Sales tooling".to_string(),
            is_hidden: true,
            catalog_id: "cat-1".to_string(),
        };

        assert_eq!(
            package.to_body(),
            json!({
                "displayName": "Sales",
                "description": "Sales tooling",
                "isHidden": true,
                "catalog": {"id": "cat-1"},
            })
        );
    }

    #[test]
    fn test_em_path() {
        assert_eq!(
            em("catalogs"),
            "identityGovernance/entitlementManagement/catalogs"
        );
    }

    mod graph {
        use super::*;
        use crate::api::auth::Session;
        use crate::config::GraphSettings;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};
        use wiremock::matchers::{body_json, header, method, path, query_param};
        use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

        const CATALOGS: &str = "/v1.0/identityGovernance/entitlementManagement/catalogs";

        async fn graph_for(server: &MockServer) -> GraphGovernance {
            let settings = GraphSettings {
                endpoint: server.uri(),
                access_token: Some("test-token".to_string()),
                ..GraphSettings::default()
            };
            let session = Arc::new(Session::connect(&settings).await.unwrap());
            GraphGovernance::new(GraphClient::new(session, &settings))
        }

        /// Serves `pages` in order, one per request
        struct PagedResponder {
            pages: Vec<Value>,
            served: AtomicU32,
        }

        impl Respond for PagedResponder {
            fn respond(&self, _request: &Request) -> ResponseTemplate {
                let idx = self.served.fetch_add(1, Ordering::SeqCst) as usize;
                match self.pages.get(idx) {
                    Some(page) => ResponseTemplate::new(200).set_body_json(page.clone()),
                    None => ResponseTemplate::new(200).set_body_json(json!({"value": []})),
                }
            }
        }

        #[tokio::test]
        async fn test_find_catalog_filters_by_display_name() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(CATALOGS))
                .and(query_param("$filter", "displayName eq 'O''Brien HR'"))
                .and(header("Authorization", "Bearer test-token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [
                        {"id": "cat-1", "displayName": "O'Brien HR"},
                        {"id": "cat-2", "displayName": "O'Brien HR"}
                    ]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let catalog = graph.find_catalog("O'Brien HR").await.unwrap().unwrap();
            assert_eq!(catalog.id, "cat-1");
        }

        #[tokio::test]
        async fn test_find_catalog_empty_collection_is_none() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(CATALOGS))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            assert!(graph.find_catalog("Nope").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_get_catalog_not_found_is_none() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(format!("{}/missing", CATALOGS)))
                .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                    "error": {"code": "ResourceNotFound", "message": "Catalog not found"}
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("{}/cat-1", CATALOGS)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": "cat-1",
                    "displayName": "General"
                })))
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            assert!(graph.get_catalog("missing").await.unwrap().is_none());
            assert_eq!(
                graph.get_catalog("cat-1").await.unwrap().unwrap().display_name,
                "General"
            );
        }

        #[tokio::test]
        async fn test_get_catalog_other_errors_propagate() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(format!("{}/cat-1", CATALOGS)))
                .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                    "error": {"code": "Authorization_RequestDenied", "message": "Insufficient privileges"}
                })))
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let err = graph.get_catalog("cat-1").await.unwrap_err();
            assert_eq!(
                format!("{:#}", err),
                "Graph API error 403 (Authorization_RequestDenied): Insufficient privileges"
            );
        }

        #[tokio::test]
        async fn test_create_catalog_posts_body() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(CATALOGS))
                .and(body_json(json!({
                    "displayName": "HR",
                    "description": "HR catalog"
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                    "id": "cat-9",
                    "displayName": "HR",
                    "description": "HR catalog"
                })))
                .expect(1)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let catalog = graph.create_catalog("HR", "HR catalog").await.unwrap();
            assert_eq!(catalog.id, "cat-9");
        }

        #[tokio::test]
        async fn test_conflict_is_decoded_from_odata_envelope() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(CATALOGS))
                .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                    "error": {
                        "code": "CatalogAlreadyExists",
                        "message": "A catalog with this name already exists.",
                        "innerError": {"request-id": "abc"}
                    }
                })))
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let err = graph.create_catalog("HR", "HR catalog").await.unwrap_err();
            assert_eq!(
                format!("{:#}", err),
                "Graph API error 409 (CatalogAlreadyExists): A catalog with this name already exists."
            );
        }

        #[tokio::test]
        async fn test_find_access_package_expands_catalog() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1.0/identityGovernance/entitlementManagement/accessPackages"))
                .and(query_param("$filter", "displayName eq 'Sales'"))
                .and(query_param("$expand", "catalog"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [{
                        "id": "ap-1",
                        "displayName": "Sales",
                        "isHidden": false,
                        "catalog": {"id": "cat-1", "displayName": "General"}
                    }]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let package = graph.find_access_package("Sales").await.unwrap().unwrap();
            assert_eq!(package.catalog.unwrap().id, "cat-1");
        }

        #[tokio::test]
        async fn test_create_access_package_posts_catalog_reference() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1.0/identityGovernance/entitlementManagement/accessPackages"))
                .and(body_json(json!({
                    "displayName": "Sales",
                    "description": "Sales tooling",
                    "isHidden": true,
                    "catalog": {"id": "cat-1"}
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                    "id": "ap-7",
                    "displayName": "Sales",
                    "isHidden": true
                })))
                .expect(1)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let package = graph
                .create_access_package(&NewAccessPackage {
                    display_name: "Sales".to_string(),
                    description: "Sales tooling".to_string(),
                    is_hidden: true,
                    catalog_id: "cat-1".to_string(),
                })
                .await
                .unwrap();
            assert_eq!(package.id, "ap-7");
        }

        #[tokio::test]
        async fn test_directory_lookups_use_expected_filters() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1.0/users"))
                .and(query_param("$filter", "userPrincipalName eq 'alice@contoso.com'"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [{"id": "u-1", "userPrincipalName": "alice@contoso.com"}]
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/v1.0/groups"))
                .and(query_param("$filter", "displayName eq 'IT Approvers'"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [{"id": "g-1", "displayName": "IT Approvers"}]
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/v1.0/servicePrincipals"))
                .and(query_param("$filter", "displayName eq 'Payroll'"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [{"id": "sp-1", "displayName": "Payroll"}]
                })))
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            assert_eq!(
                graph.find_user("alice@contoso.com").await.unwrap().unwrap().id,
                "u-1"
            );
            assert_eq!(graph.find_group("IT Approvers").await.unwrap().unwrap().id, "g-1");
            assert_eq!(
                graph.find_service_principal("Payroll").await.unwrap().unwrap().id,
                "sp-1"
            );
        }

        #[tokio::test]
        async fn test_search_site_encodes_query() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/v1.0/sites"))
                .and(query_param("search", "https://contoso.sharepoint.com/sites/hr"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [{
                        "id": "site-1",
                        "displayName": "HR",
                        "webUrl": "https://contoso.sharepoint.com/sites/hr"
                    }]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let site = graph
                .search_site("https://contoso.sharepoint.com/sites/hr")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(site.id, "site-1");
        }

        #[tokio::test]
        async fn test_list_catalog_resources_follows_next_link() {
            let server = MockServer::start().await;
            let resources = format!("{}/cat-1/resources", CATALOGS);
            let pages = vec![
                json!({
                    "value": [{"id": "r-1", "originId": "g-1", "originSystem": "AadGroup"}],
                    "@odata.nextLink": format!(
                        "{}{}?$expand=scopes&$skiptoken=page2",
                        server.uri(),
                        resources
                    )
                }),
                json!({
                    "value": [{
                        "id": "r-2",
                        "originId": "sp-1",
                        "originSystem": "AadApplication",
                        "scopes": [{"id": "s-1", "originId": "sp-1", "originSystem": "AadApplication", "isRootScope": true}]
                    }]
                }),
            ];

            Mock::given(method("GET"))
                .and(path(resources.as_str()))
                .and(query_param("$expand", "scopes"))
                .respond_with(PagedResponder {
                    pages,
                    served: AtomicU32::new(0),
                })
                .expect(2)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let listed = graph.list_catalog_resources("cat-1").await.unwrap();
            assert_eq!(
                listed.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
                vec!["r-1", "r-2"]
            );
            assert_eq!(listed[1].scopes.len(), 1);

            let requests = server.received_requests().await.unwrap();
            assert_eq!(requests.len(), 2);
            assert!(requests[1].url.query().unwrap_or_default().contains("$skiptoken=page2"));
        }

        #[tokio::test]
        async fn test_list_resource_roles_filters_and_expands() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(format!("{}/cat-1/resourceRoles", CATALOGS)))
                .and(query_param(
                    "$filter",
                    "(originSystem eq 'AadGroup' and resource/id eq 'r-1')",
                ))
                .and(query_param("$expand", "resource"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [
                        {"id": "role-1", "displayName": "Member", "originId": "Member_g-1", "originSystem": "AadGroup"},
                        {"id": "role-2", "displayName": "Owner", "originId": "Owner_g-1", "originSystem": "AadGroup"}
                    ]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            let roles = graph
                .list_resource_roles("cat-1", "AadGroup", "r-1")
                .await
                .unwrap();
            assert_eq!(roles.len(), 2);
            assert_eq!(roles[1].display_name, "Owner");
        }

        #[tokio::test]
        async fn test_resource_posts_discard_response_body() {
            let server = MockServer::start().await;
            let request = json!({
                "requestType": "adminAdd",
                "resource": {"originId": "g-1", "originSystem": "AadGroup"},
                "catalog": {"id": "cat-1"}
            });
            let scope = json!({
                "role": {"originId": "Member_g-1", "originSystem": "AadGroup"},
                "scope": {"originId": "g-1", "originSystem": "AadGroup"}
            });

            Mock::given(method("POST"))
                .and(path("/v1.0/identityGovernance/entitlementManagement/resourceRequests"))
                .and(body_json(&request))
                .respond_with(ResponseTemplate::new(201))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(
                    "/v1.0/identityGovernance/entitlementManagement/accessPackages/ap-1/resourceRoleScopes",
                ))
                .and(body_json(&scope))
                .respond_with(ResponseTemplate::new(201))
                .expect(1)
                .mount(&server)
                .await;

            let graph = graph_for(&server).await;
            graph.request_resource(&request).await.unwrap();
            graph.add_resource_role_scope("ap-1", &scope).await.unwrap();
        }
    }
}
