//! HTTP client for Microsoft Graph with token injection and paging.
//!
//! Requests are issued exactly once; failures are decoded from the OData
//! error envelope and surfaced to the caller.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::auth::Session;
use crate::config::GraphSettings;

/// OData error envelope
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
}

/// A page of a collection response
#[derive(Debug, Deserialize)]
pub struct ODataPage<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GraphClient {
    http_client: reqwest::Client,
    session: Arc<Session>,
    base_url: String,
}

impl GraphClient {
    pub fn new(session: Arc<Session>, settings: &GraphSettings) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            session,
            base_url: settings.base_url(),
        }
    }

    /// Resolve a relative path against the API root; absolute URLs
    /// (e.g. `@odata.nextLink`) are used as-is.
    fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        log::debug!("GET {}", url);

        let token = self.session.access_token().await?;
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// GET a single entity; 404 Not Found yields `None`
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        log::debug!("GET {}", url);

        let token = self.session.access_token().await?;
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        let entity = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))?;
        Ok(Some(entity))
    }

    /// GET a collection, following `@odata.nextLink` until exhausted
    pub async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(path.to_string());

        while let Some(path) = next {
            let page: ODataPage<T> = self.get(&path).await?;
            items.extend(page.value);
            next = page.next_link;
        }

        Ok(items)
    }

    /// GET the first item of a collection, if any
    pub async fn get_first<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let page: ODataPage<T> = self.get(path).await?;
        Ok(page.value.into_iter().next())
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send_post(path, body).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from POST {}", path))
    }

    /// POST where the response body is not needed
    pub async fn post_discard<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send_post(path, body).await.map(|_| ())
    }

    async fn send_post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        log::debug!("POST {}", url);

        let token = self.session.access_token().await?;
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(anyhow!(describe_error(status, &body)))
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ODataError>(body) {
        Ok(odata) => format!(
            "Graph API error {} ({}): {}",
            status.as_u16(),
            odata.error.code,
            odata.error.message
        ),
        Err(_) if body.trim().is_empty() => format!("Graph API error {}", status),
        Err(_) => format!("Graph API error {}: {}", status, body.trim()),
    }
}
