//! Authenticated session for Microsoft Graph
//!
//! A session either reuses a bearer token handed in through the environment
//! or acquires one with the OAuth2 client credentials flow. Tokens are cached
//! and refreshed shortly before they expire.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::GraphSettings;

/// OAuth2 token response from the identity platform
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    /// None for tokens supplied from outside, whose lifetime is unknown
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_expired(&self, grace_period: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + grace_period >= expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
enum Credential {
    AccessToken(String),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl Credential {
    fn from_settings(settings: &GraphSettings) -> Result<Self> {
        if let Some(token) = &settings.access_token {
            return Ok(Credential::AccessToken(token.clone()));
        }

        match (
            &settings.tenant_id,
            &settings.client_id,
            &settings.client_secret,
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Ok(Credential::ClientSecret {
                    tenant_id: tenant_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                })
            }
            _ => bail!(
                "No Graph credentials configured. Set GRAPH_ACCESS_TOKEN, or GRAPH_TENANT_ID, GRAPH_CLIENT_ID and GRAPH_CLIENT_SECRET"
            ),
        }
    }
}

/// The one remote session shared by every record of a run
#[derive(Debug)]
pub struct Session {
    http_client: reqwest::Client,
    credential: Credential,
    login_endpoint: String,
    scope: String,
    token: RwLock<Option<CachedToken>>,
    grace_period: Duration,
}

impl Session {
    fn new(settings: &GraphSettings, credential: Credential) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            credential,
            login_endpoint: settings.login_endpoint.trim_end_matches('/').to_string(),
            scope: format!("{}/.default", settings.endpoint.trim_end_matches('/')),
            token: RwLock::new(None),
            grace_period: Duration::minutes(5),
        }
    }

    /// Establish a session, reusing a supplied token when one is configured
    pub async fn connect(settings: &GraphSettings) -> Result<Self> {
        let credential = Credential::from_settings(settings)?;
        let session = Self::new(settings, credential);

        match &session.credential {
            Credential::AccessToken(_) => log::info!("Reusing existing Graph access token"),
            Credential::ClientSecret { tenant_id, .. } => {
                log::info!("Connecting to Microsoft Graph (tenant {})", tenant_id)
            }
        }

        session
            .access_token()
            .await
            .context("Failed to establish a Microsoft Graph session")?;
        Ok(session)
    }

    /// Current bearer token, refreshed if it is about to expire
    pub async fn access_token(&self) -> Result<String> {
        {
            let cache = self.token.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let token = match &self.credential {
            Credential::AccessToken(token) => CachedToken {
                access_token: token.clone(),
                expires_at: None,
            },
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => {
                self.acquire_token(tenant_id, client_id, client_secret)
                    .await?
            }
        };

        let access_token = token.access_token.clone();
        *self.token.write().await = Some(token);
        Ok(access_token)
    }

    async fn acquire_token(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<CachedToken> {
        log::debug!("Requesting access token for {}", self.scope);

        let token_url = format!("{}/{}/oauth2/v2.0/token", self.login_endpoint, tenant_id);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .context("Token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Token request failed with status {}: {}", status, body);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        log::debug!(
            "Acquired access token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Some(expires_at),
        })
    }

    /// Drop the cached token. Fails if the session was already torn down.
    pub async fn disconnect(&self) -> Result<()> {
        let mut cache = self.token.write().await;
        if cache.take().is_none() {
            bail!("Session is not connected");
        }
        log::info!("Disconnected from Microsoft Graph");
        Ok(())
    }
}
