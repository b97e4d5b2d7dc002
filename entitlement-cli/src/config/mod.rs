//! Layered configuration
//!
//! Settings are resolved from built-in defaults, then an optional TOML file
//! (`~/.config/entitlement-cli/config.toml` or `--config`), then environment
//! variables (a `.env` file is loaded into the environment by `main`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level settings for a run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub graph: GraphSettings,
    pub policy: PolicyConfig,
}

/// Connection settings for Microsoft Graph
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Pre-issued bearer token; when present no token is requested
    pub access_token: Option<String>,
    pub endpoint: String,
    pub login_endpoint: String,
    pub api_version: String,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            endpoint: "https://graph.microsoft.com".to_string(),
            login_endpoint: "https://login.microsoftonline.com".to_string(),
            api_version: "v1.0".to_string(),
        }
    }
}

impl GraphSettings {
    /// Base URL for API requests, e.g. `https://graph.microsoft.com/v1.0`
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

/// Process-wide constants used when building assignment policies.
///
/// Every duration is an ISO 8601 duration literal as accepted by Graph.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub approval_policy_prefix: String,
    pub auto_assignment_policy_prefix: String,
    /// Window after which an unanswered request is denied
    pub approval_denial_after: String,
    /// Delay before an unanswered request goes to the escalation approvers
    pub escalation_after: String,
    /// Grace period before access is removed when a user leaves the rule
    pub auto_removal_grace_period: String,
    pub review: ReviewCadence,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            approval_policy_prefix: "Approval policy - ".to_string(),
            auto_assignment_policy_prefix: "Auto-assignment policy - ".to_string(),
            approval_denial_after: "P7D".to_string(),
            escalation_after: "P4D".to_string(),
            auto_removal_grace_period: "P7D".to_string(),
            review: ReviewCadence::default(),
        }
    }
}

impl PolicyConfig {
    pub fn approval_policy_name(&self, access_package: &str) -> String {
        format!("{}{}", self.approval_policy_prefix, access_package)
    }

    pub fn auto_assignment_policy_name(&self, access_package: &str) -> String {
        format!("{}{}", self.auto_assignment_policy_prefix, access_package)
    }
}

/// Recurring access review schedule attached to approval policies
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewCadence {
    pub recurrence: RecurrenceType,
    pub interval: u32,
    /// How long each review stays open
    pub duration: String,
    pub expiration_behavior: ReviewExpirationBehavior,
    pub recommendations: bool,
    pub justification_required: bool,
}

impl Default for ReviewCadence {
    fn default() -> Self {
        Self {
            recurrence: RecurrenceType::AbsoluteMonthly,
            interval: 3,
            duration: "P14D".to_string(),
            expiration_behavior: ReviewExpirationBehavior::KeepAccess,
            recommendations: true,
            justification_required: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecurrenceType {
    Weekly,
    AbsoluteMonthly,
    AbsoluteYearly,
}

impl RecurrenceType {
    pub fn as_graph_str(&self) -> &'static str {
        match self {
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::AbsoluteMonthly => "absoluteMonthly",
            RecurrenceType::AbsoluteYearly => "absoluteYearly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewExpirationBehavior {
    KeepAccess,
    RemoveAccess,
    AcceptAccessRecommendation,
}

impl ReviewExpirationBehavior {
    pub fn as_graph_str(&self) -> &'static str {
        match self {
            ReviewExpirationBehavior::KeepAccess => "keepAccess",
            ReviewExpirationBehavior::RemoveAccess => "removeAccess",
            ReviewExpirationBehavior::AcceptAccessRecommendation => "acceptAccessRecommendation",
        }
    }
}

/// Default config file location (~/.config/entitlement-cli/config.toml)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("entitlement-cli")
        .join("config.toml")
}

impl Settings {
    /// Load settings from an explicit path, or from the default location if
    /// it exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("GRAPH_TENANT_ID") {
            self.graph.tenant_id = Some(value);
        }
        if let Some(value) = get("GRAPH_CLIENT_ID") {
            self.graph.client_id = Some(value);
        }
        if let Some(value) = get("GRAPH_CLIENT_SECRET") {
            self.graph.client_secret = Some(value);
        }
        if let Some(value) = get("GRAPH_ACCESS_TOKEN") {
            self.graph.access_token = Some(value);
        }
        if let Some(value) = get("GRAPH_ENDPOINT") {
            self.graph.endpoint = value;
        }
        if let Some(value) = get("GRAPH_LOGIN_ENDPOINT") {
            self.graph.login_endpoint = value;
        }
        if let Some(value) = get("GRAPH_API_VERSION") {
            self.graph.api_version = value;
        }
    }
}
