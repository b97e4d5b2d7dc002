//! Assignment policy payloads
//!
//! Builds the request bodies for the two policy variants an access package
//! can carry. Cadence and naming come from `PolicyConfig`; nothing here talks
//! to the remote service.

pub mod approval;
pub mod auto_assignment;

use serde_json::{Value, json};

use crate::config::PolicyConfig;
use crate::resolver::{ApproverType, Resource};

pub use approval::{ApprovalPolicy, Expiration};
pub use auto_assignment::AutoAssignmentPolicy;

/// A user or group acting as approver or reviewer
#[derive(Debug, Clone, PartialEq)]
pub struct Approver {
    pub approver_type: ApproverType,
    pub id: String,
    pub name: String,
}

impl Approver {
    /// Build from a resolved user or group; other kinds cannot approve
    pub fn from_resource(resource: &Resource) -> Option<Self> {
        let approver_type = match resource {
            Resource::User(_) => ApproverType::User,
            Resource::Group(_) => ApproverType::Group,
            _ => return None,
        };

        Some(Self {
            approver_type,
            id: resource.id().to_string(),
            name: resource.display_name().unwrap_or_default().to_string(),
        })
    }

    /// Graph `subjectSet` for this approver
    pub fn subject_set(&self) -> Value {
        match self.approver_type {
            ApproverType::User => json!({
                "@odata.type": "#microsoft.graph.singleUser",
                "userId": self.id,
                "description": self.name,
            }),
            ApproverType::Group => json!({
                "@odata.type": "#microsoft.graph.groupMembers",
                "groupId": self.id,
                "description": self.name,
            }),
        }
    }
}

/// Builds policy bodies from per-record inputs and process-wide constants
pub struct PolicyBuilder<'a> {
    config: &'a PolicyConfig,
}

impl<'a> PolicyBuilder<'a> {
    pub fn new(config: &'a PolicyConfig) -> Self {
        Self { config }
    }
}
