//! Approval-based assignment policy

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use super::{Approver, PolicyBuilder};

/// How long an assignment lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    NoExpiration,
    AfterDays(u32),
}

impl Expiration {
    /// Blank duration means the assignment never expires
    pub fn from_days(days: Option<u32>) -> Self {
        match days {
            Some(days) => Expiration::AfterDays(days),
            None => Expiration::NoExpiration,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Expiration::NoExpiration => json!({ "type": "noExpiration" }),
            Expiration::AfterDays(days) => json!({
                "type": "afterDuration",
                "duration": format!("P{}D", days),
            }),
        }
    }
}

/// Per-record inputs of an approval policy
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalPolicy {
    pub access_package_id: String,
    pub access_package_name: String,
    pub approver: Approver,
    pub escalation_approver: Option<Approver>,
    pub expiration: Expiration,
    pub access_reviews: bool,
}

impl PolicyBuilder<'_> {
    pub fn approval_policy_name(&self, access_package_name: &str) -> String {
        self.config.approval_policy_name(access_package_name)
    }

    /// Request body for an approval policy open to all member users.
    ///
    /// `now` anchors the first access review.
    pub fn approval(&self, policy: &ApprovalPolicy, now: DateTime<Utc>) -> Value {
        let escalation_approvers: Vec<Value> = policy
            .escalation_approver
            .iter()
            .map(Approver::subject_set)
            .collect();
        let escalation_enabled = !escalation_approvers.is_empty();

        let mut stage = json!({
            "durationBeforeAutomaticDenial": self.config.approval_denial_after,
            "isApproverJustificationRequired": false,
            "isEscalationEnabled": escalation_enabled,
            "primaryApprovers": [policy.approver.subject_set()],
            "fallbackPrimaryApprovers": [],
            "escalationApprovers": escalation_approvers,
            "fallbackEscalationApprovers": [],
        });
        if escalation_enabled {
            stage["durationBeforeEscalation"] = json!(self.config.escalation_after);
        }

        let mut body = json!({
            "displayName": self.approval_policy_name(&policy.access_package_name),
            "description": format!("Approval required to request {}", policy.access_package_name),
            "allowedTargetScope": "allMemberUsers",
            "expiration": policy.expiration.to_json(),
            "requestorSettings": {
                "enableTargetsToSelfAddAccess": true,
                "enableTargetsToSelfUpdateAccess": false,
                "enableTargetsToSelfRemoveAccess": true,
                "allowCustomAssignmentSchedule": false,
                "enableOnBehalfRequestorsToAddAccess": false,
                "enableOnBehalfRequestorsToUpdateAccess": false,
                "enableOnBehalfRequestorsToRemoveAccess": false,
                "onBehalfRequestors": [],
            },
            "requestApprovalSettings": {
                "isApprovalRequiredForAdd": true,
                "isApprovalRequiredForUpdate": false,
                "stages": [stage],
            },
            "accessPackage": { "id": policy.access_package_id },
        });

        if policy.access_reviews {
            body["reviewSettings"] = self.review_settings(&policy.approver, now);
        }

        body
    }

    fn review_settings(&self, reviewer: &Approver, now: DateTime<Utc>) -> Value {
        let review = &self.config.review;

        json!({
            "isEnabled": true,
            "expirationBehavior": review.expiration_behavior.as_graph_str(),
            "isRecommendationEnabled": review.recommendations,
            "isReviewerJustificationRequired": review.justification_required,
            "isSelfReview": false,
            "schedule": {
                "startDateTime": now.to_rfc3339_opts(SecondsFormat::Secs, true),
                "expiration": {
                    "type": "afterDuration",
                    "duration": review.duration,
                },
                "recurrence": {
                    "pattern": {
                        "type": review.recurrence.as_graph_str(),
                        "interval": review.interval,
                    },
                    "range": {
                        "type": "noEnd",
                        "startDate": now.format("%Y-%m-%d").to_string(),
                    },
                },
            },
            "primaryReviewers": [reviewer.subject_set()],
            "fallbackReviewers": [],
        })
    }
}
