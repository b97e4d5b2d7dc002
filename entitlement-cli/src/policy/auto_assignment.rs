//! Automatic assignment policy driven by a dynamic membership rule

use serde_json::{Value, json};

use super::PolicyBuilder;

/// Per-record inputs of an auto-assignment policy
#[derive(Debug, Clone, PartialEq)]
pub struct AutoAssignmentPolicy {
    pub access_package_id: String,
    pub access_package_name: String,
    pub membership_rule: String,
}

impl PolicyBuilder<'_> {
    pub fn auto_assignment_policy_name(&self, access_package_name: &str) -> String {
        self.config.auto_assignment_policy_name(access_package_name)
    }

    /// Request body for a policy that assigns everyone matching the rule and
    /// removes access once they stop matching.
    pub fn auto_assignment(&self, policy: &AutoAssignmentPolicy) -> Value {
        json!({
            "displayName": self.auto_assignment_policy_name(&policy.access_package_name),
            "description": format!("Automatic assignment for {}", policy.access_package_name),
            "allowedTargetScope": "specificDirectoryUsers",
            "specificAllowedTargets": [{
                "@odata.type": "#microsoft.graph.attributeRuleMembers",
                "description": format!("Users matching the rule for {}", policy.access_package_name),
                "membershipRule": policy.membership_rule,
            }],
            "automaticRequestSettings": {
                "requestAccessForAllowedTargets": true,
                "removeAccessWhenTargetLeavesAllowedTargets": true,
                "gracePeriodBeforeAccessRemoval": self.config.auto_removal_grace_period,
            },
            "accessPackage": { "id": policy.access_package_id },
        })
    }
}
