//! Readiness conditions for ManagedEndpoint subresources.
//!
//! Each tracked subresource carries one tri-state condition with reason and
//! message. `set_condition` keeps the invariant that a type appears at most
//! once, and only bumps the transition timestamp when the status actually
//! transitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The fixed set of tracked subresource conditions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionType {
    /// The network endpoint is available and its memberships converged.
    EndpointReady,
    /// The managed security group exists with the desired rules.
    SecurityGroupReady,
    /// The hosted zone and record are in place.
    CustomDnsReady,
    /// The in-cluster alias service exists.
    AliasServiceReady,
}

impl ConditionType {
    /// String form persisted in the condition.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::EndpointReady => "EndpointReady",
            ConditionType::SecurityGroupReady => "SecurityGroupReady",
            ConditionType::CustomDnsReady => "CustomDnsReady",
            ConditionType::AliasServiceReady => "AliasServiceReady",
        }
    }
}

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    /// The subresource is ready.
    True,
    /// The subresource is not ready; see reason/message.
    False,
    /// Readiness could not be determined.
    #[default]
    Unknown,
}

/// A typed, timestamped readiness flag for one subresource.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type; unique within a status.
    #[serde(rename = "type")]
    pub type_: String,

    /// True/False/Unknown.
    pub status: ConditionStatus,

    /// Machine-readable reason for the last transition.
    pub reason: String,

    /// Human-readable detail.
    #[serde(default)]
    pub message: String,

    /// When `status` last changed.
    pub last_transition_time: chrono::DateTime<chrono::Utc>,
}

/// Replace the condition of the given type, preserving the transition time
/// when status and reason are unchanged.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    type_: ConditionType,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) {
    let now = chrono::Utc::now();
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_.as_str()) {
        let transitioned = existing.status != status || existing.reason != reason;
        existing.status = status;
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        if transitioned {
            existing.last_transition_time = now;
        }
        return;
    }
    conditions.push(Condition {
        type_: type_.as_str().to_string(),
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: now,
    });
}

/// Look up the condition of the given type.
#[must_use]
pub fn find_condition(conditions: &[Condition], type_: ConditionType) -> Option<&Condition> {
    conditions.iter().find(|c| c.type_ == type_.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_inserts_once_per_type() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            ConditionType::EndpointReady,
            ConditionStatus::False,
            "NotYetAvailable",
            "endpoint is pending",
        );
        set_condition(
            &mut conditions,
            ConditionType::EndpointReady,
            ConditionStatus::True,
            "Available",
            "",
        );
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, ConditionStatus::True);
        assert_eq!(conditions[0].reason, "Available");
    }

    #[test]
    fn test_unchanged_status_and_reason_keeps_transition_time() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            ConditionType::SecurityGroupReady,
            ConditionStatus::True,
            "Reconciled",
            "sg-1",
        );
        let first = conditions[0].last_transition_time;
        set_condition(
            &mut conditions,
            ConditionType::SecurityGroupReady,
            ConditionStatus::True,
            "Reconciled",
            "sg-1 still converged",
        );
        assert_eq!(conditions[0].last_transition_time, first);
        assert_eq!(conditions[0].message, "sg-1 still converged");
    }

    #[test]
    fn test_status_change_bumps_transition_time() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            ConditionType::CustomDnsReady,
            ConditionStatus::True,
            "Reconciled",
            "",
        );
        let first = conditions[0].last_transition_time;
        set_condition(
            &mut conditions,
            ConditionType::CustomDnsReady,
            ConditionStatus::False,
            "Deleted",
            "record removed",
        );
        assert!(conditions[0].last_transition_time >= first);
        assert_eq!(conditions[0].status, ConditionStatus::False);
    }

    #[test]
    fn test_find_condition() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            ConditionType::AliasServiceReady,
            ConditionStatus::Unknown,
            "Pending",
            "",
        );
        assert!(find_condition(&conditions, ConditionType::AliasServiceReady).is_some());
        assert!(find_condition(&conditions, ConditionType::EndpointReady).is_none());
    }
}
