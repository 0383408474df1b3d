//! Persisted service record
//!
//! One record exists per (policy, workload) pair. The flat key-value wire
//! format lives in `pdo-state`; here the record is a plain typed value.

use crate::ids::ServiceId;
use serde::{Deserialize, Serialize};

/// Link between a (policy, workload) pair and its backend service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// `None` until the backend has created the service
    pub service_id: Option<ServiceId>,
    pub integration_id: Option<String>,
    /// Escalation policy last pushed to the backend; empty when unknown
    pub escalation_policy_id: String,
    pub hibernating: bool,
    pub limited_support: bool,
    pub orchestration_enabled: bool,
    /// Only ever true while `orchestration_enabled` is true
    pub orchestration_rule_applied: bool,
}

impl ServiceRecord {
    /// Record for a freshly created service
    pub fn created(
        service_id: ServiceId,
        integration_id: Option<String>,
        escalation_policy_id: impl Into<String>,
    ) -> Self {
        Self {
            service_id: Some(service_id),
            integration_id,
            escalation_policy_id: escalation_policy_id.into(),
            ..Default::default()
        }
    }

    /// The backend service id, if it has been created
    pub fn service_id(&self) -> Option<&ServiceId> {
        self.service_id.as_ref().filter(|id| !id.is_empty())
    }

    pub fn is_created(&self) -> bool {
        self.service_id().is_some()
    }
}
