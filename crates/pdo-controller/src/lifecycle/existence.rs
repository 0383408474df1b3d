//! Existence axis

use pdo_types::{Policy, ServiceRecord, Workload};

use super::{ServiceAction, Transition};

/// What the existence axis does for a workload this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistencePlan {
    /// Not installed yet; nothing to do
    Defer,
    /// No service recorded; create one
    Create,
    /// Service recorded; refresh its key, secret and distribution object
    Refresh,
}

impl ExistencePlan {
    pub fn for_workload(workload: &Workload, record: Option<&ServiceRecord>) -> Self {
        if !workload.installed {
            ExistencePlan::Defer
        } else if record.is_some_and(ServiceRecord::is_created) {
            ExistencePlan::Refresh
        } else {
            ExistencePlan::Create
        }
    }
}

/// Push the policy's escalation policy when the persisted one has drifted
pub fn escalation_transition(policy: &Policy, record: &ServiceRecord) -> Option<Transition> {
    if !record.is_created() || record.escalation_policy_id == policy.escalation_policy_id {
        return None;
    }
    let next = ServiceRecord {
        escalation_policy_id: policy.escalation_policy_id.clone(),
        ..record.clone()
    };
    Some(Transition::new(
        ServiceAction::UpdateEscalationPolicy(policy.escalation_policy_id.clone()),
        next,
    ))
}
