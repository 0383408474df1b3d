//! Orchestration axis
//!
//! Orchestration must be switched on for a service before any rule document
//! is applied to it. The persisted record enforces the ordering: rules are
//! only applied once `orchestration_enabled` has been saved.

use pdo_types::{ObjectRef, Policy, RuleSource, SelectorError, ServiceRecord, Workload};

use super::{ServiceAction, Transition};
use crate::matcher;

/// Rule source to use for this workload, or `None` when orchestration does
/// not apply to it at all
pub fn orchestration_gate<'a>(
    policy: &'a Policy,
    workload: &Workload,
    record: &ServiceRecord,
) -> Option<&'a ObjectRef> {
    if !workload.installed || workload.is_synthetic() || !record.is_created() {
        return None;
    }
    policy.orchestration_source()
}

/// Switch orchestration on for the service if it is not yet
pub fn enable_transition(record: &ServiceRecord) -> Option<Transition> {
    if record.orchestration_enabled {
        return None;
    }
    Some(Transition::new(
        ServiceAction::ToggleOrchestration(true),
        ServiceRecord {
            orchestration_enabled: true,
            ..record.clone()
        },
    ))
}

/// Apply the rule document when its labels satisfy the policy selector.
///
/// Rules are re-applied on every pass so edits to the source propagate; the
/// backend treats an identical document as a no-op.
pub fn apply_transition(
    policy: &Policy,
    record: &ServiceRecord,
    source: &RuleSource,
) -> Result<Option<Transition>, SelectorError> {
    if !record.orchestration_enabled {
        return Ok(None);
    }
    if !matcher::matches(&policy.selector, &source.labels)? {
        return Ok(None);
    }
    Ok(Some(Transition::new(
        ServiceAction::ApplyOrchestrationRules(source.rules.clone()),
        ServiceRecord {
            orchestration_rule_applied: true,
            ..record.clone()
        },
    )))
}
