//! Per-(policy, workload) lifecycle state machines
//!
//! Each axis is a pure function from desired state and the persisted
//! [`ServiceRecord`] to an optional backend action plus the record to persist
//! once that action has succeeded. The reconciler executes the action and
//! only then saves `next`, so a failed call leaves the record untouched and
//! the transition is retried on the next pass.
//!
//! Axes run in a fixed order: existence, hibernation, limited support,
//! orchestration.

pub mod existence;
pub mod hibernation;
pub mod limited_support;
pub mod orchestration;

pub use existence::{escalation_transition, ExistencePlan};
pub use hibernation::hibernation_transition;
pub use limited_support::limited_support_transition;
pub use orchestration::{apply_transition, enable_transition, orchestration_gate};

use pdo_types::ServiceRecord;

/// Backend call a transition requires
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceAction {
    Enable,
    Disable,
    UpdateEscalationPolicy(String),
    ToggleOrchestration(bool),
    ApplyOrchestrationRules(serde_json::Value),
}

/// Action to execute and the record to persist after it succeeds
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub action: ServiceAction,
    pub next: ServiceRecord,
}

impl Transition {
    pub(crate) fn new(action: ServiceAction, next: ServiceRecord) -> Self {
        Self { action, next }
    }
}
