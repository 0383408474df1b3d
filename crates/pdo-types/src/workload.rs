//! Workloads
//!
//! A workload is a fleet member owned by another controller. PDO reads it
//! and only ever writes its finalizer set.

use crate::ids::WorkloadId;
use crate::naming;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Condition type the older status schema used for hibernation
pub const HIBERNATING_CONDITION: &str = "Hibernating";

/// Reason the older status schema reported once instances were serving again
pub const LEGACY_RUNNING_REASON: &str = "Running";

/// Desired power state of a workload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    Running,
    Hibernating,
    Resuming,
}

/// Support labels applied by the support organisation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportLabels {
    #[serde(default)]
    pub limited_support: bool,
    #[serde(default)]
    pub support_exception: bool,
}

/// Structured condition from the older status schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: bool,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    /// Explicit "instances running" signal from the current status schema
    #[serde(default)]
    pub instances_running: Option<bool>,
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

/// A fleet member that may be selected by policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub id: WorkloadId,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub base_domain: String,
    #[serde(default)]
    pub power_state: PowerState,
    #[serde(default)]
    pub support: SupportLabels,
    #[serde(default)]
    pub status: WorkloadStatus,
    #[serde(default)]
    pub deletion_requested: bool,
    #[serde(default)]
    pub finalizers: BTreeSet<String>,
}

impl Workload {
    pub fn new(id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            id: WorkloadId::new(id),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            installed: false,
            base_domain: String::new(),
            power_state: PowerState::Running,
            support: SupportLabels::default(),
            status: WorkloadStatus::default(),
            deletion_requested: false,
            finalizers: BTreeSet::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn installed(mut self) -> Self {
        self.installed = true;
        self
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.contains(finalizer)
    }

    /// Synthetic fixtures never get orchestration rules
    pub fn is_synthetic(&self) -> bool {
        self.annotations
            .get(naming::SYNTHETIC_ANNOTATION)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn is_hibernating(&self) -> bool {
        self.power_state == PowerState::Hibernating
    }

    /// Whether the workload's own control plane reports instances serving.
    ///
    /// Prefers the explicit status field; falls back to the legacy
    /// `Hibernating=false, reason=Running` condition.
    pub fn instances_running(&self) -> bool {
        if let Some(running) = self.status.instances_running {
            return running;
        }
        self.status.conditions.iter().any(|c| {
            c.condition_type == HIBERNATING_CONDITION
                && !c.status
                && c.reason == LEGACY_RUNNING_REASON
        })
    }
}
