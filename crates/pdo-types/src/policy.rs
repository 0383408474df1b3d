//! Alerting policy
//!
//! A policy declares which workloads receive an incident service and how that
//! service is configured. Policies are owned by an external author; the
//! controller only reads them, manages their protective finalizer and writes
//! the degraded status.

use crate::ids::PolicyId;
use crate::naming;
use crate::selector::{LabelSelector, SelectorError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Reference to a namespaced object in the resource store
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Service orchestration settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Object holding the shared rule document
    #[serde(default)]
    pub rule_source: Option<ObjectRef>,
}

/// How the backend groups incoming alerts into incidents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertGroupingType {
    Time,
    Intelligent,
    ContentBased,
}

impl fmt::Display for AlertGroupingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertGroupingType::Time => write!(f, "time"),
            AlertGroupingType::Intelligent => write!(f, "intelligent"),
            AlertGroupingType::ContentBased => write!(f, "content_based"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroupingSpec {
    pub grouping_type: AlertGroupingType,
    pub timeout_minutes: u32,
}

/// Why a policy is currently degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradedReason {
    /// Backend credentials could not be loaded
    CredentialsUnavailable,
    /// Policy failed validation (selector or required field)
    InvalidPolicy,
    /// One or more workloads failed to reconcile
    ReconcileFailed,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::CredentialsUnavailable => write!(f, "credentials_unavailable"),
            DegradedReason::InvalidPolicy => write!(f, "invalid_policy"),
            DegradedReason::ReconcileFailed => write!(f, "reconcile_failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedCondition {
    pub reason: DegradedReason,
    pub message: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatus {
    #[serde(default)]
    pub degraded: Option<DegradedCondition>,
}

/// Declarative alerting policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: PolicyId,
    pub selector: LabelSelector,
    pub escalation_policy_id: String,
    #[serde(default)]
    pub resolve_timeout_seconds: u32,
    #[serde(default)]
    pub acknowledge_timeout_seconds: u32,
    pub service_prefix: String,
    #[serde(default)]
    pub orchestration: OrchestrationSpec,
    #[serde(default)]
    pub alert_grouping: Option<AlertGroupingSpec>,
    pub credentials_ref: ObjectRef,
    pub target_secret_ref: ObjectRef,
    #[serde(default)]
    pub deletion_requested: bool,
    #[serde(default)]
    pub finalizers: BTreeSet<String>,
    #[serde(default)]
    pub status: PolicyStatus,
}

impl Policy {
    /// Create a policy with empty references and no orchestration
    pub fn new(
        id: impl Into<String>,
        selector: LabelSelector,
        escalation_policy_id: impl Into<String>,
    ) -> Self {
        Self {
            id: PolicyId::new(id),
            selector,
            escalation_policy_id: escalation_policy_id.into(),
            resolve_timeout_seconds: 0,
            acknowledge_timeout_seconds: 0,
            service_prefix: "osd".to_string(),
            orchestration: OrchestrationSpec::default(),
            alert_grouping: None,
            credentials_ref: ObjectRef::default(),
            target_secret_ref: ObjectRef::default(),
            deletion_requested: false,
            finalizers: BTreeSet::new(),
            status: PolicyStatus::default(),
        }
    }

    pub fn with_service_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.service_prefix = prefix.into();
        self
    }

    pub fn with_credentials(mut self, credentials_ref: ObjectRef) -> Self {
        self.credentials_ref = credentials_ref;
        self
    }

    pub fn with_target_secret(mut self, target_secret_ref: ObjectRef) -> Self {
        self.target_secret_ref = target_secret_ref;
        self
    }

    pub fn with_orchestration(mut self, rule_source: ObjectRef) -> Self {
        self.orchestration = OrchestrationSpec {
            enabled: true,
            rule_source: Some(rule_source),
        };
        self
    }

    pub fn with_alert_grouping(mut self, grouping: AlertGroupingSpec) -> Self {
        self.alert_grouping = Some(grouping);
        self
    }

    /// Finalizer this policy places on every workload it manages
    pub fn workload_finalizer(&self) -> String {
        naming::workload_finalizer(&self.id)
    }

    /// Rule source to apply, if orchestration is switched on and configured
    pub fn orchestration_source(&self) -> Option<&ObjectRef> {
        if !self.orchestration.enabled {
            return None;
        }
        self.orchestration
            .rule_source
            .as_ref()
            .filter(|r| !r.is_empty())
    }

    pub fn is_protected(&self) -> bool {
        self.finalizers.contains(naming::POLICY_FINALIZER)
    }

    /// Validate the fields the controller cannot proceed without
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.escalation_policy_id.trim().is_empty() {
            return Err(PolicyValidationError::MissingField("escalationPolicyId"));
        }
        if self.service_prefix.trim().is_empty() {
            return Err(PolicyValidationError::MissingField("servicePrefix"));
        }
        if self.credentials_ref.is_empty() {
            return Err(PolicyValidationError::MissingField("credentialsRef"));
        }
        if self.target_secret_ref.is_empty() {
            return Err(PolicyValidationError::MissingField("targetSecretRef"));
        }
        self.selector.validate()?;
        Ok(())
    }
}

/// Policy validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyValidationError {
    #[error("required field {0} is empty")]
    MissingField(&'static str),

    #[error("invalid selector: {0}")]
    Selector(#[from] SelectorError),
}
