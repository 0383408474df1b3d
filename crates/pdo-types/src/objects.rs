//! Objects derived from or consumed by a policy
//!
//! Managed secrets and distribution objects are created per (policy,
//! workload) pair in the workload's namespace. They carry an explicit owner
//! so no consumer has to recover the workload from a derived name.

use crate::ids::{PolicyId, WorkloadId};
use crate::policy::ObjectRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Secret holding the integration key for one workload
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedSecret {
    pub name: String,
    pub namespace: String,
    pub owner: WorkloadId,
    pub policy: PolicyId,
    pub integration_key: String,
}

impl fmt::Debug for ManagedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedSecret")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("owner", &self.owner)
            .field("policy", &self.policy)
            .field("integration_key", &"<redacted>")
            .finish()
    }
}

/// Distribution manifest pushing the managed secret into the workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionObject {
    pub name: String,
    pub namespace: String,
    pub owner: WorkloadId,
    pub policy: PolicyId,
    /// Managed secret this object distributes
    pub secret_name: String,
    /// Where the secret lands inside the workload
    pub target_secret: ObjectRef,
}

/// Shared rule document for service orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSource {
    pub reference: ObjectRef,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub rules: serde_json::Value,
}

/// Backend API credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
