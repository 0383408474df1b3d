//! Storage trait definitions

use std::collections::BTreeSet;

use async_trait::async_trait;
use pdo_types::{
    Credentials, DistributionObject, ManagedSecret, ObjectRef, Policy, PolicyId, PolicyStatus,
    RuleSource, ServiceRecord, Workload, WorkloadId,
};

use crate::error::StateResult;

/// Persistence for service records.
///
/// Records are read-then-written without conditional writes. That is only
/// safe while reconciles for one policy are serialized.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the record stored under `key`, `None` if absent
    async fn load(&self, namespace: &str, key: &str) -> StateResult<Option<ServiceRecord>>;

    /// Create or replace the record stored under `key`
    async fn save(&self, namespace: &str, key: &str, record: &ServiceRecord) -> StateResult<()>;

    /// Delete the record, returning whether it existed
    async fn delete(&self, namespace: &str, key: &str) -> StateResult<bool>;
}

/// Storage for objects derived per (policy, workload) pair
#[async_trait]
pub trait ManagedObjectStore: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> StateResult<Option<ManagedSecret>>;

    /// Create a secret; fails with `Conflict` if it already exists
    async fn create_secret(&self, secret: ManagedSecret) -> StateResult<()>;

    async fn delete_secret(&self, namespace: &str, name: &str) -> StateResult<bool>;

    async fn get_distribution(
        &self,
        namespace: &str,
        name: &str,
    ) -> StateResult<Option<DistributionObject>>;

    /// Create a distribution object; fails with `Conflict` if it already exists
    async fn create_distribution(&self, object: DistributionObject) -> StateResult<()>;

    async fn delete_distribution(&self, namespace: &str, name: &str) -> StateResult<bool>;
}

/// Read access to the declarative resource store, plus the few writes the
/// controller is allowed to make (finalizers and policy status)
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get a policy by ID
    async fn get_policy(&self, id: &PolicyId) -> StateResult<Option<Policy>>;

    /// List every workload, selected or not
    async fn list_workloads(&self) -> StateResult<Vec<Workload>>;

    /// Replace a workload's finalizer set
    async fn set_workload_finalizers(
        &self,
        id: &WorkloadId,
        finalizers: BTreeSet<String>,
    ) -> StateResult<()>;

    /// Replace a policy's finalizer set
    async fn set_policy_finalizers(
        &self,
        id: &PolicyId,
        finalizers: BTreeSet<String>,
    ) -> StateResult<()>;

    /// Replace a policy's status
    async fn set_policy_status(&self, id: &PolicyId, status: PolicyStatus) -> StateResult<()>;

    /// Load backend credentials referenced by a policy
    async fn get_credentials(&self, reference: &ObjectRef) -> StateResult<Option<Credentials>>;

    /// Load an orchestration rule source
    async fn get_rule_source(&self, reference: &ObjectRef) -> StateResult<Option<RuleSource>>;
}
