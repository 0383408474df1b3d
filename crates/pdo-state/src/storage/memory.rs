//! In-memory storage implementations
//!
//! Used for development and tests. The resource store mimics the
//! finalizer-gated deletion of a real object store: an object whose deletion
//! was requested disappears once its last finalizer is removed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pdo_types::{
    Credentials, DistributionObject, ManagedSecret, ObjectRef, Policy, PolicyId, PolicyStatus,
    RuleSource, ServiceRecord, Workload, WorkloadId,
};
use tokio::sync::RwLock;

use super::traits::*;
use crate::codec;
use crate::error::{StateError, StateResult};

type ObjectKey = (String, String);

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

/// In-memory record store keeping records in their flat wire form
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    records: Arc<RwLock<HashMap<ObjectKey, BTreeMap<String, String>>>>,
    fail_writes: AtomicBool,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored data, as another controller would see it
    pub async fn raw(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
        self.records.read().await.get(&key(namespace, name)).cloned()
    }

    /// Seed raw data, e.g. a record written by an older release
    pub async fn insert_raw(&self, namespace: &str, name: &str, data: BTreeMap<String, String>) {
        self.records.write().await.insert(key(namespace, name), data);
    }

    /// Make every subsequent save and delete fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StateResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StateError::Connection("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, namespace: &str, name: &str) -> StateResult<Option<ServiceRecord>> {
        let records = self.records.read().await;
        records
            .get(&key(namespace, name))
            .map(codec::decode)
            .transpose()
    }

    async fn save(&self, namespace: &str, name: &str, record: &ServiceRecord) -> StateResult<()> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        records.insert(key(namespace, name), codec::encode(record));
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> StateResult<bool> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        Ok(records.remove(&key(namespace, name)).is_some())
    }
}

/// In-memory store for managed secrets and distribution objects
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    secrets: Arc<RwLock<HashMap<ObjectKey, ManagedSecret>>>,
    distributions: Arc<RwLock<HashMap<ObjectKey, DistributionObject>>>,
    fail_deletes: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delete fail
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn secret_count(&self) -> usize {
        self.secrets.read().await.len()
    }

    pub async fn distribution_count(&self) -> usize {
        self.distributions.read().await.len()
    }

    fn check_deletable(&self) -> StateResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StateError::Connection("simulated delete failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ManagedObjectStore for InMemoryObjectStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> StateResult<Option<ManagedSecret>> {
        let secrets = self.secrets.read().await;
        Ok(secrets.get(&key(namespace, name)).cloned())
    }

    async fn create_secret(&self, secret: ManagedSecret) -> StateResult<()> {
        let mut secrets = self.secrets.write().await;
        let k = key(&secret.namespace, &secret.name);
        if secrets.contains_key(&k) {
            return Err(StateError::Conflict(format!("secret {}/{}", k.0, k.1)));
        }
        secrets.insert(k, secret);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> StateResult<bool> {
        self.check_deletable()?;
        let mut secrets = self.secrets.write().await;
        Ok(secrets.remove(&key(namespace, name)).is_some())
    }

    async fn get_distribution(
        &self,
        namespace: &str,
        name: &str,
    ) -> StateResult<Option<DistributionObject>> {
        let distributions = self.distributions.read().await;
        Ok(distributions.get(&key(namespace, name)).cloned())
    }

    async fn create_distribution(&self, object: DistributionObject) -> StateResult<()> {
        let mut distributions = self.distributions.write().await;
        let k = key(&object.namespace, &object.name);
        if distributions.contains_key(&k) {
            return Err(StateError::Conflict(format!("distribution {}/{}", k.0, k.1)));
        }
        distributions.insert(k, object);
        Ok(())
    }

    async fn delete_distribution(&self, namespace: &str, name: &str) -> StateResult<bool> {
        self.check_deletable()?;
        let mut distributions = self.distributions.write().await;
        Ok(distributions.remove(&key(namespace, name)).is_some())
    }
}

/// In-memory resource store
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    policies: Arc<RwLock<HashMap<PolicyId, Policy>>>,
    workloads: Arc<RwLock<BTreeMap<WorkloadId, Workload>>>,
    credentials: Arc<RwLock<HashMap<ObjectRef, Credentials>>>,
    rule_sources: Arc<RwLock<HashMap<ObjectRef, RuleSource>>>,
    fail_finalizer_updates: AtomicBool,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_policy(&self, policy: Policy) {
        self.policies.write().await.insert(policy.id.clone(), policy);
    }

    pub async fn policy(&self, id: &PolicyId) -> Option<Policy> {
        self.policies.read().await.get(id).cloned()
    }

    pub async fn upsert_workload(&self, workload: Workload) {
        self.workloads
            .write()
            .await
            .insert(workload.id.clone(), workload);
    }

    pub async fn workload(&self, id: &WorkloadId) -> Option<Workload> {
        self.workloads.read().await.get(id).cloned()
    }

    pub async fn insert_credentials(&self, reference: ObjectRef, credentials: Credentials) {
        self.credentials.write().await.insert(reference, credentials);
    }

    pub async fn remove_credentials(&self, reference: &ObjectRef) {
        self.credentials.write().await.remove(reference);
    }

    pub async fn insert_rule_source(&self, source: RuleSource) {
        self.rule_sources
            .write()
            .await
            .insert(source.reference.clone(), source);
    }

    /// Make every subsequent finalizer write fail
    pub fn set_fail_finalizer_updates(&self, fail: bool) {
        self.fail_finalizer_updates.store(fail, Ordering::SeqCst);
    }

    fn check_finalizer_writable(&self) -> StateResult<()> {
        if self.fail_finalizer_updates.load(Ordering::SeqCst) {
            return Err(StateError::Connection(
                "simulated finalizer update failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get_policy(&self, id: &PolicyId) -> StateResult<Option<Policy>> {
        Ok(self.policies.read().await.get(id).cloned())
    }

    async fn list_workloads(&self) -> StateResult<Vec<Workload>> {
        Ok(self.workloads.read().await.values().cloned().collect())
    }

    async fn set_workload_finalizers(
        &self,
        id: &WorkloadId,
        finalizers: BTreeSet<String>,
    ) -> StateResult<()> {
        self.check_finalizer_writable()?;
        let mut workloads = self.workloads.write().await;
        let workload = workloads
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(format!("workload {}", id)))?;
        workload.finalizers = finalizers;
        if workload.deletion_requested && workload.finalizers.is_empty() {
            workloads.remove(id);
        }
        Ok(())
    }

    async fn set_policy_finalizers(
        &self,
        id: &PolicyId,
        finalizers: BTreeSet<String>,
    ) -> StateResult<()> {
        self.check_finalizer_writable()?;
        let mut policies = self.policies.write().await;
        let policy = policies
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(format!("policy {}", id)))?;
        policy.finalizers = finalizers;
        if policy.deletion_requested && policy.finalizers.is_empty() {
            policies.remove(id);
        }
        Ok(())
    }

    async fn set_policy_status(&self, id: &PolicyId, status: PolicyStatus) -> StateResult<()> {
        let mut policies = self.policies.write().await;
        let policy = policies
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(format!("policy {}", id)))?;
        policy.status = status;
        Ok(())
    }

    async fn get_credentials(&self, reference: &ObjectRef) -> StateResult<Option<Credentials>> {
        Ok(self.credentials.read().await.get(reference).cloned())
    }

    async fn get_rule_source(&self, reference: &ObjectRef) -> StateResult<Option<RuleSource>> {
        Ok(self.rule_sources.read().await.get(reference).cloned())
    }
}
