//! Shared harness for reconcile scenario tests

#![allow(dead_code)]

use std::sync::Arc;

use pdo_controller::client::{MockClientFactory, MockServiceClient};
use pdo_controller::{
    ControllerConfig, PrometheusMetrics, ReconcileAction, ReconcileError, Reconciler,
    ReconcilerBuilder,
};
use pdo_state::{
    InMemoryObjectStore, InMemoryResourceStore, InMemoryStateStore, ManagedObjectStore,
    StateStore,
};
use pdo_types::{
    naming, Credentials, LabelSelector, ManagedSecret, ObjectRef, Policy, PolicyId,
    ServiceRecord, Workload, WorkloadId,
};
use prometheus::Registry;

pub const POLICY: &str = "prod-alerts";

pub fn credentials_ref() -> ObjectRef {
    ObjectRef::new("ops", "pd-api-key")
}

/// `P{env=prod}` with credentials and a target secret
pub fn prod_policy() -> Policy {
    policy_named(POLICY)
}

pub fn policy_named(id: &str) -> Policy {
    Policy::new(id, LabelSelector::new().with_label("env", "prod"), "EP1")
        .with_credentials(credentials_ref())
        .with_target_secret(ObjectRef::new("monitoring", "pd-integration"))
}

/// `W{env=prod, installed}` in its own namespace
pub fn prod_workload(id: &str) -> Workload {
    Workload::new(id, format!("ns-{}", id))
        .with_label("env", "prod")
        .installed()
}

pub struct Harness {
    pub resources: Arc<InMemoryResourceStore>,
    pub records: Arc<InMemoryStateStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub client: Arc<MockServiceClient>,
    pub factory: Arc<MockClientFactory>,
    pub metrics: Arc<PrometheusMetrics>,
    pub reconciler: Reconciler,
    policy_id: PolicyId,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(ControllerConfig::default()).await
    }

    pub async fn with_config(config: ControllerConfig) -> Self {
        Self::with_policy(config, prod_policy()).await
    }

    pub async fn with_policy(config: ControllerConfig, policy: Policy) -> Self {
        let resources = Arc::new(InMemoryResourceStore::new());
        let records = Arc::new(InMemoryStateStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let client = Arc::new(MockServiceClient::new());
        let factory = Arc::new(MockClientFactory::new(client.clone()));
        let metrics = Arc::new(PrometheusMetrics::new(&Registry::new()).unwrap());

        let reconciler = ReconcilerBuilder::new(config)
            .with_resource_store(resources.clone())
            .with_state_store(records.clone())
            .with_object_store(objects.clone())
            .with_client_factory(factory.clone())
            .with_metrics(metrics.clone())
            .build()
            .unwrap();

        resources
            .insert_credentials(credentials_ref(), Credentials::new("api-key"))
            .await;
        let policy_id = policy.id.clone();
        resources.upsert_policy(policy).await;

        Self {
            resources,
            records,
            objects,
            client,
            factory,
            metrics,
            reconciler,
            policy_id,
        }
    }

    pub fn policy_id(&self) -> PolicyId {
        self.policy_id.clone()
    }

    pub fn finalizer(&self) -> String {
        naming::workload_finalizer(&self.policy_id())
    }

    pub async fn reconcile(&self) -> Result<ReconcileAction, ReconcileError> {
        self.reconciler.reconcile(&self.policy_id()).await
    }

    pub async fn add_workload(&self, workload: Workload) {
        self.resources.upsert_workload(workload).await;
    }

    pub async fn workload(&self, id: &str) -> Option<Workload> {
        self.resources.workload(&WorkloadId::new(id)).await
    }

    /// Edit the stored workload, keeping whatever finalizers it carries
    pub async fn update_workload(&self, id: &str, edit: impl FnOnce(&mut Workload)) {
        let mut workload = self.workload(id).await.unwrap();
        edit(&mut workload);
        self.resources.upsert_workload(workload).await;
    }

    /// Edit the stored policy, keeping its finalizers and status
    pub async fn update_policy(&self, edit: impl FnOnce(&mut Policy)) {
        let mut policy = self.resources.policy(&self.policy_id()).await.unwrap();
        edit(&mut policy);
        self.resources.upsert_policy(policy).await;
    }

    pub async fn policy(&self) -> Option<Policy> {
        self.resources.policy(&self.policy_id()).await
    }

    pub fn record_key(&self, id: &str) -> String {
        naming::config_name("osd", &WorkloadId::new(id))
    }

    pub async fn record(&self, id: &str) -> Option<ServiceRecord> {
        self.records
            .load(&format!("ns-{}", id), &self.record_key(id))
            .await
            .unwrap()
    }

    pub async fn secret(&self, id: &str) -> Option<ManagedSecret> {
        let name = naming::secret_name("osd", &WorkloadId::new(id));
        self.objects
            .get_secret(&format!("ns-{}", id), &name)
            .await
            .unwrap()
    }

    pub async fn has_distribution(&self, id: &str) -> bool {
        let name = naming::distribution_name("osd", &WorkloadId::new(id));
        self.objects
            .get_distribution(&format!("ns-{}", id), &name)
            .await
            .unwrap()
            .is_some()
    }

    pub async fn has_finalizer(&self, id: &str) -> bool {
        let finalizer = self.finalizer();
        self.workload(id)
            .await
            .is_some_and(|w| w.has_finalizer(&finalizer))
    }
}
