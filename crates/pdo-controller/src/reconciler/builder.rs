//! Builder for wiring a [`Reconciler`] to its capabilities

use std::sync::Arc;

use pdo_state::{ManagedObjectStore, ResourceStore, StateStore};
use thiserror::Error;

use super::Reconciler;
use crate::client::ServiceClientFactory;
use crate::config::ControllerConfig;
use crate::metrics::{NoopMetrics, ReconcileMetrics};
use crate::retry::RetryPolicy;

/// Reconciler could not be assembled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{0} required")]
    MissingDependency(&'static str),
}

/// Builder for [`Reconciler`]. Every store and the client factory are
/// required; metrics default to [`NoopMetrics`].
pub struct ReconcilerBuilder {
    config: ControllerConfig,
    resources: Option<Arc<dyn ResourceStore>>,
    records: Option<Arc<dyn StateStore>>,
    objects: Option<Arc<dyn ManagedObjectStore>>,
    clients: Option<Arc<dyn ServiceClientFactory>>,
    metrics: Option<Arc<dyn ReconcileMetrics>>,
}

impl ReconcilerBuilder {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            resources: None,
            records: None,
            objects: None,
            clients: None,
            metrics: None,
        }
    }

    pub fn with_resource_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.resources = Some(store);
        self
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.records = Some(store);
        self
    }

    pub fn with_object_store(mut self, store: Arc<dyn ManagedObjectStore>) -> Self {
        self.objects = Some(store);
        self
    }

    pub fn with_client_factory(mut self, factory: Arc<dyn ServiceClientFactory>) -> Self {
        self.clients = Some(factory);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ReconcileMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<Reconciler, BuildError> {
        let resources = self
            .resources
            .ok_or(BuildError::MissingDependency("resource_store"))?;
        let records = self
            .records
            .ok_or(BuildError::MissingDependency("state_store"))?;
        let objects = self
            .objects
            .ok_or(BuildError::MissingDependency("object_store"))?;
        let clients = self
            .clients
            .ok_or(BuildError::MissingDependency("client_factory"))?;
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics));

        Ok(Reconciler {
            retry: RetryPolicy::from_config(&self.config.retry),
            resources,
            records,
            objects,
            clients,
            metrics,
            config: self.config,
        })
    }
}
