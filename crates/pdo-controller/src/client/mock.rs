//! Recording backend for tests and local development

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pdo_types::{AlertGroupingSpec, Credentials, ServiceId};

use super::*;

/// A call observed by the mock, in order
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub op: ServiceOp,
    pub service_id: Option<ServiceId>,
}

/// Backend-side state of one mock service
#[derive(Debug, Clone, PartialEq)]
pub struct MockService {
    pub params: ServiceParams,
    pub enabled: bool,
    pub escalation_policy_id: String,
    pub alert_grouping: Option<AlertGroupingSpec>,
    pub orchestration_enabled: bool,
    pub rules: Option<serde_json::Value>,
    pub key_generation: u32,
    pub open_incidents: Vec<IncidentId>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    services: HashMap<ServiceId, MockService>,
    calls: Vec<ServiceCall>,
    failing: HashSet<ServiceOp>,
    sticky_incidents: bool,
    latency: Option<Duration>,
}

/// In-memory incident backend that records every call
#[derive(Debug, Default)]
pub struct MockServiceClient {
    state: Mutex<MockState>,
}

impl MockServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with an API error
    pub fn fail_on(&self, op: ServiceOp) {
        self.state.lock().failing.insert(op);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Delay every call, e.g. to exercise deadlines
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().latency = latency;
    }

    /// Resolved incidents stay open
    pub fn set_sticky_incidents(&self, sticky: bool) {
        self.state.lock().sticky_incidents = sticky;
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, op: ServiceOp) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn service(&self, id: &ServiceId) -> Option<MockService> {
        self.state.lock().services.get(id).cloned()
    }

    pub fn service_count(&self) -> usize {
        self.state.lock().services.len()
    }

    /// Delete a service behind the controller's back
    pub fn remove_service(&self, id: &ServiceId) -> bool {
        self.state.lock().services.remove(id).is_some()
    }

    /// Issue a new integration key for a service
    pub fn rotate_key(&self, id: &ServiceId) {
        if let Some(service) = self.state.lock().services.get_mut(id) {
            service.key_generation += 1;
        }
    }

    pub fn add_open_incident(&self, id: &ServiceId, incident: impl Into<String>) {
        if let Some(service) = self.state.lock().services.get_mut(id) {
            service.open_incidents.push(IncidentId(incident.into()));
        }
    }

    /// Record a call and return the injected failure and latency for it
    fn begin(&self, op: ServiceOp, service_id: Option<&ServiceId>) -> (bool, Option<Duration>) {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall {
            op,
            service_id: service_id.cloned(),
        });
        (state.failing.contains(&op), state.latency)
    }

    async fn enter(&self, op: ServiceOp, service_id: Option<&ServiceId>) -> ServiceResult<()> {
        let (fail, latency) = self.begin(op, service_id);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return Err(ServiceError::Api {
                operation: op,
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn with_service<T>(
        &self,
        id: &ServiceId,
        f: impl FnOnce(&mut MockService) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut state = self.state.lock();
        let service = state
            .services
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("service {}", id)))?;
        f(service)
    }
}

#[async_trait]
impl ServiceClient for MockServiceClient {
    async fn create_service(&self, params: &ServiceParams) -> ServiceResult<CreatedService> {
        self.enter(ServiceOp::CreateService, None).await?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let service_id = ServiceId::new(format!("PSVC{}", state.next_id));
        state.services.insert(
            service_id.clone(),
            MockService {
                params: params.clone(),
                enabled: true,
                escalation_policy_id: params.escalation_policy_id.clone(),
                alert_grouping: params.alert_grouping,
                orchestration_enabled: false,
                rules: None,
                key_generation: 0,
                open_incidents: Vec::new(),
            },
        );
        Ok(CreatedService {
            integration_id: Some(format!("PINT{}", state.next_id)),
            service_id,
        })
    }

    async fn get_service(&self, id: &ServiceId) -> ServiceResult<RemoteService> {
        self.enter(ServiceOp::GetService, Some(id)).await?;
        self.with_service(id, |service| {
            Ok(RemoteService {
                id: id.clone(),
                name: service.params.name.clone(),
                enabled: service.enabled,
                escalation_policy_id: service.escalation_policy_id.clone(),
            })
        })
    }

    async fn delete_service(&self, id: &ServiceId) -> ServiceResult<()> {
        self.enter(ServiceOp::DeleteService, Some(id)).await?;
        match self.state.lock().services.remove(id) {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(format!("service {}", id))),
        }
    }

    async fn enable_service(&self, id: &ServiceId) -> ServiceResult<()> {
        self.enter(ServiceOp::EnableService, Some(id)).await?;
        self.with_service(id, |service| {
            service.enabled = true;
            Ok(())
        })
    }

    async fn disable_service(&self, id: &ServiceId) -> ServiceResult<()> {
        self.enter(ServiceOp::DisableService, Some(id)).await?;
        self.with_service(id, |service| {
            service.enabled = false;
            Ok(())
        })
    }

    async fn get_integration_key(&self, id: &ServiceId) -> ServiceResult<IntegrationKey> {
        self.enter(ServiceOp::GetIntegrationKey, Some(id)).await?;
        self.with_service(id, |service| {
            Ok(IntegrationKey {
                integration_id: format!("{}-events", id),
                key: format!("key-{}-{}", id, service.key_generation),
            })
        })
    }

    async fn update_escalation_policy(
        &self,
        id: &ServiceId,
        escalation_policy_id: &str,
    ) -> ServiceResult<()> {
        self.enter(ServiceOp::UpdateEscalationPolicy, Some(id))
            .await?;
        self.with_service(id, |service| {
            service.escalation_policy_id = escalation_policy_id.to_string();
            Ok(())
        })
    }

    async fn update_alert_grouping(
        &self,
        id: &ServiceId,
        grouping: AlertGroupingSpec,
    ) -> ServiceResult<()> {
        self.enter(ServiceOp::UpdateAlertGrouping, Some(id)).await?;
        self.with_service(id, |service| {
            service.alert_grouping = Some(grouping);
            Ok(())
        })
    }

    async fn toggle_service_orchestration(
        &self,
        id: &ServiceId,
        enabled: bool,
    ) -> ServiceResult<()> {
        self.enter(ServiceOp::ToggleServiceOrchestration, Some(id))
            .await?;
        self.with_service(id, |service| {
            service.orchestration_enabled = enabled;
            Ok(())
        })
    }

    async fn apply_service_orchestration_rule(
        &self,
        id: &ServiceId,
        rules: &serde_json::Value,
    ) -> ServiceResult<()> {
        self.enter(ServiceOp::ApplyServiceOrchestrationRule, Some(id))
            .await?;
        self.with_service(id, |service| {
            if !service.orchestration_enabled {
                return Err(ServiceError::Api {
                    operation: ServiceOp::ApplyServiceOrchestrationRule,
                    status: 400,
                    message: "orchestration is not enabled on this service".to_string(),
                });
            }
            service.rules = Some(rules.clone());
            Ok(())
        })
    }

    async fn list_open_incidents(&self, id: &ServiceId) -> ServiceResult<Vec<IncidentId>> {
        self.enter(ServiceOp::ListOpenIncidents, Some(id)).await?;
        self.with_service(id, |service| Ok(service.open_incidents.clone()))
    }

    async fn resolve_incident(&self, incident: &IncidentId) -> ServiceResult<()> {
        self.enter(ServiceOp::ResolveIncident, None).await?;
        let mut state = self.state.lock();
        if state.sticky_incidents {
            return Ok(());
        }
        for service in state.services.values_mut() {
            service.open_incidents.retain(|i| i != incident);
        }
        Ok(())
    }
}

/// Factory handing out one shared mock client for any credentials
pub struct MockClientFactory {
    client: Arc<MockServiceClient>,
    reject: Mutex<bool>,
}

impl MockClientFactory {
    pub fn new(client: Arc<MockServiceClient>) -> Self {
        Self {
            client,
            reject: Mutex::new(false),
        }
    }

    /// Reject all credentials from now on
    pub fn set_reject(&self, reject: bool) {
        *self.reject.lock() = reject;
    }
}

impl ServiceClientFactory for MockClientFactory {
    fn connect(&self, credentials: &Credentials) -> ServiceResult<Arc<dyn ServiceClient>> {
        if *self.reject.lock() || credentials.api_key.is_empty() {
            return Err(ServiceError::Unauthorized("credentials rejected".to_string()));
        }
        Ok(self.client.clone())
    }
}
