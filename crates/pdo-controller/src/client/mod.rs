//! Incident backend capability
//!
//! The wire-level client lives outside this crate. The controller only sees
//! the [`ServiceClient`] trait, obtained per pass from a
//! [`ServiceClientFactory`] once credentials have been loaded.

mod instrumented;
mod mock;

pub use instrumented::InstrumentedServiceClient;
pub use mock::{MockClientFactory, MockService, MockServiceClient, ServiceCall};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pdo_types::{AlertGroupingSpec, Credentials, Policy, ServiceId, Workload};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend operations, used for error context and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceOp {
    CreateService,
    GetService,
    DeleteService,
    EnableService,
    DisableService,
    GetIntegrationKey,
    UpdateEscalationPolicy,
    UpdateAlertGrouping,
    ToggleServiceOrchestration,
    ApplyServiceOrchestrationRule,
    ListOpenIncidents,
    ResolveIncident,
}

impl ServiceOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceOp::CreateService => "create_service",
            ServiceOp::GetService => "get_service",
            ServiceOp::DeleteService => "delete_service",
            ServiceOp::EnableService => "enable_service",
            ServiceOp::DisableService => "disable_service",
            ServiceOp::GetIntegrationKey => "get_integration_key",
            ServiceOp::UpdateEscalationPolicy => "update_escalation_policy",
            ServiceOp::UpdateAlertGrouping => "update_alert_grouping",
            ServiceOp::ToggleServiceOrchestration => "toggle_service_orchestration",
            ServiceOp::ApplyServiceOrchestrationRule => "apply_service_orchestration_rule",
            ServiceOp::ListOpenIncidents => "list_open_incidents",
            ServiceOp::ResolveIncident => "resolve_incident",
        }
    }
}

impl fmt::Display for ServiceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Object does not exist in the backend
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials were rejected
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Backend returned an error response
    #[error("{operation} failed with status {status}: {message}")]
    Api {
        operation: ServiceOp,
        status: u16,
        message: String,
    },

    /// Call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: ServiceOp, after: Duration },

    /// Backend could not be reached
    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

/// Result type for backend calls
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Parameters for creating a backend service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceParams {
    pub name: String,
    pub description: String,
    pub escalation_policy_id: String,
    pub resolve_timeout_seconds: u32,
    pub acknowledge_timeout_seconds: u32,
    pub alert_grouping: Option<AlertGroupingSpec>,
}

impl ServiceParams {
    /// Parameters for the service a policy provisions for one workload
    pub fn for_workload(policy: &Policy, workload: &Workload) -> Self {
        let name = if workload.base_domain.is_empty() {
            format!("{}-{}", policy.service_prefix, workload.id)
        } else {
            format!(
                "{}-{}.{}",
                policy.service_prefix, workload.id, workload.base_domain
            )
        };
        Self {
            name,
            description: format!("{} (policy {})", workload.id, policy.id),
            escalation_policy_id: policy.escalation_policy_id.clone(),
            resolve_timeout_seconds: policy.resolve_timeout_seconds,
            acknowledge_timeout_seconds: policy.acknowledge_timeout_seconds,
            alert_grouping: policy.alert_grouping,
        }
    }
}

/// Service returned by a successful create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedService {
    pub service_id: ServiceId,
    pub integration_id: Option<String>,
}

/// Service as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteService {
    pub id: ServiceId,
    pub name: String,
    pub enabled: bool,
    pub escalation_policy_id: String,
}

/// Integration key of a service's event integration
#[derive(Clone, PartialEq, Eq)]
pub struct IntegrationKey {
    pub integration_id: String,
    pub key: String,
}

impl fmt::Debug for IntegrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationKey")
            .field("integration_id", &self.integration_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Open incident on a service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncidentId(pub String);

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incident-management backend operations
#[async_trait]
pub trait ServiceClient: Send + Sync {
    async fn create_service(&self, params: &ServiceParams) -> ServiceResult<CreatedService>;

    /// Fails with [`ServiceError::NotFound`] once the service is gone
    async fn get_service(&self, id: &ServiceId) -> ServiceResult<RemoteService>;

    async fn delete_service(&self, id: &ServiceId) -> ServiceResult<()>;

    async fn enable_service(&self, id: &ServiceId) -> ServiceResult<()>;

    async fn disable_service(&self, id: &ServiceId) -> ServiceResult<()>;

    async fn get_integration_key(&self, id: &ServiceId) -> ServiceResult<IntegrationKey>;

    async fn update_escalation_policy(
        &self,
        id: &ServiceId,
        escalation_policy_id: &str,
    ) -> ServiceResult<()>;

    async fn update_alert_grouping(
        &self,
        id: &ServiceId,
        grouping: AlertGroupingSpec,
    ) -> ServiceResult<()>;

    async fn toggle_service_orchestration(&self, id: &ServiceId, enabled: bool)
        -> ServiceResult<()>;

    async fn apply_service_orchestration_rule(
        &self,
        id: &ServiceId,
        rules: &serde_json::Value,
    ) -> ServiceResult<()>;

    async fn list_open_incidents(&self, id: &ServiceId) -> ServiceResult<Vec<IncidentId>>;

    async fn resolve_incident(&self, incident: &IncidentId) -> ServiceResult<()>;
}

/// Builds a client for a set of credentials
pub trait ServiceClientFactory: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> ServiceResult<Arc<dyn ServiceClient>>;
}
