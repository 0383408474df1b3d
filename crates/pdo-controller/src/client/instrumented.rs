//! Per-call deadline and metrics around a backend client

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pdo_types::{AlertGroupingSpec, ServiceId};

use super::*;
use crate::metrics::ReconcileMetrics;

/// Wraps a client so every call is bounded by a deadline and counted.
///
/// Reconcile passes are never cancelled as a whole; the deadline is the only
/// bound on how long a single backend call can hold a pass.
pub struct InstrumentedServiceClient {
    inner: Arc<dyn ServiceClient>,
    timeout: Duration,
    metrics: Arc<dyn ReconcileMetrics>,
}

impl InstrumentedServiceClient {
    pub fn new(
        inner: Arc<dyn ServiceClient>,
        timeout: Duration,
        metrics: Arc<dyn ReconcileMetrics>,
    ) -> Self {
        Self {
            inner,
            timeout,
            metrics,
        }
    }

    async fn call<T, F>(&self, operation: ServiceOp, fut: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>> + Send,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                operation,
                after: self.timeout,
            }),
        };
        // NotFound is an expected answer, not a failed call
        let success = match &result {
            Ok(_) => true,
            Err(e) => e.is_not_found(),
        };
        self.metrics.record_service_call(operation, success);
        result
    }
}

#[async_trait]
impl ServiceClient for InstrumentedServiceClient {
    async fn create_service(&self, params: &ServiceParams) -> ServiceResult<CreatedService> {
        self.call(ServiceOp::CreateService, self.inner.create_service(params))
            .await
    }

    async fn get_service(&self, id: &ServiceId) -> ServiceResult<RemoteService> {
        self.call(ServiceOp::GetService, self.inner.get_service(id))
            .await
    }

    async fn delete_service(&self, id: &ServiceId) -> ServiceResult<()> {
        self.call(ServiceOp::DeleteService, self.inner.delete_service(id))
            .await
    }

    async fn enable_service(&self, id: &ServiceId) -> ServiceResult<()> {
        self.call(ServiceOp::EnableService, self.inner.enable_service(id))
            .await
    }

    async fn disable_service(&self, id: &ServiceId) -> ServiceResult<()> {
        self.call(ServiceOp::DisableService, self.inner.disable_service(id))
            .await
    }

    async fn get_integration_key(&self, id: &ServiceId) -> ServiceResult<IntegrationKey> {
        self.call(
            ServiceOp::GetIntegrationKey,
            self.inner.get_integration_key(id),
        )
        .await
    }

    async fn update_escalation_policy(
        &self,
        id: &ServiceId,
        escalation_policy_id: &str,
    ) -> ServiceResult<()> {
        self.call(
            ServiceOp::UpdateEscalationPolicy,
            self.inner.update_escalation_policy(id, escalation_policy_id),
        )
        .await
    }

    async fn update_alert_grouping(
        &self,
        id: &ServiceId,
        grouping: AlertGroupingSpec,
    ) -> ServiceResult<()> {
        self.call(
            ServiceOp::UpdateAlertGrouping,
            self.inner.update_alert_grouping(id, grouping),
        )
        .await
    }

    async fn toggle_service_orchestration(
        &self,
        id: &ServiceId,
        enabled: bool,
    ) -> ServiceResult<()> {
        self.call(
            ServiceOp::ToggleServiceOrchestration,
            self.inner.toggle_service_orchestration(id, enabled),
        )
        .await
    }

    async fn apply_service_orchestration_rule(
        &self,
        id: &ServiceId,
        rules: &serde_json::Value,
    ) -> ServiceResult<()> {
        self.call(
            ServiceOp::ApplyServiceOrchestrationRule,
            self.inner.apply_service_orchestration_rule(id, rules),
        )
        .await
    }

    async fn list_open_incidents(&self, id: &ServiceId) -> ServiceResult<Vec<IncidentId>> {
        self.call(
            ServiceOp::ListOpenIncidents,
            self.inner.list_open_incidents(id),
        )
        .await
    }

    async fn resolve_incident(&self, incident: &IncidentId) -> ServiceResult<()> {
        self.call(
            ServiceOp::ResolveIncident,
            self.inner.resolve_incident(incident),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockServiceClient;
    use crate::metrics::PrometheusMetrics;
    use prometheus::Registry;

    fn params() -> ServiceParams {
        ServiceParams {
            name: "osd-c1".into(),
            description: String::new(),
            escalation_policy_id: "EP1".into(),
            resolve_timeout_seconds: 0,
            acknowledge_timeout_seconds: 0,
            alert_grouping: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let mock = Arc::new(MockServiceClient::new());
        mock.set_latency(Some(Duration::from_secs(60)));
        let registry = Registry::new();
        let metrics = Arc::new(PrometheusMetrics::new(&registry).unwrap());
        let client =
            InstrumentedServiceClient::new(mock.clone(), Duration::from_secs(5), metrics.clone());

        let err = client.create_service(&params()).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Timeout {
                operation: ServiceOp::CreateService,
                ..
            }
        ));
        assert_eq!(metrics.service_calls("create_service", "failure"), 1);
    }

    #[tokio::test]
    async fn test_not_found_counts_as_success() {
        let mock = Arc::new(MockServiceClient::new());
        let registry = Registry::new();
        let metrics = Arc::new(PrometheusMetrics::new(&registry).unwrap());
        let client =
            InstrumentedServiceClient::new(mock, Duration::from_secs(5), metrics.clone());

        let err = client
            .get_service(&ServiceId::new("missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(metrics.service_calls("get_service", "success"), 1);
    }
}
