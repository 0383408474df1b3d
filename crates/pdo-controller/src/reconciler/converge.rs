//! Converge a selected workload: existence first, then the toggle axes

use pdo_types::{naming, DistributionObject, ManagedSecret, ServiceId, ServiceRecord, Workload};
use tracing::{debug, info, instrument, warn};

use super::Pass;
use crate::client::ServiceParams;
use crate::error::WorkloadError;
use crate::finalizer;
use crate::lifecycle::{
    apply_transition, enable_transition, escalation_transition, hibernation_transition,
    limited_support_transition, orchestration_gate, ExistencePlan, ServiceAction, Transition,
};

impl Pass<'_> {
    #[instrument(skip_all, fields(workload_id = %workload.id))]
    pub(super) async fn converge(&self, workload: &mut Workload) -> Result<(), WorkloadError> {
        if !workload.installed {
            debug!("Workload not installed yet");
            return Ok(());
        }

        // Must be durable before anything exists in the backend
        finalizer::add_finalizer(self.resources, workload, &self.finalizer).await?;

        let key = naming::config_name(&self.policy.service_prefix, &workload.id);
        let loaded = self.records.load(&workload.namespace, &key).await?;

        let mut record = match ExistencePlan::for_workload(workload, loaded.as_ref()) {
            ExistencePlan::Defer => return Ok(()),
            ExistencePlan::Create => self.create_service(workload, &key).await?,
            ExistencePlan::Refresh => loaded.unwrap_or_default(),
        };
        let Some(service_id) = record.service_id().cloned() else {
            return Ok(());
        };

        let integration = self.client.get_integration_key(&service_id).await?;
        self.sync_secret(workload, &integration.key).await?;
        self.ensure_distribution(workload).await?;

        record.integration_id = Some(integration.integration_id);
        self.records.save(&workload.namespace, &key, &record).await?;

        if let Some(t) = escalation_transition(self.policy, &record) {
            record = self.execute(workload, &key, &service_id, &record, t).await?;
        }
        if let Some(t) = hibernation_transition(workload, &record) {
            record = self.execute(workload, &key, &service_id, &record, t).await?;
        }
        if let Some(t) = limited_support_transition(workload, &record) {
            record = self.execute(workload, &key, &service_id, &record, t).await?;
        }
        self.converge_orchestration(workload, &key, &service_id, record)
            .await?;

        Ok(())
    }

    /// Create the backend service and persist its id straight away, so a
    /// crash after this point never leads to a second create
    async fn create_service(
        &self,
        workload: &Workload,
        key: &str,
    ) -> Result<ServiceRecord, WorkloadError> {
        let params = ServiceParams::for_workload(self.policy, workload);
        let created = self.client.create_service(&params).await?;
        info!(
            service_id = %created.service_id,
            service_name = %params.name,
            "Created service"
        );

        let record = ServiceRecord::created(
            created.service_id,
            created.integration_id,
            params.escalation_policy_id,
        );
        self.records.save(&workload.namespace, key, &record).await?;

        if let (Some(grouping), Some(service_id)) =
            (self.policy.alert_grouping, record.service_id())
        {
            self.client
                .update_alert_grouping(service_id, grouping)
                .await?;
        }

        Ok(record)
    }

    /// Keep the managed secret in step with the integration key. A changed
    /// key replaces the secret instead of editing it.
    async fn sync_secret(&self, workload: &Workload, key: &str) -> Result<(), WorkloadError> {
        let name = naming::secret_name(&self.policy.service_prefix, &workload.id);

        match self.objects.get_secret(&workload.namespace, &name).await? {
            Some(existing) if existing.integration_key == key => return Ok(()),
            Some(_) => {
                info!(secret = %name, "Integration key changed, replacing secret");
                self.objects
                    .delete_secret(&workload.namespace, &name)
                    .await?;
            }
            None => {}
        }

        self.objects
            .create_secret(ManagedSecret {
                name,
                namespace: workload.namespace.clone(),
                owner: workload.id.clone(),
                policy: self.policy.id.clone(),
                integration_key: key.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Create the distribution object if missing; an existing one is left alone
    async fn ensure_distribution(&self, workload: &Workload) -> Result<(), WorkloadError> {
        let name = naming::distribution_name(&self.policy.service_prefix, &workload.id);
        if self
            .objects
            .get_distribution(&workload.namespace, &name)
            .await?
            .is_some()
        {
            return Ok(());
        }

        self.objects
            .create_distribution(DistributionObject {
                name,
                namespace: workload.namespace.clone(),
                owner: workload.id.clone(),
                policy: self.policy.id.clone(),
                secret_name: naming::secret_name(&self.policy.service_prefix, &workload.id),
                target_secret: self.policy.target_secret_ref.clone(),
            })
            .await?;
        Ok(())
    }

    async fn converge_orchestration(
        &self,
        workload: &Workload,
        key: &str,
        service_id: &ServiceId,
        mut record: ServiceRecord,
    ) -> Result<(), WorkloadError> {
        let Some(source_ref) = orchestration_gate(self.policy, workload, &record) else {
            return Ok(());
        };

        if let Some(t) = enable_transition(&record) {
            record = self.execute(workload, key, service_id, &record, t).await?;
        }

        let Some(source) = self.resources.get_rule_source(source_ref).await? else {
            warn!(rule_source = %source_ref, "Orchestration rule source not found");
            self.metrics.record_rule_source_missing(&self.policy.id);
            return Ok(());
        };

        if let Some(t) = apply_transition(self.policy, &record, &source)? {
            self.execute(workload, key, service_id, &record, t).await?;
        }
        Ok(())
    }

    /// Run a transition's backend call, then persist its record. Nothing is
    /// saved when the call fails.
    async fn execute(
        &self,
        workload: &Workload,
        key: &str,
        service_id: &ServiceId,
        current: &ServiceRecord,
        transition: Transition,
    ) -> Result<ServiceRecord, WorkloadError> {
        match &transition.action {
            ServiceAction::Enable => self.client.enable_service(service_id).await?,
            ServiceAction::Disable => self.client.disable_service(service_id).await?,
            ServiceAction::UpdateEscalationPolicy(escalation_policy_id) => {
                self.client
                    .update_escalation_policy(service_id, escalation_policy_id)
                    .await?
            }
            ServiceAction::ToggleOrchestration(enabled) => {
                self.client
                    .toggle_service_orchestration(service_id, *enabled)
                    .await?
            }
            ServiceAction::ApplyOrchestrationRules(rules) => {
                self.client
                    .apply_service_orchestration_rule(service_id, rules)
                    .await?
            }
        }

        if transition.next != *current {
            self.records
                .save(&workload.namespace, key, &transition.next)
                .await?;
        }
        debug!(service_id = %service_id, action = ?transition.action, "Applied transition");
        Ok(transition.next)
    }
}
