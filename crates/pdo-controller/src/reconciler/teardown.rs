//! Teardown of a workload that is leaving the policy

use pdo_types::{naming, ServiceId, ServiceRecord, Workload};
use tracing::{debug, info, instrument, warn};

use super::Pass;
use crate::error::WorkloadError;
use crate::finalizer;

impl Pass<'_> {
    /// Delete the backend service and every derived object, then release
    /// the finalizer. The finalizer stays in place until all of that has
    /// succeeded, except for derived-object cleanup which is best-effort.
    #[instrument(skip_all, fields(workload_id = %workload.id))]
    pub(super) async fn teardown(&self, workload: &mut Workload) -> Result<(), WorkloadError> {
        if !workload.has_finalizer(&self.finalizer) {
            return Ok(());
        }

        let key = naming::config_name(&self.policy.service_prefix, &workload.id);
        match self.records.load(&workload.namespace, &key).await? {
            Some(record) => self.delete_service(workload, &key, &record).await?,
            None => debug!("No service record, skipping backend delete"),
        }

        self.cleanup_objects(workload).await;

        finalizer::remove_finalizer(self.resources, workload, &self.finalizer)
            .await
            .map_err(|source| WorkloadError::Finalizer {
                finalizer: self.finalizer.clone(),
                source,
            })?;
        info!("Teardown complete");
        Ok(())
    }

    /// Delete the backend service if it still exists, then the record
    async fn delete_service(
        &self,
        workload: &Workload,
        key: &str,
        record: &ServiceRecord,
    ) -> Result<(), WorkloadError> {
        if let Some(service_id) = record.service_id() {
            match self.client.get_service(service_id).await {
                Ok(_) => {
                    if self.teardown.drain_incidents {
                        self.drain_incidents(service_id).await?;
                    }
                    match self.client.delete_service(service_id).await {
                        Ok(()) => info!(service_id = %service_id, "Deleted service"),
                        Err(e) if e.is_not_found() => {
                            debug!(service_id = %service_id, "Service vanished during delete")
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) if e.is_not_found() => {
                    info!(service_id = %service_id, "Service already gone from backend");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.records.delete(&workload.namespace, key).await?;
        Ok(())
    }

    /// Resolve open incidents until none remain, bounded by the configured
    /// number of attempts
    async fn drain_incidents(&self, service_id: &ServiceId) -> Result<(), WorkloadError> {
        let max_attempts = self.teardown.drain_max_attempts;
        let mut attempts = 0;

        loop {
            let open = self.client.list_open_incidents(service_id).await?;
            if open.is_empty() {
                return Ok(());
            }
            if attempts >= max_attempts {
                return Err(WorkloadError::IncidentsPending {
                    service_id: service_id.clone(),
                    remaining: open.len(),
                    attempts,
                });
            }
            attempts += 1;

            debug!(
                service_id = %service_id,
                open = open.len(),
                attempt = attempts,
                "Resolving open incidents"
            );
            for incident in &open {
                self.client.resolve_incident(incident).await?;
            }
            tokio::time::sleep(self.teardown.drain_delay()).await;
        }
    }

    /// Best-effort removal of the managed secret and distribution object
    async fn cleanup_objects(&self, workload: &Workload) {
        let prefix = &self.policy.service_prefix;

        let secret = naming::secret_name(prefix, &workload.id);
        if let Err(e) = self.objects.delete_secret(&workload.namespace, &secret).await {
            warn!(secret = %secret, error = %e, "Failed to delete managed secret");
        }

        let distribution = naming::distribution_name(prefix, &workload.id);
        if let Err(e) = self
            .objects
            .delete_distribution(&workload.namespace, &distribution)
            .await
        {
            warn!(
                distribution = %distribution,
                error = %e,
                "Failed to delete distribution object"
            );
        }
    }
}
