//! Per-policy reconcile loop

mod builder;
mod converge;
mod teardown;

pub use builder::{BuildError, ReconcilerBuilder};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use pdo_state::{ManagedObjectStore, ResourceStore, StateStore};
use pdo_types::naming::LEGACY_FINALIZER;
use pdo_types::{DegradedCondition, DegradedReason, Policy, PolicyId, Workload};
use tracing::{debug, info, instrument, warn};

use crate::client::{InstrumentedServiceClient, ServiceClient, ServiceClientFactory};
use crate::config::{ControllerConfig, TeardownConfig};
use crate::error::{ReconcileError, WorkloadError, WorkloadFailure};
use crate::finalizer::{self, Disposition};
use crate::matcher;
use crate::metrics::{ReconcileMetrics, ReconcileOutcome};
use crate::retry::{ReconcileAction, RetryPolicy};

const DEGRADED_REASONS: [DegradedReason; 3] = [
    DegradedReason::CredentialsUnavailable,
    DegradedReason::InvalidPolicy,
    DegradedReason::ReconcileFailed,
];

/// Drives one policy towards its desired state.
///
/// A reconciler holds no per-policy state and may be shared across worker
/// tasks. The dispatcher must not run two passes for the same policy at once.
pub struct Reconciler {
    resources: Arc<dyn ResourceStore>,
    records: Arc<dyn StateStore>,
    objects: Arc<dyn ManagedObjectStore>,
    clients: Arc<dyn ServiceClientFactory>,
    metrics: Arc<dyn ReconcileMetrics>,
    config: ControllerConfig,
    retry: RetryPolicy,
}

/// Everything a single pass needs to act on one workload
pub(crate) struct Pass<'a> {
    resources: &'a dyn ResourceStore,
    records: &'a dyn StateStore,
    objects: &'a dyn ManagedObjectStore,
    client: &'a dyn ServiceClient,
    metrics: &'a dyn ReconcileMetrics,
    teardown: &'a TeardownConfig,
    policy: &'a Policy,
    finalizer: String,
}

impl Reconciler {
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run one pass for a policy
    #[instrument(skip_all, fields(policy_id = %policy_id))]
    pub async fn reconcile(&self, policy_id: &PolicyId) -> Result<ReconcileAction, ReconcileError> {
        let started = Instant::now();
        let result = self.run(policy_id).await;

        let outcome = match &result {
            Ok(ReconcileAction::AwaitChange) => ReconcileOutcome::Success,
            Ok(ReconcileAction::RequeueAfter(_)) => ReconcileOutcome::Requeued,
            Err(e) => {
                warn!(error = %e, class = ?e.class(), "Reconcile failed");
                ReconcileOutcome::Failed
            }
        };
        self.metrics
            .record_reconcile(policy_id, outcome, started.elapsed());
        result
    }

    /// What the dispatcher should do after a pass, given how many passes in a
    /// row have failed before this one
    pub fn requeue_action(
        &self,
        result: &Result<ReconcileAction, ReconcileError>,
        attempt: u32,
    ) -> ReconcileAction {
        match result {
            Ok(action) => *action,
            Err(_) => self.retry.on_error(attempt),
        }
    }

    async fn run(&self, policy_id: &PolicyId) -> Result<ReconcileAction, ReconcileError> {
        let Some(mut policy) = self.resources.get_policy(policy_id).await? else {
            debug!("Policy not found");
            return Ok(ReconcileAction::AwaitChange);
        };

        let workloads = matcher::dedup_workloads(self.resources.list_workloads().await?);

        let client = match self.connect(&policy).await {
            Ok(client) => client,
            Err(message) => {
                warn!(reason = %message, "Backend credentials unavailable");
                self.mark_degraded(&mut policy, DegradedReason::CredentialsUnavailable, message)
                    .await;
                return Ok(self.retry.credentials_action());
            }
        };

        if policy.deletion_requested {
            return self.finalize_policy(policy, workloads, client.as_ref()).await;
        }

        finalizer::ensure_policy_finalizer(self.resources.as_ref(), &mut policy)
            .await
            .map_err(|source| ReconcileError::PolicyFinalizer {
                policy: policy.id.clone(),
                source,
            })?;

        if let Err(source) = policy.validate() {
            self.mark_degraded(&mut policy, DegradedReason::InvalidPolicy, source.to_string())
                .await;
            return Err(ReconcileError::InvalidPolicy {
                policy: policy.id.clone(),
                source,
            });
        }

        let pass = self.pass(&policy, client.as_ref());
        let (failures, managed) = pass.run_workloads(workloads, false).await;
        self.metrics.set_managed_workloads(&policy.id, managed);

        if failures.is_empty() {
            self.clear_degraded(&mut policy).await;
            info!(managed, "Policy reconciled");
            Ok(ReconcileAction::AwaitChange)
        } else {
            let err = ReconcileError::Workloads(failures);
            self.mark_degraded(&mut policy, DegradedReason::ReconcileFailed, err.to_string())
                .await;
            Err(err)
        }
    }

    /// Tear down every managed workload, then release the policy
    async fn finalize_policy(
        &self,
        mut policy: Policy,
        workloads: Vec<Workload>,
        client: &dyn ServiceClient,
    ) -> Result<ReconcileAction, ReconcileError> {
        info!("Policy is being deleted, tearing down managed workloads");

        let pass = self.pass(&policy, client);
        let (failures, remaining) = pass.run_workloads(workloads, true).await;
        self.metrics.set_managed_workloads(&policy.id, remaining);
        if !failures.is_empty() {
            return Err(ReconcileError::Workloads(failures));
        }

        finalizer::release_policy_finalizer(self.resources.as_ref(), &mut policy)
            .await
            .map_err(|source| ReconcileError::PolicyFinalizer {
                policy: policy.id.clone(),
                source,
            })?;
        info!("Policy released");
        Ok(ReconcileAction::AwaitChange)
    }

    async fn connect(&self, policy: &Policy) -> Result<Arc<dyn ServiceClient>, String> {
        let credentials = self
            .resources
            .get_credentials(&policy.credentials_ref)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("credentials {} not found", policy.credentials_ref))?;

        let inner = self
            .clients
            .connect(&credentials)
            .map_err(|e| e.to_string())?;

        Ok(Arc::new(InstrumentedServiceClient::new(
            inner,
            self.config.client.request_timeout(),
            self.metrics.clone(),
        )))
    }

    fn pass<'a>(&'a self, policy: &'a Policy, client: &'a dyn ServiceClient) -> Pass<'a> {
        Pass {
            resources: self.resources.as_ref(),
            records: self.records.as_ref(),
            objects: self.objects.as_ref(),
            client,
            metrics: self.metrics.as_ref(),
            teardown: &self.config.teardown,
            policy,
            finalizer: policy.workload_finalizer(),
        }
    }

    /// Record a degraded condition. Status writes never fail the pass.
    async fn mark_degraded(&self, policy: &mut Policy, reason: DegradedReason, message: String) {
        for other in DEGRADED_REASONS {
            self.metrics.set_degraded(&policy.id, other, other == reason);
        }

        let since = match &policy.status.degraded {
            Some(current) if current.reason == reason => current.since,
            _ => Utc::now(),
        };
        let mut status = policy.status.clone();
        status.degraded = Some(DegradedCondition {
            reason,
            message,
            since,
        });
        if status == policy.status {
            return;
        }

        match self.resources.set_policy_status(&policy.id, status.clone()).await {
            Ok(()) => policy.status = status,
            Err(e) => warn!(error = %e, "Failed to record degraded status"),
        }
    }

    async fn clear_degraded(&self, policy: &mut Policy) {
        for reason in DEGRADED_REASONS {
            self.metrics.set_degraded(&policy.id, reason, false);
        }
        if policy.status.degraded.is_none() {
            return;
        }

        let mut status = policy.status.clone();
        status.degraded = None;
        match self.resources.set_policy_status(&policy.id, status.clone()).await {
            Ok(()) => policy.status = status,
            Err(e) => warn!(error = %e, "Failed to clear degraded status"),
        }
    }
}

impl Pass<'_> {
    /// Process every workload in order. One workload's failure never stops
    /// the others. Returns the failures and how many workloads still carry
    /// the policy finalizer.
    async fn run_workloads(
        &self,
        workloads: Vec<Workload>,
        policy_deleting: bool,
    ) -> (Vec<WorkloadFailure>, usize) {
        let mut failures = Vec::new();
        let mut managed = 0;

        for mut workload in workloads {
            if let Err(error) = self.run_workload(&mut workload, policy_deleting).await {
                warn!(
                    workload_id = %workload.id,
                    error = %error,
                    "Workload failed to reconcile"
                );
                failures.push(WorkloadFailure {
                    workload: workload.id.clone(),
                    error,
                });
            }
            if workload.has_finalizer(&self.finalizer) {
                managed += 1;
            }
        }

        (failures, managed)
    }

    async fn run_workload(
        &self,
        workload: &mut Workload,
        policy_deleting: bool,
    ) -> Result<(), WorkloadError> {
        // A deleting policy tears down regardless of what its selector says
        let selected = !policy_deleting && matcher::selects(self.policy, workload)?;

        let disposition =
            finalizer::disposition(workload, &self.finalizer, selected, policy_deleting);
        if disposition == Disposition::Ignore {
            return Ok(());
        }

        // A policy named after the legacy schema owns that finalizer outright
        if self.finalizer != LEGACY_FINALIZER && workload.has_finalizer(LEGACY_FINALIZER) {
            finalizer::remove_legacy_finalizer(self.resources, workload).await;
        }

        match disposition {
            Disposition::Converge => self.converge(workload).await,
            Disposition::Teardown => self.teardown(workload).await,
            Disposition::Ignore => Ok(()),
        }
    }
}
