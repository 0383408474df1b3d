//! Reconcile metrics capability

use std::time::Duration;

use pdo_types::{DegradedReason, PolicyId};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

use crate::client::ServiceOp;

/// Outcome label of a reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Success,
    Requeued,
    Failed,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Success => "success",
            ReconcileOutcome::Requeued => "requeued",
            ReconcileOutcome::Failed => "failed",
        }
    }
}

/// Sink for controller metrics, injected into the reconciler
pub trait ReconcileMetrics: Send + Sync {
    fn record_reconcile(&self, policy: &PolicyId, outcome: ReconcileOutcome, elapsed: Duration);

    fn record_service_call(&self, operation: ServiceOp, success: bool);

    fn set_degraded(&self, policy: &PolicyId, reason: DegradedReason, degraded: bool);

    /// Orchestration is configured but its rule source does not exist
    fn record_rule_source_missing(&self, policy: &PolicyId);

    fn set_managed_workloads(&self, policy: &PolicyId, count: usize);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl ReconcileMetrics for NoopMetrics {
    fn record_reconcile(&self, _: &PolicyId, _: ReconcileOutcome, _: Duration) {}
    fn record_service_call(&self, _: ServiceOp, _: bool) {}
    fn set_degraded(&self, _: &PolicyId, _: DegradedReason, _: bool) {}
    fn record_rule_source_missing(&self, _: &PolicyId) {}
    fn set_managed_workloads(&self, _: &PolicyId, _: usize) {}
}

/// Prometheus collectors registered on a caller-provided registry
pub struct PrometheusMetrics {
    /// Reconcile passes by policy and outcome
    pub reconciles_total: IntCounterVec,

    /// Reconcile pass duration
    pub reconcile_duration_seconds: HistogramVec,

    /// Backend calls by operation and outcome
    pub service_calls_total: IntCounterVec,

    /// 1 while a policy is degraded for a reason
    pub policy_degraded: IntGaugeVec,

    /// Missing orchestration rule sources
    pub rule_source_missing_total: IntCounterVec,

    /// Workloads currently carrying the policy finalizer
    pub managed_workloads: IntGaugeVec,
}

impl PrometheusMetrics {
    /// Create and register controller metrics
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let reconciles_total = IntCounterVec::new(
            Opts::new("pdo_reconciles_total", "Reconcile passes"),
            &["policy", "outcome"],
        )?;
        registry.register(Box::new(reconciles_total.clone()))?;

        let reconcile_duration_seconds = HistogramVec::new(
            HistogramOpts::new("pdo_reconcile_duration_seconds", "Reconcile pass duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
            &["policy"],
        )?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;

        let service_calls_total = IntCounterVec::new(
            Opts::new("pdo_service_calls_total", "Incident backend calls"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(service_calls_total.clone()))?;

        let policy_degraded = IntGaugeVec::new(
            Opts::new("pdo_policy_degraded", "Policy degraded by reason"),
            &["policy", "reason"],
        )?;
        registry.register(Box::new(policy_degraded.clone()))?;

        let rule_source_missing_total = IntCounterVec::new(
            Opts::new(
                "pdo_rule_source_missing_total",
                "Orchestration rule sources that could not be found",
            ),
            &["policy"],
        )?;
        registry.register(Box::new(rule_source_missing_total.clone()))?;

        let managed_workloads = IntGaugeVec::new(
            Opts::new("pdo_managed_workloads", "Workloads managed by a policy"),
            &["policy"],
        )?;
        registry.register(Box::new(managed_workloads.clone()))?;

        Ok(Self {
            reconciles_total,
            reconcile_duration_seconds,
            service_calls_total,
            policy_degraded,
            rule_source_missing_total,
            managed_workloads,
        })
    }

    /// Current count of backend calls for an operation and outcome
    pub fn service_calls(&self, operation: &str, outcome: &str) -> u64 {
        self.service_calls_total
            .with_label_values(&[operation, outcome])
            .get()
    }

    pub fn reconciles(&self, policy: &str, outcome: &str) -> u64 {
        self.reconciles_total
            .with_label_values(&[policy, outcome])
            .get()
    }

    pub fn degraded(&self, policy: &str, reason: DegradedReason) -> i64 {
        let reason = reason.to_string();
        self.policy_degraded
            .with_label_values(&[policy, reason.as_str()])
            .get()
    }

    pub fn rule_sources_missing(&self, policy: &str) -> u64 {
        self.rule_source_missing_total
            .with_label_values(&[policy])
            .get()
    }
}

impl ReconcileMetrics for PrometheusMetrics {
    fn record_reconcile(&self, policy: &PolicyId, outcome: ReconcileOutcome, elapsed: Duration) {
        self.reconciles_total
            .with_label_values(&[policy.as_str(), outcome.as_str()])
            .inc();
        self.reconcile_duration_seconds
            .with_label_values(&[policy.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    fn record_service_call(&self, operation: ServiceOp, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.service_calls_total
            .with_label_values(&[operation.as_str(), outcome])
            .inc();
    }

    fn set_degraded(&self, policy: &PolicyId, reason: DegradedReason, degraded: bool) {
        let reason = reason.to_string();
        self.policy_degraded
            .with_label_values(&[policy.as_str(), reason.as_str()])
            .set(i64::from(degraded));
    }

    fn record_rule_source_missing(&self, policy: &PolicyId) {
        self.rule_source_missing_total
            .with_label_values(&[policy.as_str()])
            .inc();
    }

    fn set_managed_workloads(&self, policy: &PolicyId, count: usize) {
        self.managed_workloads
            .with_label_values(&[policy.as_str()])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice_fails() {
        let registry = Registry::new();
        PrometheusMetrics::new(&registry).unwrap();
        assert!(PrometheusMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_degraded_gauge_toggles() {
        let registry = Registry::new();
        let metrics = PrometheusMetrics::new(&registry).unwrap();
        let policy = PolicyId::new("p");

        metrics.set_degraded(&policy, DegradedReason::InvalidPolicy, true);
        assert_eq!(metrics.degraded("p", DegradedReason::InvalidPolicy), 1);
        metrics.set_degraded(&policy, DegradedReason::InvalidPolicy, false);
        assert_eq!(metrics.degraded("p", DegradedReason::InvalidPolicy), 0);
    }

    #[test]
    fn test_reconcile_counted_by_outcome() {
        let registry = Registry::new();
        let metrics = PrometheusMetrics::new(&registry).unwrap();
        let policy = PolicyId::new("p");

        metrics.record_reconcile(&policy, ReconcileOutcome::Success, Duration::from_millis(3));
        metrics.record_reconcile(&policy, ReconcileOutcome::Failed, Duration::from_millis(3));
        metrics.record_reconcile(&policy, ReconcileOutcome::Success, Duration::from_millis(3));

        assert_eq!(metrics.reconciles("p", "success"), 2);
        assert_eq!(metrics.reconciles("p", "failed"), 1);
        assert!(!registry.gather().is_empty());
    }
}
