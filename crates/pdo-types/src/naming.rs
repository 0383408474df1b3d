//! Naming contract for derived objects and finalizers
//!
//! Other controllers locate the managed secret and record store object by
//! these names, so the functions here are part of the public contract. They
//! are pure string transforms; nothing parses a workload id back out of a
//! derived name (derived objects carry an explicit owner instead).

use crate::ids::{PolicyId, WorkloadId};

/// Prefix shared by every finalizer this controller owns.
pub const FINALIZER_PREFIX: &str = "pd.managed.io";

/// Finalizer written by the previous record schema. Removed on sight.
pub const LEGACY_FINALIZER: &str = "pd.managed.io/pagerduty";

/// Protective finalizer placed on the policy itself.
pub const POLICY_FINALIZER: &str = "pd.managed.io/policy-protection";

/// Label that opts a workload out of alerting regardless of selectors.
pub const NO_ALERTS_LABEL: &str = "pd.managed.io/noalerts";

/// Annotation marking a synthetic workload used as a test fixture.
pub const SYNTHETIC_ANNOTATION: &str = "pd.managed.io/fake";

const SECRET_SUFFIX: &str = "pd-secret";
const CONFIG_SUFFIX: &str = "pd-config";
const SYNC_SUFFIX: &str = "pd-sync";

/// `<servicePrefix>-<workloadId>-pd-secret`
pub fn secret_name(service_prefix: &str, workload: &WorkloadId) -> String {
    format!("{}-{}-{}", service_prefix, workload, SECRET_SUFFIX)
}

/// `<servicePrefix>-<workloadId>-pd-config`, the record store object.
pub fn config_name(service_prefix: &str, workload: &WorkloadId) -> String {
    format!("{}-{}-{}", service_prefix, workload, CONFIG_SUFFIX)
}

/// `<servicePrefix>-<workloadId>-pd-sync`, the distribution object.
pub fn distribution_name(service_prefix: &str, workload: &WorkloadId) -> String {
    format!("{}-{}-{}", service_prefix, workload, SYNC_SUFFIX)
}

/// Per-policy finalizer placed on each managed workload.
pub fn workload_finalizer(policy: &PolicyId) -> String {
    format!("{}/{}", FINALIZER_PREFIX, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        let w = WorkloadId::new("c1");
        assert_eq!(secret_name("osd", &w), "osd-c1-pd-secret");
        assert_eq!(config_name("osd", &w), "osd-c1-pd-config");
        assert_eq!(distribution_name("osd", &w), "osd-c1-pd-sync");
    }

    #[test]
    fn test_finalizer_format() {
        assert_eq!(
            workload_finalizer(&PolicyId::new("prod")),
            "pd.managed.io/prod"
        );
        // The reconciler must not treat this one as legacy
        assert_eq!(
            workload_finalizer(&PolicyId::new("pagerduty")),
            LEGACY_FINALIZER
        );
    }
}
