//! Error types for reconcile passes

use pdo_state::StateError;
use pdo_types::{PolicyId, PolicyValidationError, SelectorError, ServiceId, WorkloadId};
use thiserror::Error;

use crate::client::ServiceError;

/// How the dispatcher should treat an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected absence
    NotFound,
    /// Backend or store failure, retried with backoff
    Transient,
    /// Malformed policy input, retried but logged distinctly
    Config,
}

/// Failure of one workload within a pass
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("incident backend: {0}")]
    Service(#[from] ServiceError),

    #[error("state store: {0}")]
    State(#[from] StateError),

    #[error("selector: {0}")]
    Selector(#[from] SelectorError),

    /// Teardown finished but the finalizer could not be released
    #[error("failed to remove finalizer {finalizer}: {source}")]
    Finalizer {
        finalizer: String,
        #[source]
        source: StateError,
    },

    /// Incidents were still open after the drain loop gave up
    #[error("{remaining} incident(s) still open on service {service_id} after {attempts} attempt(s)")]
    IncidentsPending {
        service_id: ServiceId,
        remaining: usize,
        attempts: u32,
    },
}

impl WorkloadError {
    pub fn class(&self) -> ErrorClass {
        match self {
            WorkloadError::Service(e) if e.is_not_found() => ErrorClass::NotFound,
            WorkloadError::State(e) if e.is_not_found() => ErrorClass::NotFound,
            WorkloadError::Selector(_) => ErrorClass::Config,
            _ => ErrorClass::Transient,
        }
    }
}

/// Workload id paired with its failure
#[derive(Debug, Error)]
#[error("workload {workload}: {error}")]
pub struct WorkloadFailure {
    pub workload: WorkloadId,
    #[source]
    pub error: WorkloadError,
}

/// Failed reconcile pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("resource store: {0}")]
    Store(#[from] StateError),

    #[error("policy {policy} is invalid: {source}")]
    InvalidPolicy {
        policy: PolicyId,
        #[source]
        source: PolicyValidationError,
    },

    #[error("failed to update finalizer on policy {policy}: {source}")]
    PolicyFinalizer {
        policy: PolicyId,
        #[source]
        source: StateError,
    },

    #[error("{} workload(s) failed: {}", .0.len(), summarize(.0))]
    Workloads(Vec<WorkloadFailure>),
}

fn summarize(failures: &[WorkloadFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReconcileError {
    /// Worst class across the error; Config outranks Transient
    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcileError::Store(e) if e.is_not_found() => ErrorClass::NotFound,
            ReconcileError::Store(_) | ReconcileError::PolicyFinalizer { .. } => {
                ErrorClass::Transient
            }
            ReconcileError::InvalidPolicy { .. } => ErrorClass::Config,
            ReconcileError::Workloads(failures) => {
                let classes: Vec<ErrorClass> =
                    failures.iter().map(|f| f.error.class()).collect();
                if classes.contains(&ErrorClass::Config) {
                    ErrorClass::Config
                } else if classes.contains(&ErrorClass::Transient) {
                    ErrorClass::Transient
                } else {
                    ErrorClass::NotFound
                }
            }
        }
    }

    /// Failures of individual workloads, empty for pass-level errors
    pub fn workload_failures(&self) -> &[WorkloadFailure] {
        match self {
            ReconcileError::Workloads(failures) => failures,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServiceOp;

    fn failure(id: &str, error: WorkloadError) -> WorkloadFailure {
        WorkloadFailure {
            workload: WorkloadId::new(id),
            error,
        }
    }

    #[test]
    fn test_config_outranks_transient() {
        let err = ReconcileError::Workloads(vec![
            failure(
                "a",
                WorkloadError::Service(ServiceError::Transport("reset".into())),
            ),
            failure("b", WorkloadError::Selector(SelectorError::EmptyKey)),
        ]);
        assert_eq!(err.class(), ErrorClass::Config);
        assert_eq!(err.workload_failures().len(), 2);
    }

    #[test]
    fn test_message_lists_each_workload() {
        let err = ReconcileError::Workloads(vec![
            failure(
                "a",
                WorkloadError::Service(ServiceError::Api {
                    operation: ServiceOp::CreateService,
                    status: 503,
                    message: "busy".into(),
                }),
            ),
            failure(
                "b",
                WorkloadError::IncidentsPending {
                    service_id: ServiceId::new("S1"),
                    remaining: 2,
                    attempts: 5,
                },
            ),
        ]);
        let message = err.to_string();
        assert!(message.starts_with("2 workload(s) failed"));
        assert!(message.contains("workload a"));
        assert!(message.contains("workload b"));
    }

    #[test]
    fn test_not_found_class() {
        let err = WorkloadError::Service(ServiceError::NotFound("svc".into()));
        assert_eq!(err.class(), ErrorClass::NotFound);
        let err = ReconcileError::Store(StateError::Connection("down".into()));
        assert_eq!(err.class(), ErrorClass::Transient);
    }
}
