//! PDO Types - Core types for incident-service provisioning
//!
//! PDO reconciles declarative alerting policies against a fleet of workloads
//! and an external incident-management backend. This crate holds the data
//! model shared by the state layer and the controller.
//!
//! ## Key Concepts
//!
//! - **Policy**: Which workloads get an incident service, and with what parameters
//! - **Workload**: A fleet member (e.g. a cluster) a policy may select
//! - **ServiceRecord**: Persisted link between a (policy, workload) pair and its service
//! - **Managed objects**: The secret and distribution object derived for each pair
//! - **Naming**: The public naming contract other controllers depend on

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod ids;
pub mod naming;
pub mod objects;
pub mod policy;
pub mod record;
pub mod selector;
pub mod workload;

// Re-export main types
pub use ids::{PolicyId, ServiceId, WorkloadId};
pub use objects::{Credentials, DistributionObject, ManagedSecret, RuleSource};
pub use policy::{
    AlertGroupingSpec, AlertGroupingType, DegradedCondition, DegradedReason, ObjectRef,
    OrchestrationSpec, Policy, PolicyStatus, PolicyValidationError,
};
pub use record::ServiceRecord;
pub use selector::{LabelSelector, LabelSelectorRequirement, SelectorError, SelectorOperator};
pub use workload::{PowerState, StatusCondition, SupportLabels, Workload, WorkloadStatus};
