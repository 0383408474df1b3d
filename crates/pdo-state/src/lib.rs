//! # PDO State - Service record persistence
//!
//! This crate owns the boundary between the controller and everything it
//! reads or persists outside the incident backend:
//!
//! - **Service records**: one per (policy, workload) pair, stored as flat
//!   string key-value data next to the workload and decoded into a typed
//!   [`ServiceRecord`](pdo_types::ServiceRecord) at the boundary
//! - **Managed objects**: the integration-key secret and its distribution
//!   object
//! - **Resources**: policies, workloads, credentials and rule sources as
//!   served by the external watch/list store
//!
//! Every boundary is an async trait so production backends and the
//! in-memory implementations shipped here are interchangeable.
//!
//! ## Record wire format
//!
//! | key | value |
//! |---|---|
//! | `SERVICE_ID` | backend service id, empty when not created |
//! | `INTEGRATION_ID` | backend integration id |
//! | `ESCALATION_POLICY_ID` | escalation policy last pushed |
//! | `HIBERNATING` | `"true"` / `"false"` |
//! | `LIMITED_SUPPORT` | `"true"` / `"false"` |
//! | `SERVICE_ORCHESTRATION_ENABLED` | `"true"` / `"false"` |
//! | `SERVICE_ORCHESTRATION_RULE_APPLIED` | `"true"` / `"false"` |

#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod storage;

pub use error::{StateError, StateResult};
pub use storage::{
    InMemoryObjectStore, InMemoryResourceStore, InMemoryStateStore, ManagedObjectStore,
    ResourceStore, StateStore,
};
