//! # PDO Controller - Incident-service reconciliation
//!
//! Reconciles alerting policies against the fleet's workloads and an external
//! incident-management backend.
//!
//! ## Overview
//!
//! For one policy, a reconcile pass:
//!
//! 1. Loads the policy and lists every workload
//! 2. Loads backend credentials (degraded + fixed-delay requeue on failure)
//! 3. Tears down services for workloads that are deleting or no longer selected
//! 4. Converges services for selected workloads: existence, hibernation,
//!    limited support and orchestration, in that order
//! 5. Aggregates per-workload failures into one result
//!
//! Each workload is guarded by a per-policy finalizer added before any
//! backend create and removed only after teardown, so a crash at any point
//! never orphans a backend service.
//!
//! ## Architectural Boundaries
//!
//! - **Dispatcher** (external) owns queueing and guarantees one in-flight
//!   reconcile per policy
//! - **pdo-state** owns persistence boundaries and the record wire format
//! - **pdo-controller** owns matching, state machines and the finalizer protocol
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pdo_controller::{
//!     client::{MockClientFactory, MockServiceClient},
//!     ControllerConfig, ReconcilerBuilder,
//! };
//! use pdo_state::{InMemoryObjectStore, InMemoryResourceStore, InMemoryStateStore};
//! use pdo_types::PolicyId;
//!
//! # async fn example() {
//! let client = Arc::new(MockServiceClient::new());
//! let reconciler = ReconcilerBuilder::new(ControllerConfig::default())
//!     .with_resource_store(Arc::new(InMemoryResourceStore::new()))
//!     .with_state_store(Arc::new(InMemoryStateStore::new()))
//!     .with_object_store(Arc::new(InMemoryObjectStore::new()))
//!     .with_client_factory(Arc::new(MockClientFactory::new(client)))
//!     .build()
//!     .unwrap();
//!
//! let action = reconciler.reconcile(&PolicyId::new("prod-alerts")).await;
//! # }
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod finalizer;
pub mod lifecycle;
pub mod matcher;
pub mod metrics;
pub mod reconciler;
pub mod retry;
pub mod telemetry;

pub use client::{ServiceClient, ServiceClientFactory, ServiceError, ServiceOp};
pub use config::ControllerConfig;
pub use error::{ErrorClass, ReconcileError, WorkloadError, WorkloadFailure};
pub use metrics::{NoopMetrics, PrometheusMetrics, ReconcileMetrics, ReconcileOutcome};
pub use reconciler::{Reconciler, ReconcilerBuilder};
pub use retry::{ReconcileAction, RetryPolicy};
