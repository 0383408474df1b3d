//! Finalizer protocol
//!
//! A workload moves `Unmanaged -> Managed -> TearingDown -> Unmanaged`.
//! The policy-specific finalizer is persisted before any backend create and
//! released only after teardown has finished, so a crash at any point leaves
//! a marker the next pass can act on.

use std::collections::BTreeSet;

use pdo_state::{ResourceStore, StateResult};
use pdo_types::naming::{LEGACY_FINALIZER, POLICY_FINALIZER};
use pdo_types::{Policy, Workload};
use tracing::{debug, warn};

/// Where a workload stands relative to one policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    /// No finalizer; nothing external exists for this pair
    Unmanaged,
    /// Finalizer present and the workload is still wanted
    Managed,
    /// Finalizer present but the workload is leaving
    TearingDown,
}

impl FinalizerState {
    pub fn of(workload: &Workload, finalizer: &str, selected: bool) -> Self {
        if !workload.has_finalizer(finalizer) {
            FinalizerState::Unmanaged
        } else if selected && !workload.deletion_requested {
            FinalizerState::Managed
        } else {
            FinalizerState::TearingDown
        }
    }
}

/// What a pass does with one workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Converge,
    Teardown,
    Ignore,
}

/// Partition rule for a workload within a pass
pub fn disposition(
    workload: &Workload,
    finalizer: &str,
    selected: bool,
    policy_deleting: bool,
) -> Disposition {
    let selected = selected && !policy_deleting;
    match FinalizerState::of(workload, finalizer, selected) {
        FinalizerState::TearingDown => Disposition::Teardown,
        _ if policy_deleting || workload.deletion_requested || !selected => Disposition::Ignore,
        _ => Disposition::Converge,
    }
}

/// Persist `finalizer` on the workload. Returns whether anything changed.
pub async fn add_finalizer(
    store: &dyn ResourceStore,
    workload: &mut Workload,
    finalizer: &str,
) -> StateResult<bool> {
    if workload.has_finalizer(finalizer) {
        return Ok(false);
    }
    let mut finalizers = workload.finalizers.clone();
    finalizers.insert(finalizer.to_string());
    store
        .set_workload_finalizers(&workload.id, finalizers.clone())
        .await?;
    workload.finalizers = finalizers;
    debug!(workload_id = %workload.id, finalizer, "Added finalizer");
    Ok(true)
}

/// Drop `finalizer` from the workload. Returns whether anything changed.
pub async fn remove_finalizer(
    store: &dyn ResourceStore,
    workload: &mut Workload,
    finalizer: &str,
) -> StateResult<bool> {
    if !workload.has_finalizer(finalizer) {
        return Ok(false);
    }
    let finalizers: BTreeSet<String> = workload
        .finalizers
        .iter()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect();
    store
        .set_workload_finalizers(&workload.id, finalizers.clone())
        .await?;
    workload.finalizers = finalizers;
    debug!(workload_id = %workload.id, finalizer, "Removed finalizer");
    Ok(true)
}

/// Remove the finalizer left by an earlier schema. Never fails the caller.
pub async fn remove_legacy_finalizer(store: &dyn ResourceStore, workload: &mut Workload) {
    if let Err(e) = remove_finalizer(store, workload, LEGACY_FINALIZER).await {
        warn!(
            workload_id = %workload.id,
            error = %e,
            "Failed to remove legacy finalizer"
        );
    }
}

/// Make sure the policy carries its own protective finalizer
pub async fn ensure_policy_finalizer(
    store: &dyn ResourceStore,
    policy: &mut Policy,
) -> StateResult<()> {
    if policy.is_protected() {
        return Ok(());
    }
    let mut finalizers = policy.finalizers.clone();
    finalizers.insert(POLICY_FINALIZER.to_string());
    store
        .set_policy_finalizers(&policy.id, finalizers.clone())
        .await?;
    policy.finalizers = finalizers;
    Ok(())
}

/// Release the policy once every workload has been torn down
pub async fn release_policy_finalizer(
    store: &dyn ResourceStore,
    policy: &mut Policy,
) -> StateResult<()> {
    if !policy.is_protected() {
        return Ok(());
    }
    let mut finalizers = policy.finalizers.clone();
    finalizers.remove(POLICY_FINALIZER);
    store
        .set_policy_finalizers(&policy.id, finalizers.clone())
        .await?;
    policy.finalizers = finalizers;
    Ok(())
}
