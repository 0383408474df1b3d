//! Convergence of selected workloads

mod common;

use common::{prod_workload, Harness};
use pdo_controller::client::ServiceOp;
use pdo_controller::ReconcileAction;
use pdo_state::StateStore;
use pdo_types::naming::{LEGACY_FINALIZER, NO_ALERTS_LABEL, SYNTHETIC_ANNOTATION};
use pdo_types::{
    AlertGroupingSpec, AlertGroupingType, ObjectRef, PowerState, RuleSource, WorkloadId,
};
use std::collections::BTreeMap;

#[tokio::test]
async fn prod_workload_gets_a_service() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;

    let action = h.reconcile().await.unwrap();
    assert_eq!(action, ReconcileAction::AwaitChange);

    assert!(h.has_finalizer("c1").await);
    assert_eq!(h.client.count(ServiceOp::CreateService), 1);

    let record = h.record("c1").await.unwrap();
    let service_id = record.service_id().unwrap().clone();
    assert_eq!(record.escalation_policy_id, "EP1");
    // Create hands back its own id; the integration lookup is authoritative
    assert_eq!(
        record.integration_id,
        Some(format!("{}-events", service_id))
    );
    assert!(!record.hibernating && !record.limited_support);

    let service = h.client.service(&service_id).unwrap();
    assert_eq!(service.params.name, "osd-c1");
    assert!(service.enabled);

    let secret = h.secret("c1").await.unwrap();
    assert_eq!(secret.name, "osd-c1-pd-secret");
    assert_eq!(secret.owner, WorkloadId::new("c1"));
    assert_eq!(secret.integration_key, format!("key-{}-0", service_id));
    assert!(h.has_distribution("c1").await);

    assert_eq!(h.metrics.reconciles(common::POLICY, "success"), 1);
}

#[tokio::test]
async fn repeated_passes_create_once() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;

    h.reconcile().await.unwrap();
    let first = h.record("c1").await;
    h.reconcile().await.unwrap();
    h.reconcile().await.unwrap();

    assert_eq!(h.client.count(ServiceOp::CreateService), 1);
    assert_eq!(h.client.service_count(), 1);
    assert_eq!(h.record("c1").await, first);
    assert_eq!(h.objects.secret_count().await, 1);
    assert_eq!(h.objects.distribution_count().await, 1);
}

#[tokio::test]
async fn stale_integration_id_is_refreshed_on_existing_service() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;
    h.reconcile().await.unwrap();

    let mut record = h.record("c1").await.unwrap();
    let service_id = record.service_id().unwrap().clone();
    record.integration_id = Some("PINT-stale".to_string());
    h.records
        .save("ns-c1", &h.record_key("c1"), &record)
        .await
        .unwrap();

    h.reconcile().await.unwrap();
    assert_eq!(h.client.count(ServiceOp::CreateService), 1);
    assert_eq!(
        h.record("c1").await.unwrap().integration_id,
        Some(format!("{}-events", service_id))
    );
}

#[tokio::test]
async fn failed_create_is_retried_with_finalizer_in_place() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;
    h.client.fail_on(ServiceOp::CreateService);

    let err = h.reconcile().await.unwrap_err();
    assert_eq!(err.workload_failures().len(), 1);
    assert!(h.has_finalizer("c1").await);
    assert!(h.record("c1").await.is_none());

    h.client.clear_failures();
    h.reconcile().await.unwrap();
    assert!(h.record("c1").await.unwrap().is_created());
    assert_eq!(h.client.service_count(), 1);
}

#[tokio::test]
async fn uninstalled_and_muted_workloads_are_left_alone() {
    let h = Harness::new().await;
    let mut pending = prod_workload("c1");
    pending.installed = false;
    h.add_workload(pending).await;
    h.add_workload(prod_workload("c2").with_label(NO_ALERTS_LABEL, "true"))
        .await;
    h.add_workload(prod_workload("c3").with_label("env", "stage"))
        .await;

    h.reconcile().await.unwrap();

    assert!(h.client.calls().is_empty());
    assert!(!h.has_finalizer("c1").await);
    assert!(!h.has_finalizer("c2").await);
    assert!(!h.has_finalizer("c3").await);
}

#[tokio::test]
async fn hibernation_disables_and_waits_for_instances_before_enabling() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;
    h.reconcile().await.unwrap();
    let service_id = h.record("c1").await.unwrap().service_id.unwrap();

    h.update_workload("c1", |w| w.power_state = PowerState::Hibernating)
        .await;
    h.reconcile().await.unwrap();
    assert!(!h.client.service(&service_id).unwrap().enabled);
    assert!(h.record("c1").await.unwrap().hibernating);

    h.update_workload("c1", |w| w.power_state = PowerState::Resuming)
        .await;
    h.reconcile().await.unwrap();
    assert!(!h.client.service(&service_id).unwrap().enabled);
    assert_eq!(h.client.count(ServiceOp::EnableService), 0);

    h.update_workload("c1", |w| {
        w.power_state = PowerState::Running;
        w.status.instances_running = Some(true);
    })
    .await;
    h.reconcile().await.unwrap();
    assert!(h.client.service(&service_id).unwrap().enabled);
    assert!(!h.record("c1").await.unwrap().hibernating);
}

#[tokio::test]
async fn support_exception_overrides_limited_support() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;
    h.reconcile().await.unwrap();
    let service_id = h.record("c1").await.unwrap().service_id.unwrap();

    h.update_workload("c1", |w| w.support.limited_support = true)
        .await;
    h.reconcile().await.unwrap();
    assert!(!h.client.service(&service_id).unwrap().enabled);
    assert!(h.record("c1").await.unwrap().limited_support);

    h.update_workload("c1", |w| w.support.support_exception = true)
        .await;
    h.reconcile().await.unwrap();
    assert!(h.client.service(&service_id).unwrap().enabled);
    assert!(!h.record("c1").await.unwrap().limited_support);

    h.client.reset_calls();
    h.reconcile().await.unwrap();
    assert_eq!(h.client.count(ServiceOp::DisableService), 0);
    assert_eq!(h.client.count(ServiceOp::EnableService), 0);
}

#[tokio::test]
async fn lifting_limited_support_reenables() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;
    h.reconcile().await.unwrap();
    let service_id = h.record("c1").await.unwrap().service_id.unwrap();

    h.update_workload("c1", |w| w.support.limited_support = true)
        .await;
    h.reconcile().await.unwrap();
    h.update_workload("c1", |w| w.support.limited_support = false)
        .await;
    h.reconcile().await.unwrap();

    assert!(h.client.service(&service_id).unwrap().enabled);
    assert!(!h.record("c1").await.unwrap().limited_support);
}

fn rule_source(env: &str) -> RuleSource {
    let mut labels = BTreeMap::new();
    labels.insert("env".to_string(), env.to_string());
    RuleSource {
        reference: ObjectRef::new("rules", "shared"),
        labels,
        rules: serde_json::json!({"orchestration_path": {"sets": [{"id": "start"}]}}),
    }
}

#[tokio::test]
async fn orchestration_is_enabled_before_rules_are_applied() {
    let h = Harness::new().await;
    h.update_policy(|p| {
        *p = p.clone().with_orchestration(ObjectRef::new("rules", "shared"));
    })
    .await;
    h.resources.insert_rule_source(rule_source("prod")).await;
    h.add_workload(prod_workload("c1")).await;

    h.reconcile().await.unwrap();

    let ops: Vec<ServiceOp> = h.client.calls().into_iter().map(|c| c.op).collect();
    let toggle = ops
        .iter()
        .position(|op| *op == ServiceOp::ToggleServiceOrchestration)
        .unwrap();
    let apply = ops
        .iter()
        .position(|op| *op == ServiceOp::ApplyServiceOrchestrationRule)
        .unwrap();
    assert!(toggle < apply);

    let record = h.record("c1").await.unwrap();
    assert!(record.orchestration_enabled);
    assert!(record.orchestration_rule_applied);
    let service = h.client.service(record.service_id().unwrap()).unwrap();
    assert_eq!(service.rules, Some(rule_source("prod").rules));
}

#[tokio::test]
async fn failed_toggle_never_applies_rules() {
    let h = Harness::new().await;
    h.update_policy(|p| {
        *p = p.clone().with_orchestration(ObjectRef::new("rules", "shared"));
    })
    .await;
    h.resources.insert_rule_source(rule_source("prod")).await;
    h.add_workload(prod_workload("c1")).await;
    h.client.fail_on(ServiceOp::ToggleServiceOrchestration);

    assert!(h.reconcile().await.is_err());

    assert_eq!(h.client.count(ServiceOp::ApplyServiceOrchestrationRule), 0);
    let record = h.record("c1").await.unwrap();
    assert!(!record.orchestration_enabled);
    assert!(!record.orchestration_rule_applied);
}

#[tokio::test]
async fn synthetic_workloads_and_foreign_rule_sources_get_no_rules() {
    let h = Harness::new().await;
    h.update_policy(|p| {
        *p = p.clone().with_orchestration(ObjectRef::new("rules", "shared"));
    })
    .await;
    h.resources.insert_rule_source(rule_source("stage")).await;
    h.add_workload(prod_workload("c1")).await;
    h.add_workload(prod_workload("fake").with_annotation(SYNTHETIC_ANNOTATION, "true"))
        .await;

    h.reconcile().await.unwrap();

    assert_eq!(h.client.count(ServiceOp::ToggleServiceOrchestration), 1);
    assert_eq!(h.client.count(ServiceOp::ApplyServiceOrchestrationRule), 0);
    assert!(!h.record("fake").await.unwrap().orchestration_enabled);
    assert!(h.record("c1").await.unwrap().orchestration_enabled);
}

#[tokio::test]
async fn missing_rule_source_is_not_an_error() {
    let h = Harness::new().await;
    h.update_policy(|p| {
        *p = p.clone().with_orchestration(ObjectRef::new("rules", "missing"));
    })
    .await;
    h.add_workload(prod_workload("c1")).await;

    h.reconcile().await.unwrap();

    assert_eq!(h.metrics.rule_sources_missing(common::POLICY), 1);
    assert!(h.record("c1").await.unwrap().orchestration_enabled);
    assert_eq!(h.client.count(ServiceOp::ApplyServiceOrchestrationRule), 0);
}

#[tokio::test]
async fn escalation_policy_drift_is_pushed() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;
    h.reconcile().await.unwrap();

    h.update_policy(|p| p.escalation_policy_id = "EP2".to_string())
        .await;
    h.reconcile().await.unwrap();
    h.reconcile().await.unwrap();

    assert_eq!(h.client.count(ServiceOp::UpdateEscalationPolicy), 1);
    let record = h.record("c1").await.unwrap();
    assert_eq!(record.escalation_policy_id, "EP2");
    let service = h.client.service(record.service_id().unwrap()).unwrap();
    assert_eq!(service.escalation_policy_id, "EP2");
}

#[tokio::test]
async fn rotated_key_replaces_secret() {
    let h = Harness::new().await;
    h.add_workload(prod_workload("c1")).await;
    h.reconcile().await.unwrap();
    let service_id = h.record("c1").await.unwrap().service_id.unwrap();
    let before = h.secret("c1").await.unwrap();

    h.client.rotate_key(&service_id);
    h.reconcile().await.unwrap();

    let after = h.secret("c1").await.unwrap();
    assert_ne!(before.integration_key, after.integration_key);
    assert_eq!(after.integration_key, format!("key-{}-1", service_id));
    assert_eq!(h.objects.secret_count().await, 1);
}

#[tokio::test]
async fn alert_grouping_is_set_after_create() {
    let h = Harness::new().await;
    let grouping = AlertGroupingSpec {
        grouping_type: AlertGroupingType::Time,
        timeout_minutes: 10,
    };
    h.update_policy(|p| p.alert_grouping = Some(grouping)).await;
    h.add_workload(prod_workload("c1")).await;

    h.reconcile().await.unwrap();
    h.reconcile().await.unwrap();

    assert_eq!(h.client.count(ServiceOp::UpdateAlertGrouping), 1);
    let record = h.record("c1").await.unwrap();
    let service = h.client.service(record.service_id().unwrap()).unwrap();
    assert_eq!(service.alert_grouping, Some(grouping));
}

#[tokio::test]
async fn legacy_finalizer_is_dropped_on_converge() {
    let h = Harness::new().await;
    let mut workload = prod_workload("c1");
    workload.finalizers.insert(LEGACY_FINALIZER.to_string());
    h.add_workload(workload).await;

    h.reconcile().await.unwrap();

    let workload = h.workload("c1").await.unwrap();
    assert!(!workload.has_finalizer(LEGACY_FINALIZER));
    assert!(workload.has_finalizer(&h.finalizer()));
}
