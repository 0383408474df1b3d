//! Selector evaluation

use std::collections::{BTreeMap, HashSet};

use pdo_types::naming::NO_ALERTS_LABEL;
use pdo_types::{
    LabelSelector, LabelSelectorRequirement, Policy, SelectorError, SelectorOperator, Workload,
};

/// Evaluate a selector against a label set.
///
/// The selector is validated first; a malformed selector is an error and
/// never silently matches or misses.
pub fn matches(
    selector: &LabelSelector,
    labels: &BTreeMap<String, String>,
) -> Result<bool, SelectorError> {
    selector.validate()?;

    let labels_match = selector
        .match_labels
        .iter()
        .all(|(k, v)| labels.get(k) == Some(v));

    Ok(labels_match
        && selector
            .match_expressions
            .iter()
            .all(|r| requirement_holds(r, labels)))
}

fn requirement_holds(req: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let value = labels.get(&req.key);
    match req.operator {
        SelectorOperator::In => value.is_some_and(|v| req.values.contains(v)),
        SelectorOperator::NotIn => value.map_or(true, |v| !req.values.contains(v)),
        SelectorOperator::Exists => value.is_some(),
        SelectorOperator::DoesNotExist => value.is_none(),
    }
}

/// Policy selector plus the implicit no-alerts exclusion. Only a literal
/// `"true"` mutes a workload; an absent label or any other value does not.
pub fn alerting_selector(policy: &Policy) -> LabelSelector {
    policy.selector.clone().with_requirement(LabelSelectorRequirement::new(
        NO_ALERTS_LABEL,
        SelectorOperator::NotIn,
        vec!["true".to_string()],
    ))
}

/// Whether a policy selects a workload
pub fn selects(policy: &Policy, workload: &Workload) -> Result<bool, SelectorError> {
    matches(&alerting_selector(policy), &workload.labels)
}

/// Drop repeated workload ids, keeping the first occurrence
pub fn dedup_workloads(workloads: Vec<Workload>) -> Vec<Workload> {
    let mut seen = HashSet::new();
    workloads
        .into_iter()
        .filter(|w| seen.insert(w.id.clone()))
        .collect()
}
