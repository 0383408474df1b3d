//! Limited-support axis

use pdo_types::{ServiceRecord, Workload};

use super::{ServiceAction, Transition};

/// A support exception always wins: a service disabled for limited support
/// is re-enabled, and a new limited-support label is ignored.
///
/// The persisted hibernation flag is not consulted; the two axes toggle the
/// same service independently.
pub fn limited_support_transition(
    workload: &Workload,
    record: &ServiceRecord,
) -> Option<Transition> {
    if !workload.installed || !record.is_created() {
        return None;
    }
    let labels = workload.support;

    let enable = || {
        Transition::new(
            ServiceAction::Enable,
            ServiceRecord {
                limited_support: false,
                ..record.clone()
            },
        )
    };

    match (labels.limited_support, record.limited_support) {
        (_, true) if labels.support_exception => Some(enable()),
        (true, false) if labels.support_exception => None,
        (true, false) => Some(Transition::new(
            ServiceAction::Disable,
            ServiceRecord {
                limited_support: true,
                ..record.clone()
            },
        )),
        (false, true) => Some(enable()),
        _ => None,
    }
}
