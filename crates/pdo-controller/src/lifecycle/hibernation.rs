//! Hibernation axis

use pdo_types::{ServiceRecord, Workload};

use super::{ServiceAction, Transition};

/// Disable the service while hibernating; re-enable only once instances are
/// actually serving again, so a resuming workload does not page early.
pub fn hibernation_transition(workload: &Workload, record: &ServiceRecord) -> Option<Transition> {
    if !workload.installed || !record.is_created() {
        return None;
    }

    if workload.is_hibernating() && !record.hibernating {
        return Some(Transition::new(
            ServiceAction::Disable,
            ServiceRecord {
                hibernating: true,
                ..record.clone()
            },
        ));
    }

    // Independent of the limited-support flag: resuming re-enables even when
    // limited support is also persisted
    if !workload.is_hibernating() && record.hibernating && workload.instances_running() {
        return Some(Transition::new(
            ServiceAction::Enable,
            ServiceRecord {
                hibernating: false,
                ..record.clone()
            },
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdo_types::workload::{HIBERNATING_CONDITION, LEGACY_RUNNING_REASON};
    use pdo_types::{PowerState, ServiceId, StatusCondition};

    fn record(hibernating: bool) -> ServiceRecord {
        ServiceRecord {
            hibernating,
            ..ServiceRecord::created(ServiceId::new("S1"), None, "EP1")
        }
    }

    #[test]
    fn test_hibernate_disables() {
        let mut workload = Workload::new("w", "ns").installed();
        workload.power_state = PowerState::Hibernating;

        let t = hibernation_transition(&workload, &record(false)).unwrap();
        assert_eq!(t.action, ServiceAction::Disable);
        assert!(t.next.hibernating);
        assert!(hibernation_transition(&workload, &t.next).is_none());
    }

    #[test]
    fn test_no_resume_until_running() {
        let mut workload = Workload::new("w", "ns").installed();
        workload.power_state = PowerState::Resuming;
        assert!(hibernation_transition(&workload, &record(true)).is_none());

        workload.status.instances_running = Some(true);
        let t = hibernation_transition(&workload, &record(true)).unwrap();
        assert_eq!(t.action, ServiceAction::Enable);
        assert!(!t.next.hibernating);
    }

    #[test]
    fn test_legacy_condition_counts_as_running() {
        let mut workload = Workload::new("w", "ns").installed();
        workload.status.conditions.push(StatusCondition {
            condition_type: HIBERNATING_CONDITION.to_string(),
            status: false,
            reason: LEGACY_RUNNING_REASON.to_string(),
        });
        let t = hibernation_transition(&workload, &record(true)).unwrap();
        assert_eq!(t.action, ServiceAction::Enable);
    }

    #[test]
    fn test_resume_ignores_limited_support() {
        let mut workload = Workload::new("w", "ns").installed();
        workload.status.instances_running = Some(true);
        let persisted = ServiceRecord {
            limited_support: true,
            ..record(true)
        };

        let t = hibernation_transition(&workload, &persisted).unwrap();
        assert_eq!(t.action, ServiceAction::Enable);
        assert!(!t.next.hibernating);
        assert!(t.next.limited_support);
    }

    #[test]
    fn test_skipped_without_service() {
        let mut workload = Workload::new("w", "ns").installed();
        workload.power_state = PowerState::Hibernating;
        assert!(hibernation_transition(&workload, &ServiceRecord::default()).is_none());
    }
}
