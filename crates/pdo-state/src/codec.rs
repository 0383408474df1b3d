//! Flat key-value encoding of service records.
//!
//! Records written by earlier releases are plain string maps; the same
//! format is kept so existing objects stay readable. Decoding is strict on
//! boolean literals and lenient on missing or unknown keys.

use std::collections::BTreeMap;

use pdo_types::{ServiceId, ServiceRecord};

use crate::error::{StateError, StateResult};

pub const SERVICE_ID_KEY: &str = "SERVICE_ID";
pub const INTEGRATION_ID_KEY: &str = "INTEGRATION_ID";
pub const ESCALATION_POLICY_ID_KEY: &str = "ESCALATION_POLICY_ID";
pub const HIBERNATING_KEY: &str = "HIBERNATING";
pub const LIMITED_SUPPORT_KEY: &str = "LIMITED_SUPPORT";
pub const ORCHESTRATION_ENABLED_KEY: &str = "SERVICE_ORCHESTRATION_ENABLED";
pub const ORCHESTRATION_RULE_APPLIED_KEY: &str = "SERVICE_ORCHESTRATION_RULE_APPLIED";

/// Encode a record into its flat wire form.
pub fn encode(record: &ServiceRecord) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    data.insert(
        SERVICE_ID_KEY.to_string(),
        record
            .service_id
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default(),
    );
    data.insert(
        INTEGRATION_ID_KEY.to_string(),
        record.integration_id.clone().unwrap_or_default(),
    );
    data.insert(
        ESCALATION_POLICY_ID_KEY.to_string(),
        record.escalation_policy_id.clone(),
    );
    data.insert(HIBERNATING_KEY.to_string(), encode_bool(record.hibernating));
    data.insert(
        LIMITED_SUPPORT_KEY.to_string(),
        encode_bool(record.limited_support),
    );
    data.insert(
        ORCHESTRATION_ENABLED_KEY.to_string(),
        encode_bool(record.orchestration_enabled),
    );
    data.insert(
        ORCHESTRATION_RULE_APPLIED_KEY.to_string(),
        encode_bool(record.orchestration_rule_applied),
    );
    data
}

/// Decode a record from its flat wire form.
pub fn decode(data: &BTreeMap<String, String>) -> StateResult<ServiceRecord> {
    Ok(ServiceRecord {
        service_id: non_empty(data, SERVICE_ID_KEY).map(ServiceId::new),
        integration_id: non_empty(data, INTEGRATION_ID_KEY),
        escalation_policy_id: data
            .get(ESCALATION_POLICY_ID_KEY)
            .cloned()
            .unwrap_or_default(),
        hibernating: decode_bool(data, HIBERNATING_KEY)?,
        limited_support: decode_bool(data, LIMITED_SUPPORT_KEY)?,
        orchestration_enabled: decode_bool(data, ORCHESTRATION_ENABLED_KEY)?,
        orchestration_rule_applied: decode_bool(data, ORCHESTRATION_RULE_APPLIED_KEY)?,
    })
}

fn encode_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

fn non_empty(data: &BTreeMap<String, String>, key: &str) -> Option<String> {
    data.get(key).filter(|v| !v.is_empty()).cloned()
}

fn decode_bool(data: &BTreeMap<String, String>, key: &str) -> StateResult<bool> {
    match data.get(key).map(String::as_str) {
        None | Some("") => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(StateError::InvalidData {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_encode_uses_literal_booleans() {
        let record = ServiceRecord {
            service_id: Some(ServiceId::new("P1")),
            integration_id: Some("I1".into()),
            escalation_policy_id: "EP1".into(),
            hibernating: true,
            limited_support: false,
            orchestration_enabled: true,
            orchestration_rule_applied: false,
        };
        let encoded = encode(&record);
        assert_eq!(encoded[SERVICE_ID_KEY], "P1");
        assert_eq!(encoded[HIBERNATING_KEY], "true");
        assert_eq!(encoded[LIMITED_SUPPORT_KEY], "false");
        assert_eq!(encoded[ORCHESTRATION_ENABLED_KEY], "true");
        assert_eq!(decode(&encoded).unwrap(), record);
    }

    #[test]
    fn test_decode_legacy_record_without_orchestration_keys() {
        let record = decode(&data(&[
            (SERVICE_ID_KEY, "P1"),
            (INTEGRATION_ID_KEY, "I1"),
            (ESCALATION_POLICY_ID_KEY, "EP1"),
            (HIBERNATING_KEY, "false"),
            (LIMITED_SUPPORT_KEY, "true"),
            ("CLUSTER_ID", "ignored"),
        ]))
        .unwrap();
        assert_eq!(record.service_id, Some(ServiceId::new("P1")));
        assert!(record.limited_support);
        assert!(!record.orchestration_enabled);
        assert!(!record.orchestration_rule_applied);
    }

    #[test]
    fn test_decode_empty_service_id_is_not_created() {
        let record = decode(&data(&[(SERVICE_ID_KEY, "")])).unwrap();
        assert!(!record.is_created());
        assert!(record.integration_id.is_none());
    }

    #[test]
    fn test_decode_rejects_bad_boolean() {
        let err = decode(&data(&[(HIBERNATING_KEY, "yes")])).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidData {
                key: HIBERNATING_KEY.to_string(),
                value: "yes".to_string(),
            }
        );
    }
}
