//! Per-handler outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What a handler reports after processing its slice of the diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerStatus {
    /// The appliance must reboot for the change to take effect
    pub reboot_required: bool,
    /// Prior values a caller can use to undo this handler's changes
    pub rollback_info: BTreeMap<String, Value>,
}

impl HandlerStatus {
    /// Creates an empty status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the status as requiring a reboot.
    pub fn with_reboot_required(mut self, reboot_required: bool) -> Self {
        self.reboot_required = reboot_required;
        self
    }

    /// Records rollback information under `key`.
    pub fn with_rollback(mut self, key: impl Into<String>, value: Value) -> Self {
        self.rollback_info.insert(key.into(), value);
        self
    }

    /// Folds `other` into this status; later keys win.
    pub fn merge(&mut self, other: &HandlerStatus) {
        self.reboot_required |= other.reboot_required;
        self.rollback_info.extend(
            other
                .rollback_info
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    /// Aggregates a sequence of statuses.
    pub fn merge_all<'a>(statuses: impl IntoIterator<Item = &'a HandlerStatus>) -> Self {
        let mut total = HandlerStatus::new();
        for status in statuses {
            total.merge(status);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_all() {
        let a = HandlerStatus::new().with_rollback("provision", json!({"ltm": "nominal"}));
        let b = HandlerStatus::new().with_reboot_required(true);
        let c = HandlerStatus::new();

        let total = HandlerStatus::merge_all([&a, &b, &c]);
        assert!(total.reboot_required);
        assert_eq!(total.rollback_info.get("provision"), Some(&json!({"ltm": "nominal"})));

        assert!(!HandlerStatus::merge_all([&a, &c]).reboot_required);
    }

    #[test]
    fn test_serialization() {
        let status = HandlerStatus::new().with_reboot_required(true);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"rebootRequired": true, "rollbackInfo": {}})
        );
    }
}
