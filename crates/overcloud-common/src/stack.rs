//! Deployed stack record, as returned by the orchestration service.

use crate::constants::ROLE_NET_IP_MAP_OUTPUT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// A single stack output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackOutput {
    pub output_key: String,
    #[serde(default)]
    pub output_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The declarative deployment record describing cluster resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stack {
    pub id: String,
    pub stack_name: String,
    #[serde(default)]
    pub stack_status: String,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

impl Stack {
    pub fn new(id: impl Into<String>, stack_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stack_name: stack_name.into(),
            stack_status: String::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.outputs.push(StackOutput {
            output_key: key.into(),
            output_value: value,
            description: None,
        });
        self
    }

    /// Look up an output value by key
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs
            .iter()
            .find(|o| o.output_key == key)
            .map(|o| &o.output_value)
    }

    /// Addresses of every overcloud host on `network`.
    ///
    /// Reads the `RoleNetIpMap` output (`role -> network -> [ip]`). The result
    /// is sorted and free of duplicates; roles without the network are skipped.
    pub fn overcloud_hosts(&self, network: &str) -> Vec<String> {
        let Some(Value::Object(roles)) = self.output(ROLE_NET_IP_MAP_OUTPUT) else {
            return Vec::new();
        };

        let hosts: BTreeSet<String> = roles
            .values()
            .filter_map(|nets| nets.get(network))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        hosts.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_stack() -> Stack {
        Stack::new("abc-123", "overcloud").with_output(
            ROLE_NET_IP_MAP_OUTPUT,
            json!({
                "Controller": {"ctlplane": ["192.168.24.10", "192.168.24.11"], "external": ["10.0.0.5"]},
                "Compute": {"ctlplane": ["192.168.24.20", "192.168.24.10"]},
                "CephStorage": {"storage": ["172.16.1.4"]}
            }),
        )
    }

    #[test]
    fn test_output_lookup() {
        let stack = test_stack();
        assert!(stack.output(ROLE_NET_IP_MAP_OUTPUT).is_some());
        assert!(stack.output("KeystoneURL").is_none());
    }

    #[test]
    fn test_overcloud_hosts_sorted_and_deduplicated() {
        let hosts = test_stack().overcloud_hosts("ctlplane");
        assert_eq!(
            hosts,
            vec!["192.168.24.10", "192.168.24.11", "192.168.24.20"]
        );
    }

    #[test]
    fn test_overcloud_hosts_without_output() {
        let stack = Stack::new("abc-123", "overcloud");
        assert!(stack.overcloud_hosts("ctlplane").is_empty());
    }

    #[test]
    fn test_deserialize_heat_stack() {
        let stack: Stack = serde_json::from_value(json!({
            "id": "abc-123",
            "stack_name": "overcloud",
            "stack_status": "UPDATE_COMPLETE",
            "outputs": [{"output_key": "KeystoneURL", "output_value": "http://10.0.0.5:5000"}],
            "parameters": {"ignored": true}
        }))
        .unwrap();

        assert_eq!(stack.stack_status, "UPDATE_COMPLETE");
        assert_eq!(
            stack.output("KeystoneURL"),
            Some(&json!("http://10.0.0.5:5000"))
        );
    }
}
