//! Typed views of declaration bodies
//!
//! Only the fields the engine reasons about are named; everything else is
//! kept in `extra` so a body re-serializes unchanged.

use onboard_orch_common::{ApplyError, ApplyResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tables::{DEFAULT_ROUTE_DOMAIN_NAME, LOCAL_ONLY_TRAFFIC_GROUP, VXLAN_PROFILE};

/// Decodes an object body into a typed record
pub fn decode<T: DeserializeOwned>(class: &str, name: &str, body: &Value) -> ApplyResult<T> {
    serde_json::from_value(body.clone())
        .map_err(|e| ApplyError::invalid_object(class, name, e.to_string()))
}

/// Self IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfIp {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_group: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SelfIp {
    /// Floating self IPs belong to a traffic group other than local-only
    pub fn is_floating(&self) -> bool {
        self.traffic_group
            .as_deref()
            .is_some_and(|tg| !tg.ends_with(LOCAL_ONLY_TRAFFIC_GROUP))
    }
}

/// Static route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub local_only: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Route domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDomain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// `None` when the VLAN list is untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlans: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RouteDomain {
    pub fn is_default(&self) -> bool {
        self.id == Some(0)
    }
}

/// Tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tunnel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tunnel {
    /// VXLAN tunnels carry a companion object that must go with them
    pub fn has_vxlan_companion(&self) -> bool {
        self.profile.as_deref() == Some(VXLAN_PROFILE)
    }
}

/// Route map or routing prefix list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_domain: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoutingObject {
    /// Route domain as a comparable string; `0`, `"0"` and an absent
    /// value are the same
    pub fn route_domain_key(&self) -> String {
        match self.route_domain.as_ref() {
            Some(Value::String(s)) => s.trim_start_matches("/Common/").to_string(),
            None | Some(Value::Null) => DEFAULT_ROUTE_DOMAIN_NAME.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// GSLB monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GslbMonitor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Serializes a record back into a body
pub fn encode<T: Serialize>(record: &T) -> ApplyResult<Value> {
    Ok(serde_json::to_value(record)?)
}
