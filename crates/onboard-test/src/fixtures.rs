//! Test fixtures for common declaration patterns
//!
//! Provides reusable bodies and a builder for configuration trees

use onboard_orch_common::{ConfigTree, Diff, COMMON_PARTITION};
use serde_json::{json, Value};

/// Traffic group for non-floating self IPs
pub const LOCAL_ONLY_TRAFFIC_GROUP: &str = "traffic-group-local-only";

/// Default floating traffic group
pub const FLOATING_TRAFFIC_GROUP: &str = "traffic-group-1";

/// Builds a configuration tree one object at a time
#[derive(Debug, Default, Clone)]
pub struct TreeBuilder {
    tree: ConfigTree,
}

impl TreeBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the Common tenant
    pub fn common(self, class: &str, name: &str, body: Value) -> Self {
        self.object(COMMON_PARTITION, class, name, body)
    }

    /// Add an object to any tenant
    pub fn object(mut self, tenant: &str, class: &str, name: &str, body: Value) -> Self {
        self.tree.insert_object(tenant, class, name, body);
        self
    }

    /// Set a singleton class in the Common tenant
    pub fn common_class(mut self, class: &str, value: Value) -> Self {
        self.tree.insert_class(COMMON_PARTITION, class, value);
        self
    }

    /// Finish building
    pub fn build(self) -> ConfigTree {
        self.tree
    }
}

/// Diff with only updates
pub fn update_only(to_update: ConfigTree) -> Diff {
    Diff::new(to_update, ConfigTree::new())
}

/// Diff with only deletes
pub fn delete_only(to_delete: ConfigTree) -> Diff {
    Diff::new(ConfigTree::new(), to_delete)
}

/// Object body fixtures
pub mod bodies {
    use super::*;

    /// Non-floating self IP
    pub fn self_ip(address: &str, vlan: &str) -> Value {
        json!({
            "address": address,
            "vlan": vlan,
            "trafficGroup": LOCAL_ONLY_TRAFFIC_GROUP,
            "allowService": "default"
        })
    }

    /// Floating self IP
    pub fn floating_self_ip(address: &str, vlan: &str) -> Value {
        json!({
            "address": address,
            "vlan": vlan,
            "trafficGroup": FLOATING_TRAFFIC_GROUP,
            "allowService": "none"
        })
    }

    /// Static route through a gateway
    pub fn route(gw: &str, network: &str) -> Value {
        json!({ "gw": gw, "network": network, "mtu": 0 })
    }

    /// Static route in the LOCAL_ONLY partition
    pub fn local_only_route(gw: &str, network: &str) -> Value {
        json!({ "gw": gw, "network": network, "mtu": 0, "localOnly": true })
    }

    /// Route domain
    pub fn route_domain(id: u32, vlans: &[&str]) -> Value {
        json!({ "id": id, "vlans": vlans })
    }

    /// Route domain without a VLAN list
    pub fn route_domain_without_vlans(id: u32) -> Value {
        json!({ "id": id })
    }

    /// VLAN
    pub fn vlan(tag: u16) -> Value {
        json!({ "tag": tag, "mtu": 1500, "interfaces": [] })
    }

    /// Tunnel with a profile
    pub fn tunnel(profile: &str) -> Value {
        json!({ "profile": profile, "mtu": 0 })
    }

    /// Route map or prefix list with entries
    pub fn routing_object(route_domain: &str, entries: Value) -> Value {
        json!({ "routeDomain": route_domain, "entries": entries })
    }

    /// GSLB monitor of a given type
    pub fn gslb_monitor(monitor_type: &str) -> Value {
        json!({ "monitorType": monitor_type, "interval": 30 })
    }
}
