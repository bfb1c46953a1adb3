//! Appliance path and operation builders

use onboard_orch_common::{ApplyError, ApplyResult, Operation, RetryPolicy, COMMON_PARTITION};
use serde_json::{json, Value};

use crate::tables::{
    classes, collection_path, AUTH_PATH, DEFAULT_ROUTE_DOMAIN_NAME, DEVICE_PATH, PROVISION_PATH,
    VXLAN_COMPANION_SUFFIX,
};

/// Build an object path: `<collection>/~<partition>~<name>`
pub fn object_path(collection: &str, partition: &str, name: &str) -> String {
    format!("{}/~{}~{}", collection, partition, name)
}

/// Build the object path of a class member
pub fn class_object_path(class: &str, partition: &str, name: &str) -> ApplyResult<String> {
    let collection = collection_path(class).ok_or_else(|| {
        ApplyError::invalid_object(class, name, "no appliance collection for class")
    })?;
    Ok(object_path(collection, partition, name))
}

/// Build a route domain path
///
/// The default domain is always addressed as `0`.
pub fn route_domain_path(name: &str, is_default: bool) -> String {
    let name = if is_default {
        DEFAULT_ROUTE_DOMAIN_NAME
    } else {
        name
    };
    object_path("/tm/net/route-domain", COMMON_PARTITION, name)
}

/// Build a GSLB monitor path, which carries the monitor type
pub fn monitor_path(monitor_type: &str, partition: &str, name: &str) -> String {
    object_path(
        &format!("/tm/gtm/monitor/{}", monitor_type),
        partition,
        name,
    )
}

/// Build a remote role path; roles are not partitioned
pub fn remote_role_path(name: &str) -> String {
    format!("/tm/auth/remote-role/role-info/{}", name)
}

/// Build the tunnel companion path
pub fn tunnel_companion_path(partition: &str, tunnel: &str) -> String {
    object_path(
        "/tm/net/tunnels/tunnel",
        partition,
        &format!("{}{}", tunnel, VXLAN_COMPANION_SUFFIX),
    )
}

/// Build the collection path of a remote authentication kind
pub fn auth_collection_path(kind: &str) -> String {
    format!("{}/{}", AUTH_PATH, kind)
}

/// Build the path of a remote authentication object
pub fn auth_object_path(kind: &str, name: &str) -> String {
    format!("{}/{}/{}", AUTH_PATH, kind, name)
}

/// Build a provisioning path
pub fn provision_path(module: &str) -> String {
    format!("{}/{}", PROVISION_PATH, module)
}

/// Build a cluster device path
pub fn device_path(device: &str) -> String {
    object_path(DEVICE_PATH, COMMON_PARTITION, device)
}

/// Build the operation that sets the sync address of a device
pub fn build_config_sync_op(device: &str, address: &str) -> Operation {
    Operation::modify(device_path(device), json!({ "configsyncIp": address }))
}

/// Build a provisioning level change
pub fn build_provision_op(module: &str, level: &str) -> Operation {
    Operation::modify(provision_path(module), json!({ "level": level }))
        .with_retry(RetryPolicy::MEDIUM)
}

/// Build a delete of the tunnel companion
///
/// The companion may already be gone with its tunnel.
pub fn build_companion_delete_op(partition: &str, tunnel: &str) -> Operation {
    Operation::delete(tunnel_companion_path(partition, tunnel))
        .with_retry(RetryPolicy::NONE.continue_on("was not found"))
}

/// Build a pass-through write of a declared object
pub fn build_upsert_op(class: &str, partition: &str, name: &str, body: &Value) -> ApplyResult<Operation> {
    let path = match class {
        classes::REMOTE_AUTH_ROLE => remote_role_path(name),
        _ => class_object_path(class, partition, name)?,
    };
    Ok(Operation::create_or_modify(path, body.clone()))
}

/// Split an object path into collection, partition and name
///
/// `/tm/net/self/~Common~s1` gives `("/tm/net/self", Some("Common"), "s1")`;
/// an unpartitioned path gives `None` for the partition.
pub fn split_object_path(path: &str) -> Option<(&str, Option<&str>, &str)> {
    let (collection, last) = path.rsplit_once('/')?;
    if collection.is_empty() || last.is_empty() {
        return None;
    }
    match last.strip_prefix('~').and_then(|rest| rest.split_once('~')) {
        Some((partition, name)) => Some((collection, Some(partition), name)),
        None => Some((collection, None, last)),
    }
}
