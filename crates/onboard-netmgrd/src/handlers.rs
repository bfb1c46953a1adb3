//! Concrete handlers, run in a fixed order by the pipeline

use async_trait::async_trait;
use futures::future::try_join_all;
use onboard_orch_common::{
    ApplyError, ApplyResult, ConfigTree, CurrentConfig, Diff, Handler, HandlerStatus,
    ObjectStore, Operation, Phase, RetryPolicy, StoreResultExt, TransactionItem,
    COMMON_PARTITION,
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::commands::*;
use crate::delete_mgr::DeleteMgr;
use crate::route_domain_mgr::RouteDomainMgr;
use crate::routing::RoutingMgr;
use crate::self_ip_mgr::SelfIpMgr;
use crate::tables::classes::*;
use crate::tables::*;
use crate::types::{decode, GslbMonitor};

/// Handlers in the order they must run
pub fn default_handlers() -> Vec<Box<dyn Handler>> {
    vec![
        Box::new(NetworkHandler),
        Box::new(AuthHandler),
        Box::new(ProvisionHandler),
        Box::new(GslbHandler),
        Box::new(DeleteHandler),
        Box::new(DeprovisionHandler),
    ]
}

/// Write every object of `class` in `tree` with createOrModify, concurrently
async fn upsert_class(
    store: &dyn ObjectStore,
    tree: &ConfigTree,
    class: &str,
    retry: RetryPolicy,
) -> ApplyResult<()> {
    let mut ops = Vec::new();
    for (tenant, _) in tree.tenants() {
        for (name, body) in tree.objects(tenant, class) {
            ops.push(build_upsert_op(class, tenant, name, body)?.with_retry(retry));
        }
    }
    if ops.is_empty() {
        return Ok(());
    }

    info!(class, count = ops.len(), "Applying");
    try_join_all(ops.iter().map(|op| op.execute(store)))
        .await
        .map(drop)
        .in_phase(Phase::Apply, class)
}

/// Network classes: interfaces, addressing, routing and firewall lists
pub struct NetworkHandler;

impl NetworkHandler {
    async fn apply_routes(store: &dyn ObjectStore, to_update: &ConfigTree) -> ApplyResult<()> {
        let mut ops = Vec::new();
        for (tenant, _) in to_update.tenants() {
            for (name, body) in to_update.objects(tenant, ROUTE) {
                let local_only = body.get("localOnly").and_then(Value::as_bool) == Some(true);
                let partition = if local_only {
                    LOCAL_ONLY_PARTITION
                } else {
                    tenant
                };
                ops.push(
                    Operation::create_or_modify(
                        class_object_path(ROUTE, partition, name)?,
                        body.clone(),
                    )
                    .with_retry(RetryPolicy::MEDIUM),
                );
            }
        }
        if ops.is_empty() {
            return Ok(());
        }

        info!(count = ops.len(), "Applying routes");
        try_join_all(ops.iter().map(|op| op.execute(store)))
            .await
            .map(drop)
            .in_phase(Phase::Apply, ROUTE)
    }
}

#[async_trait]
impl Handler for NetworkHandler {
    fn name(&self) -> &str {
        "NetworkHandler"
    }

    #[instrument(skip_all)]
    async fn process(
        &self,
        diff: &Diff,
        store: &dyn ObjectStore,
        state: &CurrentConfig,
    ) -> ApplyResult<HandlerStatus> {
        let to_update = &diff.to_update;
        for class in NETWORK_APPLY_ORDER {
            match *class {
                ROUTE_DOMAIN => {
                    RouteDomainMgr::new(store, state)
                        .process(to_update, &diff.to_delete)
                        .await?
                }
                SELF_IP => SelfIpMgr::new(store, state).process(to_update).await?,
                ROUTE => Self::apply_routes(store, to_update).await?,
                ROUTING_PREFIX_LIST | ROUTE_MAP => {
                    RoutingMgr::new(store, state)
                        .process_class(class, to_update)
                        .await?
                }
                _ => upsert_class(store, to_update, class, RetryPolicy::NONE).await?,
            }
        }
        Ok(HandlerStatus::new())
    }
}

/// Remote authentication settings and remote roles
pub struct AuthHandler;

#[async_trait]
impl Handler for AuthHandler {
    fn name(&self) -> &str {
        "AuthHandler"
    }

    #[instrument(skip_all)]
    async fn process(
        &self,
        diff: &Diff,
        store: &dyn ObjectStore,
        _state: &CurrentConfig,
    ) -> ApplyResult<HandlerStatus> {
        if let Some(auth) = diff.to_update.class(COMMON_PARTITION, AUTHENTICATION) {
            for kind in AUTH_KINDS {
                let Some(body) = auth.get(kind) else {
                    continue;
                };
                info!(kind, "Applying remote auth configuration");
                Operation::create_or_modify(auth_object_path(kind, SYSTEM_AUTH_NAME), body.clone())
                    .execute(store)
                    .await
                    .in_phase(Phase::Apply, AUTHENTICATION)?;
            }
        }

        upsert_class(store, &diff.to_update, REMOTE_AUTH_ROLE, RetryPolicy::NONE).await?;
        Ok(HandlerStatus::new())
    }
}

/// A module level change
#[derive(Debug, Clone, PartialEq)]
struct LevelChange {
    module: String,
    from: String,
    to: String,
}

impl LevelChange {
    /// Moving into or out of `dedicated` reallocates resources
    fn needs_reboot(&self) -> bool {
        (self.from == LEVEL_DEDICATED) != (self.to == LEVEL_DEDICATED)
    }
}

/// Level changes declared for `Provision`, filtered by target level
fn level_changes(diff: &Diff, state: &CurrentConfig, deprovision: bool) -> Vec<LevelChange> {
    let Some(Value::Object(declared)) = diff.to_update.class(COMMON_PARTITION, PROVISION) else {
        return Vec::new();
    };
    let current = state.class(COMMON_PARTITION, PROVISION);

    declared
        .iter()
        .filter_map(|(module, level)| Some((module, level.as_str()?)))
        .filter(|(_, to)| (*to == LEVEL_NONE) == deprovision)
        .filter_map(|(module, to)| {
            let from = current
                .and_then(|c| c.get(module))
                .and_then(Value::as_str)
                .unwrap_or(LEVEL_NONE);
            if from == to {
                debug!(module = %module, level = to, "Provisioning unchanged");
                return None;
            }
            Some(LevelChange {
                module: module.clone(),
                from: from.to_string(),
                to: to.to_string(),
            })
        })
        .collect()
}

/// Apply level changes one module at a time
async fn apply_levels(
    store: &dyn ObjectStore,
    changes: &[LevelChange],
    rollback_key: &str,
) -> ApplyResult<HandlerStatus> {
    let mut previous = Map::new();
    let mut reboot_required = false;

    for change in changes {
        info!(
            module = %change.module,
            from = %change.from,
            to = %change.to,
            "Changing provisioning level"
        );
        build_provision_op(&change.module, &change.to)
            .execute(store)
            .await
            .in_phase(Phase::Apply, PROVISION)?;
        previous.insert(change.module.clone(), Value::String(change.from.clone()));
        reboot_required |= change.needs_reboot();
    }

    let mut status = HandlerStatus::new().with_reboot_required(reboot_required);
    if !previous.is_empty() {
        status = status.with_rollback(rollback_key, Value::Object(previous));
    }
    Ok(status)
}

/// Module provisioning to any level other than `none`
pub struct ProvisionHandler;

#[async_trait]
impl Handler for ProvisionHandler {
    fn name(&self) -> &str {
        "ProvisionHandler"
    }

    #[instrument(skip_all)]
    async fn process(
        &self,
        diff: &Diff,
        store: &dyn ObjectStore,
        state: &CurrentConfig,
    ) -> ApplyResult<HandlerStatus> {
        apply_levels(store, &level_changes(diff, state, false), "provision").await
    }
}

/// Module deprovisioning, once nothing depends on the modules any more
pub struct DeprovisionHandler;

#[async_trait]
impl Handler for DeprovisionHandler {
    fn name(&self) -> &str {
        "DeprovisionHandler"
    }

    #[instrument(skip_all)]
    async fn process(
        &self,
        diff: &Diff,
        store: &dyn ObjectStore,
        state: &CurrentConfig,
    ) -> ApplyResult<HandlerStatus> {
        apply_levels(store, &level_changes(diff, state, true), "deprovision").await
    }
}

/// GSLB data centers, prober pools, servers and monitors
pub struct GslbHandler;

impl GslbHandler {
    async fn apply_monitors(store: &dyn ObjectStore, to_update: &ConfigTree) -> ApplyResult<()> {
        for (tenant, _) in to_update.tenants() {
            for (name, body) in to_update.objects(tenant, GSLB_MONITOR) {
                let monitor: GslbMonitor = decode(GSLB_MONITOR, name, body)?;
                let monitor_type = monitor.monitor_type.ok_or_else(|| {
                    ApplyError::invalid_object(GSLB_MONITOR, name, "monitorType is required")
                })?;
                Operation::create_or_modify(monitor_path(&monitor_type, tenant, name), body.clone())
                    .execute(store)
                    .await
                    .in_phase(Phase::Apply, GSLB_MONITOR)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for GslbHandler {
    fn name(&self) -> &str {
        "GslbHandler"
    }

    #[instrument(skip_all)]
    async fn process(
        &self,
        diff: &Diff,
        store: &dyn ObjectStore,
        state: &CurrentConfig,
    ) -> ApplyResult<HandlerStatus> {
        let to_update = &diff.to_update;
        Self::apply_monitors(store, to_update).await?;

        // New members may reference each other, so they are created together
        let mut creates = Vec::new();
        let mut modifies = Vec::new();
        for class in [GSLB_DATA_CENTER, GSLB_PROBER_POOL, GSLB_SERVER] {
            for (tenant, _) in to_update.tenants() {
                for (name, body) in to_update.objects(tenant, class) {
                    let path = class_object_path(class, tenant, name)?;
                    if state.contains(tenant, class, name) {
                        modifies.push((class, Operation::modify(path, body.clone())));
                    } else {
                        creates.push(TransactionItem::create(path, body.clone()));
                    }
                }
            }
        }

        if !creates.is_empty() {
            info!(count = creates.len(), "Creating GSLB objects");
            store
                .transaction(creates)
                .await
                .in_phase(Phase::Apply, GSLB_SERVER)?;
        }
        for (class, op) in &modifies {
            op.execute(store).await.in_phase(Phase::Apply, class)?;
        }
        Ok(HandlerStatus::new())
    }
}

/// Removes objects present only in current state
pub struct DeleteHandler;

#[async_trait]
impl Handler for DeleteHandler {
    fn name(&self) -> &str {
        "DeleteHandler"
    }

    async fn process(
        &self,
        diff: &Diff,
        store: &dyn ObjectStore,
        state: &CurrentConfig,
    ) -> ApplyResult<HandlerStatus> {
        DeleteMgr::new(store, state).process(&diff.to_delete).await?;
        Ok(HandlerStatus::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboard_test::{bodies, update_only, OpVerifier, RecordingStore, TreeBuilder};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_default_handler_order() {
        let names: Vec<String> = default_handlers()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "NetworkHandler",
                "AuthHandler",
                "ProvisionHandler",
                "GslbHandler",
                "DeleteHandler",
                "DeprovisionHandler",
            ]
        );
    }

    #[tokio::test]
    async fn test_network_classes_in_dependency_order() {
        let diff = update_only(
            TreeBuilder::new()
                .common("FirewallPolicy", "fp1", json!({}))
                .common("Route", "r1", bodies::route("10.0.0.1", "default"))
                .common("Route", "r2", bodies::local_only_route("10.0.0.1", "10.1.0.0/16"))
                .common("VLAN", "v1", bodies::vlan(10))
                .common("Trunk", "t1", json!({}))
                .build(),
        );
        let store = RecordingStore::new();

        NetworkHandler
            .process(&diff, &store, &CurrentConfig::new())
            .await
            .unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![
                "createOrModify /tm/net/trunk/~Common~t1",
                "createOrModify /tm/net/vlan/~Common~v1",
                "createOrModify /tm/net/route/~Common~r1",
                "createOrModify /tm/net/route/~LOCAL_ONLY~r2",
                "createOrModify /tm/security/firewall/policy/~Common~fp1",
            ]
        );
    }

    #[tokio::test]
    async fn test_auth_passthrough() {
        let diff = update_only(
            TreeBuilder::new()
                .common_class("Authentication", json!({"radius": {"servers": {}}}))
                .common("RemoteAuthRole", "admins", json!({"role": "admin"}))
                .build(),
        );
        let store = RecordingStore::new();

        AuthHandler
            .process(&diff, &store, &CurrentConfig::new())
            .await
            .unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![
                "createOrModify /tm/auth/radius/system-auth",
                "createOrModify /tm/auth/remote-role/role-info/admins",
            ]
        );
    }

    #[tokio::test]
    async fn test_provision_and_deprovision_split() {
        let diff = update_only(
            TreeBuilder::new()
                .common_class(
                    "Provision",
                    json!({"ltm": "nominal", "gtm": "none", "asm": "dedicated", "avr": "nominal"}),
                )
                .build(),
        );
        let state = TreeBuilder::new()
            .common_class("Provision", json!({"ltm": "nominal", "gtm": "minimum"}))
            .build();
        let store = RecordingStore::new();

        let status = ProvisionHandler.process(&diff, &store, &state).await.unwrap();
        assert!(status.reboot_required);
        assert_eq!(
            status.rollback_info.get("provision"),
            Some(&json!({"asm": "none", "avr": "none"}))
        );
        assert_eq!(
            store.mutation_labels(),
            vec!["modify /tm/sys/provision/asm", "modify /tm/sys/provision/avr"]
        );

        store.clear_calls();
        let status = DeprovisionHandler.process(&diff, &store, &state).await.unwrap();
        assert!(!status.reboot_required);
        assert_eq!(
            status.rollback_info.get("deprovision"),
            Some(&json!({"gtm": "minimum"}))
        );
        assert_eq!(store.mutations()[0].body(), Some(&json!({"level": "none"})));
    }

    #[tokio::test]
    async fn test_gslb_new_objects_share_transaction() {
        let diff = update_only(
            TreeBuilder::new()
                .common("GSLBMonitor", "m1", bodies::gslb_monitor("http"))
                .common("GSLBDataCenter", "dc1", json!({}))
                .common("GSLBServer", "srv1", json!({"dataCenter": "/Common/dc1"}))
                .common("GSLBProberPool", "pool1", json!({}))
                .common("GSLBServer", "srv0", json!({}))
                .build(),
        );
        let state = TreeBuilder::new()
            .common("GSLBServer", "srv0", json!({}))
            .build();
        let store = RecordingStore::new();

        GslbHandler.process(&diff, &store, &state).await.unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![
                "createOrModify /tm/gtm/monitor/http/~Common~m1",
                "transaction[create /tm/gtm/datacenter/~Common~dc1, create /tm/gtm/prober-pool/~Common~pool1, create /tm/gtm/server/~Common~srv1]",
                "modify /tm/gtm/server/~Common~srv0",
            ]
        );
    }

    #[tokio::test]
    async fn test_gslb_monitor_needs_type() {
        let diff = update_only(
            TreeBuilder::new()
                .common("GSLBMonitor", "m1", json!({"interval": 30}))
                .build(),
        );
        let store = RecordingStore::new();

        let err = GslbHandler
            .process(&diff, &store, &CurrentConfig::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::InvalidObject { .. }));
    }

    #[tokio::test]
    async fn test_delete_handler_runs_delete_mgr() {
        let diff = onboard_test::delete_only(
            TreeBuilder::new()
                .common("VLAN", "v1", json!({}))
                .build(),
        );
        let store = RecordingStore::new();

        DeleteHandler
            .process(&diff, &store, &CurrentConfig::new())
            .await
            .unwrap();

        OpVerifier::new(&store.mutations())
            .assert_count("delete /tm/net/vlan", 1)
            .unwrap();
    }
}
