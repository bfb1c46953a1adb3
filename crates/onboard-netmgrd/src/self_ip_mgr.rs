//! Self IP Manager - replaces self IPs the appliance cannot modify in place
//!
//! Deleting a self IP is rejected while a floating peer in its subnet, a
//! static route through it, or the cluster sync address still depends on it.
//! Those dependents are released first and put back afterwards:
//!
//! 1. clear the sync address if it is going away
//! 2. delete dependent routes, then dependent floaters, then the targets
//! 3. create non-floating targets, then floating targets
//! 4. recreate dependent floaters, restore the sync address, recreate routes

use futures::future::try_join_all;
use onboard_orch_common::{
    ApplyError, ApplyResult, ConfigTree, CurrentConfig, ObjectStore, Operation, Phase,
    RetryPolicy, StoreResultExt, COMMON_PARTITION,
};
use onboard_types::{address_in_subnet, addresses_match};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

use crate::commands::*;
use crate::tables::classes::*;
use crate::tables::*;
use crate::types::{decode, Route, SelfIp};

/// A declared self IP
#[derive(Debug)]
struct Target<'t> {
    partition: &'t str,
    name: &'t str,
    body: &'t Value,
    path: String,
    /// Current record, when the appliance has one
    current: Option<SelfIp>,
    declared: SelfIp,
    exists: bool,
}

impl Target<'_> {
    /// The subnet being torn down: the current address if known
    fn subnet_owner(&self) -> &str {
        self.current
            .as_ref()
            .map_or(&self.declared.address, |c| &c.address)
    }

    fn is_floating_now(&self) -> bool {
        self.current.as_ref().unwrap_or(&self.declared).is_floating()
    }
}

/// An object removed only to unblock a self IP delete
#[derive(Debug, Clone, PartialEq)]
struct Dependent {
    path: String,
    body: Value,
    recreate: bool,
}

/// Ordered work for one run
#[derive(Debug, Default)]
struct SelfIpPlan {
    routes: Vec<Dependent>,
    floaters: Vec<Dependent>,
    /// Sync address to restore after recreation
    sync_address: Option<String>,
}

/// Self IP Manager
pub struct SelfIpMgr<'a> {
    store: &'a dyn ObjectStore,
    state: &'a CurrentConfig,
}

impl<'a> SelfIpMgr<'a> {
    /// Create a new SelfIpMgr over a store and the current appliance state
    pub fn new(store: &'a dyn ObjectStore, state: &'a CurrentConfig) -> Self {
        Self { store, state }
    }

    /// Apply every `SelfIp` in `to_update`
    #[instrument(skip_all)]
    pub async fn process(&self, to_update: &ConfigTree) -> ApplyResult<()> {
        let mut targets = self.collect_targets(to_update)?;
        if targets.is_empty() {
            return Ok(());
        }

        self.probe_existence(&mut targets).await?;
        let plan = self.plan(to_update, &targets)?;

        info!(
            targets = targets.len(),
            existing = targets.iter().filter(|t| t.exists).count(),
            routes = plan.routes.len(),
            floaters = plan.floaters.len(),
            clear_sync = plan.sync_address.is_some(),
            "Applying self IPs"
        );
        self.execute(&targets, &plan).await
    }

    fn collect_targets<'t>(&self, to_update: &'t ConfigTree) -> ApplyResult<Vec<Target<'t>>> {
        let mut targets = Vec::new();
        for (tenant, _) in to_update.tenants() {
            for (name, body) in to_update.objects(tenant, SELF_IP) {
                let current = self
                    .state
                    .object(tenant, SELF_IP, name)
                    .map(|b| decode::<SelfIp>(SELF_IP, name, b))
                    .transpose()?;
                targets.push(Target {
                    partition: tenant,
                    name,
                    body,
                    path: class_object_path(SELF_IP, tenant, name)?,
                    current,
                    declared: decode(SELF_IP, name, body)?,
                    exists: false,
                });
            }
        }
        Ok(targets)
    }

    /// A 404 means absent; anything else aborts the run
    async fn probe_existence(&self, targets: &mut [Target<'_>]) -> ApplyResult<()> {
        let store = self.store;
        let found = try_join_all(targets.iter().map(|t| async move {
            match store.list(&t.path, RetryPolicy::SHORT).await {
                Ok(_) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            }
        }))
        .await
        .in_phase(Phase::Apply, SELF_IP)?;

        for (target, exists) in targets.iter_mut().zip(found) {
            debug!(name = target.name, exists, "Probed self IP");
            target.exists = exists;
        }
        Ok(())
    }

    fn plan(&self, to_update: &ConfigTree, targets: &[Target<'_>]) -> ApplyResult<SelfIpPlan> {
        let mut plan = SelfIpPlan::default();
        let target_keys: BTreeSet<(&str, &str)> =
            targets.iter().map(|t| (t.partition, t.name)).collect();
        let mut deleted_addresses: Vec<String> = Vec::new();

        for target in targets.iter().filter(|t| t.exists) {
            let owner = target.subnet_owner();
            deleted_addresses.push(owner.to_string());

            for (tenant, _) in self.state.tenants() {
                for (name, body) in self.state.objects(tenant, ROUTE) {
                    let route: Route = decode(ROUTE, name, body)?;
                    let Some(gw) = route.gw.as_deref() else {
                        continue;
                    };
                    if !address_in_subnet(gw, owner) {
                        continue;
                    }
                    let partition = if route.local_only {
                        LOCAL_ONLY_PARTITION
                    } else {
                        tenant
                    };
                    let path = class_object_path(ROUTE, partition, name)?;
                    if plan.routes.iter().any(|r| r.path == path) {
                        continue;
                    }
                    plan.routes.push(Dependent {
                        path,
                        body: body.clone(),
                        recreate: !to_update.contains(tenant, ROUTE, name),
                    });
                }
            }

            if target.is_floating_now() {
                continue;
            }
            for (tenant, _) in self.state.tenants() {
                for (name, body) in self.state.objects(tenant, SELF_IP) {
                    if target_keys.contains(&(tenant, name)) {
                        continue;
                    }
                    let peer: SelfIp = decode(SELF_IP, name, body)?;
                    if !peer.is_floating() || !address_in_subnet(&peer.address, owner) {
                        continue;
                    }
                    let path = class_object_path(SELF_IP, tenant, name)?;
                    if plan.floaters.iter().any(|f| f.path == path) {
                        continue;
                    }
                    deleted_addresses.push(peer.address.clone());
                    plan.floaters.push(Dependent {
                        path,
                        body: body.clone(),
                        recreate: true,
                    });
                }
            }
        }

        if let Some(sync) = self.sync_address() {
            if deleted_addresses.iter().any(|a| addresses_match(sync, a)) {
                plan.sync_address = Some(sync.to_string());
            }
        }
        Ok(plan)
    }

    async fn execute(&self, targets: &[Target<'_>], plan: &SelfIpPlan) -> ApplyResult<()> {
        let device = match plan.sync_address {
            Some(_) => {
                let device = self.self_device().await?;
                info!(device = %device, "Clearing config sync address");
                build_config_sync_op(&device, "none")
                    .with_retry(RetryPolicy::SHORT)
                    .execute(self.store)
                    .await
                    .in_phase(Phase::Apply, CONFIG_SYNC)?;
                Some(device)
            }
            None => None,
        };

        self.run(ROUTE, plan.routes.iter().map(|r| Operation::delete(&r.path)))
            .await?;
        self.run(SELF_IP, plan.floaters.iter().map(|f| Operation::delete(&f.path)))
            .await?;

        let existing = || targets.iter().filter(|t| t.exists);
        self.run(
            SELF_IP,
            existing()
                .filter(|t| t.is_floating_now())
                .map(|t| Operation::delete(&t.path)),
        )
        .await?;
        self.run(
            SELF_IP,
            existing()
                .filter(|t| !t.is_floating_now())
                .map(|t| Operation::delete(&t.path)),
        )
        .await?;

        for floating in [false, true] {
            self.run(
                SELF_IP,
                targets
                    .iter()
                    .filter(|t| t.declared.is_floating() == floating)
                    .map(|t| create(&t.path, t.body)),
            )
            .await?;
        }

        self.run(
            SELF_IP,
            plan.floaters
                .iter()
                .filter(|f| f.recreate)
                .map(|f| create(&f.path, &f.body)),
        )
        .await?;

        if let (Some(device), Some(address)) = (device, plan.sync_address.as_deref()) {
            info!(device = %device, address, "Restoring config sync address");
            build_config_sync_op(&device, address)
                .with_retry(RetryPolicy::MEDIUM)
                .execute(self.store)
                .await
                .in_phase(Phase::Apply, CONFIG_SYNC)?;
        }

        self.run(
            ROUTE,
            plan.routes
                .iter()
                .filter(|r| r.recreate)
                .map(|r| create(&r.path, &r.body)),
        )
        .await
    }

    /// Run one group of same-class operations concurrently
    async fn run(&self, class: &str, ops: impl Iterator<Item = Operation>) -> ApplyResult<()> {
        let ops: Vec<Operation> = ops.collect();
        if ops.is_empty() {
            return Ok(());
        }
        let store = self.store;
        try_join_all(ops.iter().map(|op| op.execute(store)))
            .await
            .map(drop)
            .in_phase(Phase::Apply, class)
    }

    fn sync_address(&self) -> Option<&'a str> {
        self.state
            .class(COMMON_PARTITION, CONFIG_SYNC)
            .and_then(|c| c.get("configsyncIp"))
            .and_then(Value::as_str)
    }

    /// Look up the name of the local cluster device
    async fn self_device(&self) -> ApplyResult<String> {
        let devices = self
            .store
            .list(DEVICE_PATH, RetryPolicy::SHORT)
            .await
            .in_phase(Phase::Apply, CONFIG_SYNC)?;
        devices
            .iter()
            .find(|d| match d.get("selfDevice") {
                Some(Value::String(s)) => s == "true",
                Some(Value::Bool(b)) => *b,
                _ => false,
            })
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApplyError::missing_current_state(CONFIG_SYNC, "configsyncIp", "no self device")
            })
    }
}

fn create(path: &str, body: &Value) -> Operation {
    Operation::create(path, body.clone()).with_retry(RetryPolicy::MEDIUM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboard_test::{bodies, update_only, OpVerifier, RecordingStore, StoreCall, TreeBuilder};
    use onboard_orch_common::StoreError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const S1: &str = "/tm/net/self/~Common~s1";
    const F1: &str = "/tm/net/self/~Common~f1";

    async fn run(store: &RecordingStore, state: &CurrentConfig, to_update: &ConfigTree) -> ApplyResult<()> {
        SelfIpMgr::new(store, state).process(to_update).await
    }

    #[tokio::test]
    async fn test_address_change_replaces_self_ip() {
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", json!({"address": "10.0.0.5/24", "trafficGroup": "traffic-group-local-only"}))
            .build();
        let state = TreeBuilder::new()
            .common("SelfIp", "s1", json!({"address": "10.0.0.9/24", "trafficGroup": "traffic-group-local-only"}))
            .build();
        let store = RecordingStore::new().with_object(S1, json!({"name": "s1"}));

        run(&store, &state, &to_update).await.unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![format!("delete {}", S1), format!("create {}", S1)]
        );
        let created = &store.mutations()[1];
        assert_eq!(created.body().unwrap()["address"], "10.0.0.5/24");
    }

    #[tokio::test]
    async fn test_new_self_ip_is_only_created() {
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.5/24", "v1"))
            .build();
        let store = RecordingStore::new();

        run(&store, &CurrentConfig::new(), &to_update).await.unwrap();

        assert_eq!(store.mutation_labels(), vec![format!("create {}", S1)]);
        assert!(matches!(
            &store.mutations()[0],
            StoreCall::Create { retry, .. } if *retry == RetryPolicy::MEDIUM
        ));
    }

    #[tokio::test]
    async fn test_floating_peer_released_and_restored() {
        let floater = bodies::floating_self_ip("10.0.0.6/24", "v1");
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.1.5/24", "v1"))
            .build();
        let state = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.5/24", "v1"))
            .common("SelfIp", "f1", floater.clone())
            .build();
        let store = RecordingStore::new().with_object(S1, json!({}));

        run(&store, &state, &to_update).await.unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![
                format!("delete {}", F1),
                format!("delete {}", S1),
                format!("create {}", S1),
                format!("create {}", F1),
            ]
        );
        assert_eq!(store.mutations()[3].body(), Some(&floater));
    }

    #[tokio::test]
    async fn test_floater_in_target_set_is_not_a_side_effect() {
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.1.5/24", "v1"))
            .common("SelfIp", "f1", bodies::floating_self_ip("10.0.1.6/24", "v1"))
            .build();
        let state = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.5/24", "v1"))
            .common("SelfIp", "f1", bodies::floating_self_ip("10.0.0.6/24", "v1"))
            .build();
        let store = RecordingStore::new()
            .with_object(S1, json!({}))
            .with_object(F1, json!({}));

        run(&store, &state, &to_update).await.unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![
                format!("delete {}", F1),
                format!("delete {}", S1),
                format!("create {}", S1),
                format!("create {}", F1),
            ]
        );
        assert_eq!(
            store.mutations()[3].body().unwrap()["address"],
            "10.0.1.6/24"
        );
    }

    #[tokio::test]
    async fn test_routes_through_subnet_wrap_the_change() {
        let route = bodies::route("10.0.0.1", "default");
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.7/24", "v1"))
            .build();
        let state = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.5/24", "v1"))
            .common("Route", "r1", route.clone())
            .common("Route", "r2", bodies::route("192.168.1.1", "192.168.2.0/24"))
            .build();
        let store = RecordingStore::new().with_object(S1, json!({}));

        run(&store, &state, &to_update).await.unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![
                "delete /tm/net/route/~Common~r1".to_string(),
                format!("delete {}", S1),
                format!("create {}", S1),
                "create /tm/net/route/~Common~r1".to_string(),
            ]
        );
        assert_eq!(store.mutations()[3].body(), Some(&route));
    }

    #[tokio::test]
    async fn test_route_also_in_update_is_not_recreated() {
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.7/24", "v1"))
            .common("Route", "r1", bodies::route("10.0.0.2", "default"))
            .build();
        let state = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.5/24", "v1"))
            .common("Route", "r1", bodies::route("10.0.0.1", "default"))
            .build();
        let store = RecordingStore::new().with_object(S1, json!({}));

        run(&store, &state, &to_update).await.unwrap();

        let verifier = OpVerifier::new(&store.mutations());
        verifier.assert_called("delete /tm/net/route/~Common~r1").unwrap();
        verifier.assert_not_called("create /tm/net/route").unwrap();
    }

    #[tokio::test]
    async fn test_sync_address_cleared_and_restored() {
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.7/24", "v1"))
            .build();
        let state = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.5/24", "v1"))
            .common_class("ConfigSync", json!({"configsyncIp": "10.0.0.5"}))
            .build();
        let store = RecordingStore::new()
            .with_object(S1, json!({}))
            .with_collection(
                "/tm/cm/device",
                vec![
                    json!({"name": "peer", "selfDevice": "false"}),
                    json!({"name": "bigip1", "selfDevice": "true"}),
                ],
            );

        run(&store, &state, &to_update).await.unwrap();

        let mutations = store.mutations();
        assert_eq!(
            store.mutation_labels(),
            vec![
                "modify /tm/cm/device/~Common~bigip1".to_string(),
                format!("delete {}", S1),
                format!("create {}", S1),
                "modify /tm/cm/device/~Common~bigip1".to_string(),
            ]
        );
        assert_eq!(mutations[0].body(), Some(&json!({"configsyncIp": "none"})));
        assert_eq!(mutations[3].body(), Some(&json!({"configsyncIp": "10.0.0.5"})));
    }

    #[tokio::test]
    async fn test_unrelated_sync_address_untouched() {
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.7/24", "v1"))
            .build();
        let state = TreeBuilder::new()
            .common("SelfIp", "s1", bodies::self_ip("10.0.0.5/24", "v1"))
            .common_class("ConfigSync", json!({"configsyncIp": "none"}))
            .build();
        let store = RecordingStore::new().with_object(S1, json!({}));

        run(&store, &state, &to_update).await.unwrap();

        OpVerifier::new(&store.calls())
            .assert_not_called("/tm/cm/device")
            .unwrap();
    }

    #[tokio::test]
    async fn test_probe_error_aborts_before_any_change() {
        let to_update = update_only(
            TreeBuilder::new()
                .common("SelfIp", "s1", bodies::self_ip("10.0.0.7/24", "v1"))
                .build(),
        )
        .to_update;
        let store = RecordingStore::new().fail_on("list", S1, StoreError::new(500, "boom"));

        let err = run(&store, &CurrentConfig::new(), &to_update)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "apply phase failed for SelfIp: boom");
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_address_is_invalid() {
        let to_update = TreeBuilder::new()
            .common("SelfIp", "s1", json!({"vlan": "v1"}))
            .build();
        let store = RecordingStore::new();

        let err = run(&store, &CurrentConfig::new(), &to_update)
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::InvalidObject { .. }));
        assert!(store.calls().is_empty());
    }
}
