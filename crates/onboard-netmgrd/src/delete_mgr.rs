//! Delete Manager - removes objects present only in current state
//!
//! Classes go strictly one after another in reverse-dependency order; the
//! members of one class are deleted concurrently and jointly awaited.

use futures::future::try_join_all;
use onboard_orch_common::{
    ApplyError, ApplyResult, ConfigTree, CurrentConfig, ObjectStore, Operation, Phase,
    RetryPolicy, StoreError, StoreResultExt, TransactionItem, COMMON_PARTITION,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::commands::*;
use crate::tables::classes::*;
use crate::tables::*;
use crate::types::{decode, Tunnel};

/// An object scheduled for deletion
#[derive(Debug, Clone, Copy)]
struct Target<'a> {
    partition: &'a str,
    name: &'a str,
    body: &'a Value,
}

/// Delete Manager
///
/// Turns the `toDelete` half of a diff into store deletes, honoring
/// built-ins, per-class path quirks and the transactions some classes need.
pub struct DeleteMgr<'a> {
    store: &'a dyn ObjectStore,
    state: &'a CurrentConfig,
}

impl<'a> DeleteMgr<'a> {
    /// Create a new DeleteMgr over a store and the current appliance state
    pub fn new(store: &'a dyn ObjectStore, state: &'a CurrentConfig) -> Self {
        Self { store, state }
    }

    /// Delete everything in `to_delete`
    #[instrument(skip_all)]
    pub async fn process(&self, to_delete: &ConfigTree) -> ApplyResult<()> {
        let targets = collect_targets(to_delete);

        self.delete_gslb_linked(&targets).await?;

        for class in DELETE_ORDER {
            let Some(objects) = targets.get(class) else {
                continue;
            };
            if *class == ROUTE_DOMAIN {
                self.delete_route_domains(objects).await?;
            } else {
                self.delete_class(class, objects).await?;
            }
        }

        self.delete_remote_auth(to_delete).await
    }

    /// Data centers, prober pools and servers reference each other, so no
    /// single-class order works; they go in one transaction.
    async fn delete_gslb_linked(&self, targets: &BTreeMap<&str, Vec<Target<'_>>>) -> ApplyResult<()> {
        let mut items = Vec::new();
        for class in GSLB_LINKED_CLASSES {
            for t in targets.get(class).into_iter().flatten() {
                items.push(TransactionItem::delete(class_object_path(
                    class,
                    t.partition,
                    t.name,
                )?));
            }
        }
        if items.is_empty() {
            return Ok(());
        }

        info!(count = items.len(), "Deleting GSLB data centers, prober pools and servers");
        self.store
            .transaction(items)
            .await
            .map(drop)
            .in_phase(Phase::Delete, GSLB_SERVER)
    }

    async fn delete_route_domains(&self, objects: &[Target<'_>]) -> ApplyResult<()> {
        let items: Vec<TransactionItem> = objects
            .iter()
            .filter(|t| !self.is_protected(ROUTE_DOMAIN, t))
            .map(|t| TransactionItem::delete(route_domain_path(t.name, false)))
            .collect();
        if items.is_empty() {
            return Ok(());
        }

        info!(count = items.len(), "Deleting route domains");
        self.store
            .transaction(items)
            .await
            .map(drop)
            .in_phase(Phase::Delete, ROUTE_DOMAIN)
    }

    async fn delete_class(&self, class: &str, objects: &[Target<'_>]) -> ApplyResult<()> {
        let mut pending = Vec::with_capacity(objects.len());
        for t in objects {
            if self.is_protected(class, t) {
                continue;
            }
            let companion = (class == TUNNEL && self.has_vxlan_companion(t))
                .then(|| build_companion_delete_op(t.partition, t.name));
            pending.push((self.build_delete_op(class, t)?, companion));
        }
        if pending.is_empty() {
            return Ok(());
        }

        info!(class, count = pending.len(), "Deleting");
        let store = self.store;
        try_join_all(pending.iter().map(|(op, companion)| async move {
            op.execute(store).await?;
            if let Some(companion) = companion {
                companion.execute(store).await?;
            }
            Ok::<(), StoreError>(())
        }))
        .await
        .map(drop)
        .in_phase(Phase::Delete, class)
    }

    fn build_delete_op(&self, class: &str, t: &Target<'_>) -> ApplyResult<Operation> {
        let path = match class {
            ROUTE => {
                let partition = if self.is_local_only_route(t) {
                    LOCAL_ONLY_PARTITION
                } else {
                    t.partition
                };
                class_object_path(ROUTE, partition, t.name)?
            }
            GSLB_MONITOR => {
                let monitor_type = self
                    .current(GSLB_MONITOR, t)
                    .and_then(|m| m.get("monitorType"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ApplyError::missing_current_state(GSLB_MONITOR, t.name, "no monitorType")
                    })?;
                monitor_path(monitor_type, t.partition, t.name)
            }
            REMOTE_AUTH_ROLE => remote_role_path(t.name),
            _ => class_object_path(class, t.partition, t.name)?,
        };
        Ok(Operation::delete(path))
    }

    fn current(&self, class: &str, t: &Target<'_>) -> Option<&'a Value> {
        self.state.object(t.partition, class, t.name)
    }

    fn is_protected(&self, class: &str, t: &Target<'_>) -> bool {
        let protected = is_builtin_name(class, t.name)
            || (class == ROUTE_DOMAIN
                && [Some(t.body), self.current(ROUTE_DOMAIN, t)]
                    .into_iter()
                    .flatten()
                    .any(|body| body.get("id").and_then(Value::as_u64) == Some(0)));
        if protected {
            debug!(class, name = t.name, "Skipping built-in");
        }
        protected
    }

    fn is_local_only_route(&self, t: &Target<'_>) -> bool {
        [Some(t.body), self.current(ROUTE, t)]
            .into_iter()
            .flatten()
            .any(|body| body.get("localOnly").and_then(Value::as_bool) == Some(true))
    }

    fn has_vxlan_companion(&self, t: &Target<'_>) -> bool {
        self.current(TUNNEL, t)
            .and_then(|body| decode::<Tunnel>(TUNNEL, t.name, body).ok())
            .is_some_and(|tunnel| tunnel.has_vxlan_companion())
    }

    /// Remote auth objects share one fixed name, so each is probed before
    /// it is deleted. Secondary objects go only after the primary.
    async fn delete_remote_auth(&self, to_delete: &ConfigTree) -> ApplyResult<()> {
        let Some(auth) = to_delete.class(COMMON_PARTITION, AUTHENTICATION) else {
            return Ok(());
        };

        for kind in AUTH_KINDS {
            if auth.get(kind).is_none() {
                continue;
            }
            let Some(existing) = self.probe_auth(kind).await? else {
                debug!(kind, "No remote auth object to delete");
                continue;
            };

            info!(kind, "Deleting remote auth configuration");
            self.delete_path(auth_object_path(kind, SYSTEM_AUTH_NAME)).await?;

            match *kind {
                "radius" => {
                    for path in RADIUS_SERVER_PATHS {
                        self.delete_path(path.to_string()).await?;
                    }
                }
                "ldap" => {
                    for (field, path) in LDAP_FILE_PATHS {
                        if references_file(&existing, field, path) {
                            self.delete_path(path.to_string()).await?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn probe_auth(&self, kind: &str) -> ApplyResult<Option<Value>> {
        match self
            .store
            .list(&auth_collection_path(kind), RetryPolicy::SHORT)
            .await
        {
            Ok(items) => Ok(items
                .into_iter()
                .find(|item| item.get("name").and_then(Value::as_str) == Some(SYSTEM_AUTH_NAME))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ApplyError::store(Phase::Delete, AUTHENTICATION, e)),
        }
    }

    async fn delete_path(&self, path: String) -> ApplyResult<()> {
        Operation::delete(path)
            .execute(self.store)
            .await
            .in_phase(Phase::Delete, AUTHENTICATION)
    }
}

/// Group `to_delete` by class; members in tenant then name order
fn collect_targets(to_delete: &ConfigTree) -> BTreeMap<&str, Vec<Target<'_>>> {
    let mut targets: BTreeMap<&str, Vec<Target<'_>>> = BTreeMap::new();
    for (tenant, config) in to_delete.tenants() {
        for class in config.class_names() {
            for (name, body) in to_delete.objects(tenant, class) {
                targets.entry(class).or_default().push(Target {
                    partition: tenant,
                    name,
                    body,
                });
            }
        }
    }
    targets
}

fn references_file(existing: &Value, field: &str, path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    existing
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|v| v.ends_with(file))
}
