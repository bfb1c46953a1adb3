//! Route maps and routing prefix lists
//!
//! `routeDomain` is create-only on both classes. Moving one to another route
//! domain takes a delete/create transaction without `entries`, followed by a
//! plain modify that supplies `entries` and leaves `routeDomain` out.

use onboard_orch_common::{
    ApplyResult, ConfigTree, CurrentConfig, ObjectStore, Operation, Phase, StoreResultExt,
    TransactionItem,
};
use serde_json::Value;
use tracing::{info, instrument};

use crate::commands::class_object_path;
use crate::types::{decode, encode, RoutingObject};

/// Routing Manager
pub struct RoutingMgr<'a> {
    store: &'a dyn ObjectStore,
    state: &'a CurrentConfig,
}

impl<'a> RoutingMgr<'a> {
    pub fn new(store: &'a dyn ObjectStore, state: &'a CurrentConfig) -> Self {
        Self { store, state }
    }

    /// Apply every object of `class` in `to_update`
    #[instrument(skip(self, to_update))]
    pub async fn process_class(&self, class: &str, to_update: &ConfigTree) -> ApplyResult<()> {
        for (tenant, _) in to_update.tenants() {
            for (name, body) in to_update.objects(tenant, class) {
                self.apply(class, tenant, name, body).await?;
            }
        }
        Ok(())
    }

    async fn apply(&self, class: &str, partition: &str, name: &str, body: &Value) -> ApplyResult<()> {
        let path = class_object_path(class, partition, name)?;
        let declared: RoutingObject = decode(class, name, body)?;
        let current = self
            .state
            .object(partition, class, name)
            .map(|b| decode::<RoutingObject>(class, name, b))
            .transpose()?;

        let moved = current.is_some_and(|c| c.route_domain_key() != declared.route_domain_key());
        if !moved {
            return Operation::create_or_modify(path, body.clone())
                .execute(self.store)
                .await
                .in_phase(Phase::Apply, class);
        }

        info!(class, name, "Moving to another route domain");
        let without_entries = RoutingObject {
            entries: None,
            ..declared.clone()
        };
        self.store
            .transaction(vec![
                TransactionItem::delete(path.clone()),
                TransactionItem::create(path.clone(), encode(&without_entries)?),
            ])
            .await
            .in_phase(Phase::Apply, class)?;

        let without_route_domain = RoutingObject {
            route_domain: None,
            ..declared
        };
        Operation::modify(path, encode(&without_route_domain)?)
            .execute(self.store)
            .await
            .in_phase(Phase::Apply, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboard_test::{bodies, RecordingStore, StoreCall, TreeBuilder};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PATH: &str = "/tm/net/routing/prefix-list/~Common~pl1";

    fn entries() -> Value {
        json!({"10": {"action": "permit", "prefix": "10.0.0.0/8"}})
    }

    #[tokio::test]
    async fn test_route_domain_change_splits_entries() {
        let to_update = TreeBuilder::new()
            .common("RoutingPrefixList", "pl1", bodies::routing_object("2", entries()))
            .build();
        let state = TreeBuilder::new()
            .common("RoutingPrefixList", "pl1", bodies::routing_object("0", entries()))
            .build();
        let store = RecordingStore::new();

        RoutingMgr::new(&store, &state)
            .process_class("RoutingPrefixList", &to_update)
            .await
            .unwrap();

        let mutations = store.mutations();
        assert_eq!(mutations.len(), 2);
        assert_eq!(
            mutations[0],
            StoreCall::Transaction {
                items: vec![
                    TransactionItem::delete(PATH),
                    TransactionItem::create(PATH, json!({"routeDomain": "2"})),
                ]
            }
        );
        assert_eq!(mutations[1].label(), format!("modify {}", PATH));
        assert_eq!(mutations[1].body(), Some(&json!({"entries": entries()})));
    }

    #[tokio::test]
    async fn test_same_route_domain_is_single_upsert() {
        let to_update = TreeBuilder::new()
            .common("RoutingPrefixList", "pl1", bodies::routing_object("/Common/0", entries()))
            .build();
        let state = TreeBuilder::new()
            .common("RoutingPrefixList", "pl1", json!({"routeDomain": 0, "entries": {}}))
            .build();
        let store = RecordingStore::new();

        RoutingMgr::new(&store, &state)
            .process_class("RoutingPrefixList", &to_update)
            .await
            .unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![format!("createOrModify {}", PATH)]
        );
    }

    #[tokio::test]
    async fn test_unset_route_domain_matches_default() {
        let to_update = TreeBuilder::new()
            .common("RoutingPrefixList", "pl1", bodies::routing_object("0", entries()))
            .build();
        let state = TreeBuilder::new()
            .common("RoutingPrefixList", "pl1", json!({"entries": entries()}))
            .build();
        let store = RecordingStore::new();

        RoutingMgr::new(&store, &state)
            .process_class("RoutingPrefixList", &to_update)
            .await
            .unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![format!("createOrModify {}", PATH)]
        );
    }

    #[tokio::test]
    async fn test_new_route_map_is_single_upsert() {
        let to_update = TreeBuilder::new()
            .common("RouteMap", "rm1", bodies::routing_object("2", json!({})))
            .build();
        let store = RecordingStore::new();

        RoutingMgr::new(&store, &CurrentConfig::new())
            .process_class("RouteMap", &to_update)
            .await
            .unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec!["createOrModify /tm/net/routing/route-map/~Common~rm1"]
        );
    }
}
