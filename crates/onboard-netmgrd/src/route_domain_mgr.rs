//! Route Domain Manager - applies route domains and their VLAN membership
//!
//! Domain 0 is permanent: it is only ever modified, always under the name
//! `0`, and outside the transaction that carries every other domain.

use onboard_orch_common::{
    ApplyResult, ConfigTree, CurrentConfig, ObjectStore, Phase, RetryPolicy, StoreResultExt,
    TransactionItem, COMMON_PARTITION,
};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

use crate::commands::route_domain_path;
use crate::tables::classes::*;
use crate::tables::DEFAULT_ROUTE_DOMAIN_NAME;
use crate::types::{decode, encode, RouteDomain};

/// A route domain ready to send
#[derive(Debug, Clone, PartialEq)]
struct Outgoing {
    name: String,
    domain: RouteDomain,
}

/// Route Domain Manager
pub struct RouteDomainMgr<'a> {
    store: &'a dyn ObjectStore,
    state: &'a CurrentConfig,
}

impl<'a> RouteDomainMgr<'a> {
    /// Create a new RouteDomainMgr over a store and the current appliance state
    pub fn new(store: &'a dyn ObjectStore, state: &'a CurrentConfig) -> Self {
        Self { store, state }
    }

    /// Apply the route domains declared in `to_update`
    #[instrument(skip_all)]
    pub async fn process(&self, to_update: &ConfigTree, to_delete: &ConfigTree) -> ApplyResult<()> {
        let (default, others) = self.plan(to_update, to_delete)?;

        if !others.is_empty() {
            let mut items = Vec::with_capacity(others.len());
            for rd in &others {
                let path = route_domain_path(&rd.name, false);
                let body = encode(&rd.domain)?;
                if self.state.contains(COMMON_PARTITION, ROUTE_DOMAIN, &rd.name) {
                    items.push(TransactionItem::modify(path, body));
                } else {
                    items.push(TransactionItem::create(path, body));
                }
            }
            info!(count = items.len(), "Applying route domains");
            self.store
                .transaction(items)
                .await
                .in_phase(Phase::Apply, ROUTE_DOMAIN)?;
        }

        if let Some(rd) = default {
            info!(vlans = ?rd.domain.vlans, "Modifying default route domain");
            self.store
                .modify(
                    &route_domain_path(&rd.name, true),
                    &encode(&rd.domain)?,
                    RetryPolicy::SHORT,
                )
                .await
                .in_phase(Phase::Apply, ROUTE_DOMAIN)?;
        }
        Ok(())
    }

    /// Split declared domains into the default one and the rest, with
    /// final VLAN lists.
    fn plan(
        &self,
        to_update: &ConfigTree,
        to_delete: &ConfigTree,
    ) -> ApplyResult<(Option<Outgoing>, Vec<Outgoing>)> {
        let deleted_vlans: BTreeSet<String> = to_delete
            .objects(COMMON_PARTITION, VLAN)
            .map(|(name, _)| vlan_name(name))
            .collect();

        let mut default: Option<Outgoing> = None;
        let mut others = Vec::new();
        for (name, body) in to_update.objects(COMMON_PARTITION, ROUTE_DOMAIN) {
            let mut domain: RouteDomain = decode(ROUTE_DOMAIN, name, body)?;
            let vlans = match domain.vlans.take() {
                Some(vlans) => vlans.iter().map(|v| vlan_name(v)).collect(),
                // Untouched: omitting the list would detach the current VLANs
                None => self.current_vlans(name)?,
            };
            domain.vlans = Some(
                vlans
                    .into_iter()
                    .filter(|v: &String| !deleted_vlans.contains(v))
                    .collect(),
            );

            let outgoing = Outgoing {
                name: name.to_string(),
                domain,
            };
            if outgoing.domain.is_default() || name == DEFAULT_ROUTE_DOMAIN_NAME {
                if let Some(previous) = &default {
                    warn!(
                        previous = %previous.name,
                        name,
                        "Several declarations of route domain 0, the last one wins"
                    );
                }
                default = Some(outgoing);
            } else {
                others.push(outgoing);
            }
        }

        if let Some(rd) = default.as_mut() {
            let assigned: BTreeSet<String> = others
                .iter()
                .chain(std::iter::once(&*rd))
                .flat_map(|o| o.domain.vlans.iter().flatten().cloned())
                .collect();
            let kept = self.kept_vlans(to_update, to_delete)?;
            let unassigned: Vec<String> = self
                .known_vlans(to_update)?
                .into_iter()
                .filter(|v| {
                    !assigned.contains(v) && !kept.contains(v) && !deleted_vlans.contains(v)
                })
                .collect();
            if !unassigned.is_empty() {
                debug!(?unassigned, "Folding unassigned VLANs into route domain 0");
            }
            rd.domain.vlans.get_or_insert_with(Vec::new).extend(unassigned);
        }

        Ok((default, others))
    }

    fn current_vlans(&self, name: &str) -> ApplyResult<Vec<String>> {
        match self.state.object(COMMON_PARTITION, ROUTE_DOMAIN, name) {
            Some(body) => Ok(decode::<RouteDomain>(ROUTE_DOMAIN, name, body)?
                .vlans
                .unwrap_or_default()
                .iter()
                .map(|v| vlan_name(v))
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// VLANs held by current non-default domains that this run leaves alone
    fn kept_vlans(&self, to_update: &ConfigTree, to_delete: &ConfigTree) -> ApplyResult<BTreeSet<String>> {
        let mut vlans = BTreeSet::new();
        for (name, body) in self.state.objects(COMMON_PARTITION, ROUTE_DOMAIN) {
            if to_update.contains(COMMON_PARTITION, ROUTE_DOMAIN, name)
                || to_delete.contains(COMMON_PARTITION, ROUTE_DOMAIN, name)
            {
                continue;
            }
            let domain: RouteDomain = decode(ROUTE_DOMAIN, name, body)?;
            if domain.is_default() || name == DEFAULT_ROUTE_DOMAIN_NAME {
                continue;
            }
            vlans.extend(self.current_vlans(name)?);
        }
        Ok(vlans)
    }

    /// VLANs that exist now or are being declared, plus those attached to
    /// current route domains
    fn known_vlans(&self, to_update: &ConfigTree) -> ApplyResult<BTreeSet<String>> {
        let mut vlans: BTreeSet<String> = self
            .state
            .objects(COMMON_PARTITION, VLAN)
            .chain(to_update.objects(COMMON_PARTITION, VLAN))
            .map(|(name, _)| vlan_name(name))
            .collect();
        for (name, _) in self.state.objects(COMMON_PARTITION, ROUTE_DOMAIN) {
            vlans.extend(self.current_vlans(name)?);
        }
        Ok(vlans)
    }
}

/// Fully qualified VLAN name
fn vlan_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}/{}", COMMON_PARTITION, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onboard_test::{bodies, RecordingStore, StoreCall, TreeBuilder};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn run(
        store: &RecordingStore,
        state: &CurrentConfig,
        to_update: &ConfigTree,
        to_delete: &ConfigTree,
    ) -> ApplyResult<()> {
        RouteDomainMgr::new(store, state)
            .process(to_update, to_delete)
            .await
    }

    #[tokio::test]
    async fn test_default_domain_modified_outside_transaction() {
        let to_update = TreeBuilder::new()
            .common("RouteDomain", "rd0", bodies::route_domain(0, &["v1"]))
            .common("RouteDomain", "rd2", bodies::route_domain(2, &["v2"]))
            .build();
        let state = TreeBuilder::new()
            .common("RouteDomain", "0", bodies::route_domain(0, &[]))
            .build();
        let store = RecordingStore::new();

        run(&store, &state, &to_update, &ConfigTree::new()).await.unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec![
                "transaction[create /tm/net/route-domain/~Common~rd2]",
                "modify /tm/net/route-domain/~Common~0",
            ]
        );
        assert_eq!(
            store.mutations()[1].body().unwrap()["vlans"],
            json!(["/Common/v1"])
        );
    }

    #[tokio::test]
    async fn test_existing_domain_is_modified_in_transaction() {
        let to_update = TreeBuilder::new()
            .common("RouteDomain", "rd2", bodies::route_domain(2, &["v2"]))
            .build();
        let state = TreeBuilder::new()
            .common("RouteDomain", "rd2", bodies::route_domain(2, &[]))
            .build();
        let store = RecordingStore::new();

        run(&store, &state, &to_update, &ConfigTree::new()).await.unwrap();

        let StoreCall::Transaction { items } = &store.mutations()[0] else {
            panic!("expected a transaction");
        };
        assert_eq!(
            items,
            &vec![TransactionItem::modify(
                "/tm/net/route-domain/~Common~rd2",
                json!({"id": 2, "vlans": ["/Common/v2"]})
            )]
        );
    }

    #[tokio::test]
    async fn test_unassigned_and_orphaned_vlans_fold_into_default() {
        let to_update = TreeBuilder::new()
            .common("RouteDomain", "0", bodies::route_domain_without_vlans(0))
            .common("RouteDomain", "rd2", bodies::route_domain(2, &["/Common/v2"]))
            .common("VLAN", "v4", bodies::vlan(4))
            .build();
        let state = TreeBuilder::new()
            .common("VLAN", "v1", bodies::vlan(1))
            .common("VLAN", "v2", bodies::vlan(2))
            .common("VLAN", "v3", bodies::vlan(3))
            .common("VLAN", "v5", bodies::vlan(5))
            .common("RouteDomain", "0", bodies::route_domain(0, &["/Common/v1"]))
            .common("RouteDomain", "rd3", bodies::route_domain(3, &["/Common/v3"]))
            .build();
        let to_delete = TreeBuilder::new()
            .common("VLAN", "v5", bodies::vlan(5))
            .common("RouteDomain", "rd3", bodies::route_domain(3, &["/Common/v3"]))
            .build();
        let store = RecordingStore::new();

        run(&store, &state, &to_update, &to_delete).await.unwrap();

        let default = store.mutations()[1].body().unwrap().clone();
        assert_eq!(
            default,
            json!({"id": 0, "vlans": ["/Common/v1", "/Common/v3", "/Common/v4"]})
        );
    }

    #[tokio::test]
    async fn test_unchanged_domain_keeps_its_vlans() {
        let to_update = TreeBuilder::new()
            .common("RouteDomain", "0", bodies::route_domain(0, &["v1"]))
            .build();
        let state = TreeBuilder::new()
            .common("VLAN", "v1", bodies::vlan(1))
            .common("VLAN", "v3", bodies::vlan(3))
            .common("RouteDomain", "0", bodies::route_domain(0, &["/Common/v1"]))
            .common("RouteDomain", "rd3", bodies::route_domain(3, &["/Common/v3"]))
            .build();
        let store = RecordingStore::new();

        run(&store, &state, &to_update, &ConfigTree::new()).await.unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec!["modify /tm/net/route-domain/~Common~0"]
        );
        assert_eq!(
            store.mutations()[0].body(),
            Some(&json!({"id": 0, "vlans": ["/Common/v1"]}))
        );
    }

    #[tokio::test]
    async fn test_untouched_vlan_list_keeps_current_vlans() {
        let to_update = TreeBuilder::new()
            .common("RouteDomain", "rd2", json!({"id": 2, "strict": "disabled"}))
            .build();
        let state = TreeBuilder::new()
            .common("RouteDomain", "rd2", bodies::route_domain(2, &["/Common/v2"]))
            .build();
        let store = RecordingStore::new();

        run(&store, &state, &to_update, &ConfigTree::new()).await.unwrap();

        let StoreCall::Transaction { items } = &store.mutations()[0] else {
            panic!("expected a transaction");
        };
        assert_eq!(
            items[0].body,
            Some(json!({"id": 2, "strict": "disabled", "vlans": ["/Common/v2"]}))
        );
    }

    #[tokio::test]
    async fn test_duplicate_default_last_key_wins() {
        let to_update = TreeBuilder::new()
            .common("RouteDomain", "a", json!({"id": 0, "vlans": ["v1"]}))
            .common("RouteDomain", "b", json!({"id": 0, "vlans": ["v2"]}))
            .build();
        let store = RecordingStore::new();

        run(&store, &CurrentConfig::new(), &to_update, &ConfigTree::new())
            .await
            .unwrap();

        assert_eq!(
            store.mutation_labels(),
            vec!["modify /tm/net/route-domain/~Common~0"]
        );
        assert_eq!(
            store.mutations()[0].body().unwrap()["vlans"],
            json!(["/Common/v2"])
        );
    }

    #[tokio::test]
    async fn test_nothing_declared_issues_nothing() {
        let store = RecordingStore::new();
        run(&store, &CurrentConfig::new(), &ConfigTree::new(), &ConfigTree::new())
            .await
            .unwrap();
        assert!(store.calls().is_empty());
    }
}
