//! Network onboarding apply engine
//!
//! Reconciles an appliance toward a declaration: handlers turn the diff into
//! ordered store operations, deleting obsolete objects in reverse-dependency
//! order and replacing self IPs and route domains the appliance cannot
//! change in place.

mod commands;
pub mod config_file;
mod delete_mgr;
mod handlers;
mod rest_store;
mod route_domain_mgr;
mod routing;
mod self_ip_mgr;
pub mod tables;
mod types;

pub use commands::*;
pub use config_file::OnboardConfig;
pub use delete_mgr::DeleteMgr;
pub use handlers::*;
pub use rest_store::RestStore;
pub use route_domain_mgr::RouteDomainMgr;
pub use routing::RoutingMgr;
pub use self_ip_mgr::SelfIpMgr;
pub use types::*;

use onboard_orch_common::{ApplyResult, CurrentConfig, Diff, HandlerPipeline, HandlerStatus, ObjectStore};

/// Run the default handlers over `diff` and aggregate their statuses
pub async fn apply(
    diff: &Diff,
    store: &dyn ObjectStore,
    state: &CurrentConfig,
) -> ApplyResult<HandlerStatus> {
    let handlers = default_handlers();
    let statuses = HandlerPipeline::new(store, state)
        .process(diff, &handlers)
        .await?;
    Ok(HandlerStatus::merge_all(&statuses))
}
