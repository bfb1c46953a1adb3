//! Ordered, fail-fast execution of handlers.

use tracing::{error, info, instrument};

use crate::declaration::{CurrentConfig, Diff};
use crate::error::ApplyResult;
use crate::handler::Handler;
use crate::status::HandlerStatus;
use crate::store::ObjectStore;

/// Runs handlers strictly in sequence over one diff.
///
/// The first failing handler aborts the run; handlers after it are never
/// invoked and nothing is rolled back here. Callers use the `rollback_info`
/// of statuses returned so far, which are logged before the error surfaces.
pub struct HandlerPipeline<'a> {
    store: &'a dyn ObjectStore,
    state: &'a CurrentConfig,
}

impl<'a> HandlerPipeline<'a> {
    /// Creates a pipeline bound to a store and the current appliance state.
    pub fn new(store: &'a dyn ObjectStore, state: &'a CurrentConfig) -> Self {
        Self { store, state }
    }

    /// Processes `handlers` in order, returning one status per handler.
    #[instrument(skip_all, fields(handlers = handlers.len()))]
    pub async fn process(
        &self,
        diff: &Diff,
        handlers: &[Box<dyn Handler>],
    ) -> ApplyResult<Vec<HandlerStatus>> {
        let mut statuses = Vec::with_capacity(handlers.len());

        for handler in handlers {
            info!(handler = handler.name(), "Running handler");
            match handler.process(diff, self.store, self.state).await {
                Ok(status) => statuses.push(status),
                Err(e) => {
                    let completed = HandlerStatus::merge_all(&statuses);
                    error!(
                        handler = handler.name(),
                        error = %e,
                        completed = statuses.len(),
                        rollback = ?completed.rollback_info,
                        "Handler failed, aborting"
                    );
                    return Err(e.in_handler(handler.name()));
                }
            }
        }

        info!(count = statuses.len(), "All handlers completed");
        Ok(statuses)
    }
}
