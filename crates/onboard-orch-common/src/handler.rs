//! Base handler trait.

use async_trait::async_trait;

use crate::declaration::{CurrentConfig, Diff};
use crate::error::ApplyResult;
use crate::status::HandlerStatus;
use crate::store::ObjectStore;

/// A per-class-family step of a reconciliation run.
///
/// Handlers pick their own classes out of the diff and are stateless across
/// invocations. The pipeline calls them one at a time, in a fixed order,
/// because later handlers may depend on objects earlier ones create.
///
/// # Example
///
/// ```ignore
/// struct SnmpHandler;
///
/// #[async_trait]
/// impl Handler for SnmpHandler {
///     fn name(&self) -> &str { "SnmpHandler" }
///
///     async fn process(
///         &self,
///         diff: &Diff,
///         store: &dyn ObjectStore,
///         state: &CurrentConfig,
///     ) -> ApplyResult<HandlerStatus> {
///         // ... issue store calls for SNMP classes
///         Ok(HandlerStatus::new())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync {
    /// Returns the name of this handler (for logging and error annotation).
    fn name(&self) -> &str;

    /// Applies this handler's slice of `diff`.
    ///
    /// `state` is the last-known appliance configuration and is read-only.
    async fn process(
        &self,
        diff: &Diff,
        store: &dyn ObjectStore,
        state: &CurrentConfig,
    ) -> ApplyResult<HandlerStatus>;
}
