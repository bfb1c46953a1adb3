//! Common apply-engine abstractions for declarative network onboarding.
//!
//! This crate provides the core traits and types shared by every handler
//! that reconciles an appliance toward a declaration:
//!
//! - [`ConfigTree`]: tenant -> class -> object shaped configuration
//!   (used for the declaration, the current state and both diff halves)
//! - [`ObjectStore`]: the appliance's REST surface
//! - [`RetryPolicy`]: named retry configurations passed per call
//! - [`Handler`] and [`HandlerPipeline`]: ordered, fail-fast processing
//! - [`HandlerStatus`]: per-handler outcome aggregated by the pipeline
//!
//! # Architecture
//!
//! 1. An external diff yields `{toUpdate, toDelete}`
//! 2. The pipeline runs each handler in order over the diff
//! 3. Handlers turn their classes into store operations
//! 4. The store applies them to the appliance, retrying per policy
//!
//! # Example
//!
//! ```ignore
//! use onboard_orch_common::{Handler, HandlerPipeline};
//!
//! let pipeline = HandlerPipeline::new(&store, &current);
//! let statuses = pipeline.process(&diff, &handlers).await?;
//! ```

mod declaration;
mod error;
mod handler;
mod pipeline;
mod retry;
mod status;
mod store;

pub use declaration::{ConfigTree, CurrentConfig, Declaration, Diff, TenantConfig, COMMON_PARTITION};
pub use error::{ApplyError, ApplyResult, Phase, StoreResultExt};
pub use handler::Handler;
pub use pipeline::HandlerPipeline;
pub use retry::{with_retry, RetryClass, RetryPolicy, RetrySchedule, RetryTimings};
pub use status::HandlerStatus;
pub use store::{ErrorKind, Method, ObjectStore, Operation, StoreError, StoreResult, TransactionItem};
