//! Named retry policies for store calls.
//!
//! Callers pick one of a small closed set of policies per call. Only the
//! store decides what a policy means in attempts and intervals; the engine
//! has no backoff of its own.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::store::{StoreError, StoreResult};

/// The named policy families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryClass {
    /// Single attempt; for destructive or idempotency-sensitive calls
    None,
    /// A few quick retries; for probes and lookups
    Short,
    /// Bounded longer retries; for calls expected to settle eventually
    Medium,
}

/// A retry policy passed explicitly with every store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    pub class: RetryClass,
    /// Failures whose message contains this text count as success.
    pub continue_on_message: Option<&'static str>,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy::of(RetryClass::None);
    pub const SHORT: RetryPolicy = RetryPolicy::of(RetryClass::Short);
    pub const MEDIUM: RetryPolicy = RetryPolicy::of(RetryClass::Medium);

    const fn of(class: RetryClass) -> Self {
        Self {
            class,
            continue_on_message: None,
        }
    }

    /// Treats failures mentioning `message` as success.
    pub const fn continue_on(mut self, message: &'static str) -> Self {
        self.continue_on_message = Some(message);
        self
    }

    /// Returns true if this failure should be swallowed.
    pub fn accepts(&self, err: &StoreError) -> bool {
        self.continue_on_message
            .is_some_and(|needle| err.message.contains(needle))
    }
}

/// How many times and how often a policy retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub max_retries: u32,
    pub interval: Duration,
}

impl RetrySchedule {
    pub const fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }
}

/// Concrete schedules for the named policies, owned by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimings {
    pub short: RetrySchedule,
    pub medium: RetrySchedule,
}

impl RetryTimings {
    /// Returns the schedule for a policy.
    pub fn schedule(&self, policy: RetryPolicy) -> RetrySchedule {
        match policy.class {
            RetryClass::None => RetrySchedule::new(0, Duration::ZERO),
            RetryClass::Short => self.short,
            RetryClass::Medium => self.medium,
        }
    }
}

impl Default for RetryTimings {
    fn default() -> Self {
        Self {
            short: RetrySchedule::new(3, Duration::from_millis(500)),
            medium: RetrySchedule::new(60, Duration::from_secs(1)),
        }
    }
}

/// Runs `call` under `policy`.
///
/// 404s are never retried: they answer the question being asked. A failure
/// accepted by the policy's continue-on message resolves to `on_accept`.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    timings: &RetryTimings,
    on_accept: impl FnOnce() -> T,
    mut call: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let schedule = timings.schedule(policy);
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if policy.accepts(&err) => {
                debug!(error = %err, "Accepting failure per retry policy");
                return Ok(on_accept());
            }
            Err(err) if err.is_not_found() || attempt >= schedule.max_retries => return Err(err),
            Err(err) => {
                attempt += 1;
                debug!(
                    attempt,
                    max = schedule.max_retries,
                    error = %err,
                    "Retrying store call"
                );
                tokio::time::sleep(schedule.interval).await;
            }
        }
    }
}
