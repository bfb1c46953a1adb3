//! In-memory `ObjectStore` that records every call
//!
//! Mirrors mock-mode command capture: nothing is applied, every call is
//! captured in order, and tests decide which probes find objects and which
//! calls fail.

use async_trait::async_trait;
use onboard_orch_common::{
    Method, ObjectStore, RetryPolicy, StoreError, StoreResult, TransactionItem,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// A captured store call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create {
        path: String,
        body: Value,
        retry: RetryPolicy,
    },
    Modify {
        path: String,
        body: Value,
        retry: RetryPolicy,
    },
    CreateOrModify {
        path: String,
        body: Value,
        retry: RetryPolicy,
    },
    Delete {
        path: String,
        retry: RetryPolicy,
    },
    List {
        path: String,
    },
    Transaction {
        items: Vec<TransactionItem>,
    },
}

impl StoreCall {
    /// Returns true for calls that change appliance state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, StoreCall::List { .. })
    }

    /// Returns the path, or `None` for transactions.
    pub fn path(&self) -> Option<&str> {
        match self {
            StoreCall::Create { path, .. }
            | StoreCall::Modify { path, .. }
            | StoreCall::CreateOrModify { path, .. }
            | StoreCall::Delete { path, .. }
            | StoreCall::List { path } => Some(path),
            StoreCall::Transaction { .. } => None,
        }
    }

    /// Returns the body of a create/modify call.
    pub fn body(&self) -> Option<&Value> {
        match self {
            StoreCall::Create { body, .. }
            | StoreCall::Modify { body, .. }
            | StoreCall::CreateOrModify { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short label such as `delete /tm/net/self/~Common~s1`.
    ///
    /// Transactions render as `transaction[delete a, create b]`.
    pub fn label(&self) -> String {
        match self {
            StoreCall::Create { path, .. } => format!("create {}", path),
            StoreCall::Modify { path, .. } => format!("modify {}", path),
            StoreCall::CreateOrModify { path, .. } => format!("createOrModify {}", path),
            StoreCall::Delete { path, .. } => format!("delete {}", path),
            StoreCall::List { path } => format!("list {}", path),
            StoreCall::Transaction { items } => {
                let inner: Vec<String> = items
                    .iter()
                    .map(|i| format!("{} {}", i.method, i.path))
                    .collect();
                format!("transaction[{}]", inner.join(", "))
            }
        }
    }

    fn method_name(&self) -> &'static str {
        match self {
            StoreCall::Create { .. } => Method::Create.as_str(),
            StoreCall::Modify { .. } => Method::Modify.as_str(),
            StoreCall::CreateOrModify { .. } => Method::CreateOrModify.as_str(),
            StoreCall::Delete { .. } => Method::Delete.as_str(),
            StoreCall::List { .. } => "list",
            StoreCall::Transaction { .. } => "transaction",
        }
    }
}

#[derive(Default)]
struct Inner {
    calls: Vec<StoreCall>,
    objects: HashMap<String, Value>,
    collections: HashMap<String, Vec<Value>>,
    failures: HashMap<(String, String), StoreError>,
}

/// Recording store.
///
/// - `list` of a seeded object path returns it as a one-element list
/// - `list` of a seeded collection returns its items
/// - any other `list` fails with 404
/// - mutations succeed unless a failure was registered for them
#[derive(Default)]
pub struct RecordingStore {
    inner: Mutex<Inner>,
}

impl RecordingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object so existence probes on `path` find it.
    pub fn with_object(self, path: impl Into<String>, body: Value) -> Self {
        self.inner.lock().objects.insert(path.into(), body);
        self
    }

    /// Seeds the items returned when listing `path`.
    pub fn with_collection(self, path: impl Into<String>, items: Vec<Value>) -> Self {
        self.inner.lock().collections.insert(path.into(), items);
        self
    }

    /// Makes calls of `method` on `path` fail.
    ///
    /// `method` is one of `create`, `modify`, `createOrModify`, `delete`,
    /// `list`, or `transaction` (with an empty path).
    pub fn fail_on(self, method: &str, path: &str, err: StoreError) -> Self {
        self.inner
            .lock()
            .failures
            .insert((method.to_string(), path.to_string()), err);
        self
    }

    /// Returns all captured calls, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().calls.clone()
    }

    /// Returns captured mutating calls, in order.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_mutation).collect()
    }

    /// Returns labels of captured mutating calls, in order.
    pub fn mutation_labels(&self) -> Vec<String> {
        self.mutations().iter().map(StoreCall::label).collect()
    }

    /// Forgets captured calls, keeping seeded data.
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    fn record(&self, call: StoreCall) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let key = (
            call.method_name().to_string(),
            call.path().unwrap_or_default().to_string(),
        );
        inner.calls.push(call);
        match inner.failures.get(&key) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn create(&self, path: &str, body: &Value, retry: RetryPolicy) -> StoreResult<Value> {
        self.record(StoreCall::Create {
            path: path.to_string(),
            body: body.clone(),
            retry,
        })?;
        Ok(body.clone())
    }

    async fn modify(&self, path: &str, body: &Value, retry: RetryPolicy) -> StoreResult<Value> {
        self.record(StoreCall::Modify {
            path: path.to_string(),
            body: body.clone(),
            retry,
        })?;
        Ok(body.clone())
    }

    async fn create_or_modify(
        &self,
        path: &str,
        body: &Value,
        retry: RetryPolicy,
    ) -> StoreResult<Value> {
        self.record(StoreCall::CreateOrModify {
            path: path.to_string(),
            body: body.clone(),
            retry,
        })?;
        Ok(body.clone())
    }

    async fn delete(&self, path: &str, retry: RetryPolicy) -> StoreResult<()> {
        self.record(StoreCall::Delete {
            path: path.to_string(),
            retry,
        })
    }

    async fn list(&self, path: &str, _retry: RetryPolicy) -> StoreResult<Vec<Value>> {
        self.record(StoreCall::List {
            path: path.to_string(),
        })?;
        let inner = self.inner.lock();
        if let Some(items) = inner.collections.get(path) {
            return Ok(items.clone());
        }
        match inner.objects.get(path) {
            Some(obj) => Ok(vec![obj.clone()]),
            None => Err(StoreError::not_found(format!(
                "The requested object ({}) was not found.",
                path
            ))),
        }
    }

    async fn transaction(&self, items: Vec<TransactionItem>) -> StoreResult<Value> {
        self.record(StoreCall::Transaction { items })?;
        Ok(Value::Null)
    }
}
