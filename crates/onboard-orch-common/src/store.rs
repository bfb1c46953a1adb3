//! The appliance's REST surface as seen by the apply engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Mutating methods an operation or transaction member can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    /// Create a new object
    Create,
    /// Modify an existing object
    Modify,
    /// Create the object, or modify it if it exists
    CreateOrModify,
    /// Delete an object
    Delete,
}

impl Method {
    /// Returns the method name as used in logs and plans.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Create => "create",
            Method::Modify => "modify",
            Method::CreateOrModify => "createOrModify",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The object does not exist (404)
    NotFound,
    /// The appliance rejected the change as invalid
    Conflict,
    /// Likely to succeed if retried
    Transient,
    /// Everything else
    Fatal,
}

/// A failure reported by the store, carrying an HTTP-like status when known.
///
/// Displays as the appliance's message, unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    /// HTTP status, `None` when the request never got a response.
    pub status: Option<u16>,
    /// Message as reported by the appliance.
    pub message: String,
}

impl StoreError {
    /// Creates an error with a status code.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// Creates an error for a request that got no response.
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self.status {
            Some(404) => ErrorKind::NotFound,
            Some(400) | Some(409) | Some(422) => ErrorKind::Conflict,
            Some(408) | Some(429) | Some(502) | Some(503) | Some(504) | None => {
                ErrorKind::Transient
            }
            Some(_) => ErrorKind::Fatal,
        }
    }

    /// Returns true for 404.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type alias for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// One member of an atomic transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub method: Method,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl TransactionItem {
    pub fn create(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Create,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn modify(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Modify,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// Abstraction over the appliance's REST surface.
///
/// Paths handed to mutating calls are full object paths
/// (`/tm/net/self/~Common~s1`); `list` accepts either a collection path or an
/// object path, the latter failing with 404 when the object is absent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates an object.
    async fn create(&self, path: &str, body: &Value, retry: RetryPolicy) -> StoreResult<Value>;

    /// Modifies an existing object.
    async fn modify(&self, path: &str, body: &Value, retry: RetryPolicy) -> StoreResult<Value>;

    /// Creates the object, or modifies it if it already exists.
    async fn create_or_modify(
        &self,
        path: &str,
        body: &Value,
        retry: RetryPolicy,
    ) -> StoreResult<Value>;

    /// Deletes an object.
    async fn delete(&self, path: &str, retry: RetryPolicy) -> StoreResult<()>;

    /// Lists a collection, or fetches a single object as a one-element list.
    async fn list(&self, path: &str, retry: RetryPolicy) -> StoreResult<Vec<Value>>;

    /// Applies all items atomically, in order.
    async fn transaction(&self, items: Vec<TransactionItem>) -> StoreResult<Value>;
}

/// A single store call, built ahead of execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub retry: RetryPolicy,
}

impl Operation {
    pub fn create(path: impl Into<String>, body: Value) -> Self {
        Self::with_body(Method::Create, path, body)
    }

    pub fn modify(path: impl Into<String>, body: Value) -> Self {
        Self::with_body(Method::Modify, path, body)
    }

    pub fn create_or_modify(path: impl Into<String>, body: Value) -> Self {
        Self::with_body(Method::CreateOrModify, path, body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
            retry: RetryPolicy::NONE,
        }
    }

    fn with_body(method: Method, path: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            path: path.into(),
            body: Some(body),
            retry: RetryPolicy::NONE,
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs the operation against a store.
    pub async fn execute(&self, store: &dyn ObjectStore) -> StoreResult<()> {
        let empty = Value::Null;
        let body = self.body.as_ref().unwrap_or(&empty);
        match self.method {
            Method::Create => store.create(&self.path, body, self.retry).await.map(drop),
            Method::Modify => store.modify(&self.path, body, self.retry).await.map(drop),
            Method::CreateOrModify => store
                .create_or_modify(&self.path, body, self.retry)
                .await
                .map(drop),
            Method::Delete => store.delete(&self.path, self.retry).await,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
