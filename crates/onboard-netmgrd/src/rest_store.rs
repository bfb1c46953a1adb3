//! Appliance REST client implementing `ObjectStore`
//!
//! Objects live under `/mgmt/tm/...`. Creates go to the collection with
//! `name` and `partition` taken from the object path; transactions are
//! opened, filled with requests tagged by a coordination id, then committed.

use async_trait::async_trait;
use onboard_orch_common::{
    with_retry, ApplyError, ApplyResult, Method, ObjectStore, RetryPolicy, RetryTimings,
    StoreError, StoreResult, TransactionItem,
};
use reqwest::Method as HttpMethod;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::commands::split_object_path;
use crate::config_file::OnboardConfig;
use crate::tables::TRANSACTION_PATH;

/// Header that ties a request to an open transaction
const COORDINATION_HEADER: &str = "X-F5-REST-Coordination-Id";

/// REST-backed object store
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    timings: RetryTimings,
}

impl RestStore {
    /// Create a store from configuration
    pub fn new(config: &OnboardConfig) -> ApplyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.appliance.verify_tls)
            .build()
            .map_err(|e| ApplyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!(url = %config.base_url(), "Appliance REST client ready");
        Ok(Self {
            client,
            base_url: config.base_url(),
            username: config.appliance.username.clone(),
            password: config.appliance.password.clone(),
            timings: config.retry_timings(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/mgmt{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        transaction: Option<&str>,
    ) -> StoreResult<Value> {
        debug!(%method, path, ?transaction, "Sending request");
        let mut request = self
            .client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(id) = transaction {
            request = request.header(COORDINATION_HEADER, id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        if !status.is_success() {
            return Err(StoreError::new(
                status.as_u16(),
                error_message(&text, status.canonical_reason()),
            ));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            StoreError::new(status.as_u16(), format!("Invalid response body: {}", e))
        })
    }

    async fn post_object(&self, path: &str, body: &Value, transaction: Option<&str>) -> StoreResult<Value> {
        let (collection, body) = create_request(path, body)?;
        self.send(HttpMethod::POST, &collection, Some(&body), transaction)
            .await
    }
}

#[async_trait]
impl ObjectStore for RestStore {
    async fn create(&self, path: &str, body: &Value, retry: RetryPolicy) -> StoreResult<Value> {
        with_retry(retry, &self.timings, || Value::Null, || {
            self.post_object(path, body, None)
        })
        .await
    }

    async fn modify(&self, path: &str, body: &Value, retry: RetryPolicy) -> StoreResult<Value> {
        with_retry(retry, &self.timings, || Value::Null, || {
            self.send(HttpMethod::PATCH, path, Some(body), None)
        })
        .await
    }

    async fn create_or_modify(
        &self,
        path: &str,
        body: &Value,
        retry: RetryPolicy,
    ) -> StoreResult<Value> {
        with_retry(retry, &self.timings, || Value::Null, || async move {
            match self.send(HttpMethod::PATCH, path, Some(body), None).await {
                Err(e) if e.is_not_found() => self.post_object(path, body, None).await,
                other => other,
            }
        })
        .await
    }

    async fn delete(&self, path: &str, retry: RetryPolicy) -> StoreResult<()> {
        with_retry(retry, &self.timings, || (), || async move {
            self.send(HttpMethod::DELETE, path, None, None)
                .await
                .map(drop)
        })
        .await
    }

    async fn list(&self, path: &str, retry: RetryPolicy) -> StoreResult<Vec<Value>> {
        let value = with_retry(retry, &self.timings, || Value::Null, || {
            self.send(HttpMethod::GET, path, None, None)
        })
        .await?;
        Ok(into_items(value))
    }

    async fn transaction(&self, items: Vec<TransactionItem>) -> StoreResult<Value> {
        let opened = self
            .send(HttpMethod::POST, TRANSACTION_PATH, Some(&json!({})), None)
            .await?;
        let id = match opened.get("transId") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(StoreError::new(500, "Appliance did not return a transaction id")),
        };
        debug!(id = %id, count = items.len(), "Opened transaction");

        if let Err(e) = self.fill_transaction(&id, &items).await {
            self.discard_transaction(&id).await;
            return Err(e);
        }

        info!(id = %id, count = items.len(), "Committing transaction");
        let committed = self
            .send(
                HttpMethod::PATCH,
                &transaction_path(&id),
                Some(&json!({ "state": "VALIDATING" })),
                None,
            )
            .await?;
        check_commit(&id, &committed)?;
        Ok(committed)
    }
}

impl RestStore {
    async fn fill_transaction(&self, id: &str, items: &[TransactionItem]) -> StoreResult<()> {
        let empty = Value::Null;
        for item in items {
            let body = item.body.as_ref().unwrap_or(&empty);
            match item.method {
                Method::Create => {
                    self.post_object(&item.path, body, Some(id)).await?;
                }
                Method::Modify | Method::CreateOrModify => {
                    self.send(HttpMethod::PATCH, &item.path, Some(body), Some(id))
                        .await?;
                }
                Method::Delete => {
                    self.send(HttpMethod::DELETE, &item.path, None, Some(id))
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Drop an open transaction; the member failure is what gets reported
    async fn discard_transaction(&self, id: &str) {
        if let Err(e) = self
            .send(HttpMethod::DELETE, &transaction_path(id), None, None)
            .await
        {
            warn!(id, error = %e, "Failed to discard transaction");
        }
    }
}

fn transaction_path(id: &str) -> String {
    format!("{}/{}", TRANSACTION_PATH, id)
}

/// A commit reporting any state other than `COMPLETED` failed
fn check_commit(id: &str, committed: &Value) -> StoreResult<()> {
    match committed.get("state").and_then(Value::as_str) {
        None | Some("COMPLETED") => Ok(()),
        Some(state) => {
            let reason = committed
                .get("failureReason")
                .and_then(Value::as_str)
                .unwrap_or("no reason given");
            Err(StoreError::new(
                409,
                format!("Transaction {} ended in state {}: {}", id, state, reason),
            ))
        }
    }
}

/// Collection path and body for creating the object at `path`
fn create_request(path: &str, body: &Value) -> StoreResult<(String, Value)> {
    let (collection, partition, name) = split_object_path(path)
        .ok_or_else(|| StoreError::new(400, format!("Invalid object path {}", path)))?;
    let mut body = match body {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => {
            return Err(StoreError::new(
                400,
                format!("Body for {} must be an object", path),
            ))
        }
    };
    body.entry("name").or_insert_with(|| name.into());
    if let Some(partition) = partition {
        body.entry("partition").or_insert_with(|| partition.into());
    }
    Ok((collection.to_string(), Value::Object(body)))
}

/// Collection responses carry `items` (absent when empty); single objects
/// are returned as a one-element list.
fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut obj)
            if obj
                .get("kind")
                .and_then(Value::as_str)
                .is_some_and(|k| k.ends_with("collectionstate")) =>
        {
            match obj.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// The appliance's own message when it sent one
fn error_message(text: &str, reason: Option<&str>) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) {
        if let Some(message) = obj.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let text = text.trim();
    if text.is_empty() {
        reason.unwrap_or("Unknown error").to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_request_fills_identity() {
        let (collection, body) =
            create_request("/tm/net/self/~Common~s1", &json!({"address": "10.0.0.5/24"})).unwrap();
        assert_eq!(collection, "/tm/net/self");
        assert_eq!(
            body,
            json!({"name": "s1", "partition": "Common", "address": "10.0.0.5/24"})
        );

        let (collection, body) = create_request("/tm/auth/radius/system-auth", &Value::Null).unwrap();
        assert_eq!(collection, "/tm/auth/radius");
        assert_eq!(body, json!({"name": "system-auth"}));

        assert!(create_request("/tm/net/self/~Common~s1", &json!([1])).is_err());
    }

    #[test]
    fn test_into_items() {
        let collection = json!({
            "kind": "tm:net:self:selfcollectionstate",
            "items": [{"name": "s1"}, {"name": "s2"}]
        });
        assert_eq!(into_items(collection).len(), 2);

        let empty = json!({"kind": "tm:net:self:selfcollectionstate"});
        assert!(into_items(empty).is_empty());

        let single = json!({"kind": "tm:net:self:selfstate", "name": "s1"});
        assert_eq!(into_items(single.clone()), vec![single]);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"code":400,"message":"01070712:3: in use"}"#, Some("Bad Request")),
            "01070712:3: in use"
        );
        assert_eq!(error_message("", Some("Not Found")), "Not Found");
        assert_eq!(error_message("gateway down", None), "gateway down");
    }

    #[test]
    fn test_check_commit() {
        assert!(check_commit("17", &json!({"transId": 17, "state": "COMPLETED"})).is_ok());
        assert!(check_commit("17", &Value::Null).is_ok());

        let err = check_commit(
            "17",
            &json!({"transId": 17, "state": "FAILED", "failureReason": "01070734:3: bad vlan"}),
        )
        .unwrap_err();
        assert_eq!(err.message, "Transaction 17 ended in state FAILED: 01070734:3: bad vlan");
        assert_eq!(err.kind(), onboard_orch_common::ErrorKind::Conflict);
        assert_eq!(transaction_path("17"), "/tm/transaction/17");
    }

    #[test]
    fn test_url() {
        let store = RestStore::new(&OnboardConfig::default()).unwrap();
        assert_eq!(
            store.url("/tm/net/self/~Common~s1"),
            "https://127.0.0.1:443/mgmt/tm/net/self/~Common~s1"
        );
    }
}
