//! Tenant -> class -> object configuration trees.
//!
//! The same shape carries the declaration, the last-known appliance state and
//! both halves of a diff. A collection class maps object names to bodies;
//! singleton classes (e.g. `ConfigSync`) hold a body directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The partition that holds network objects.
pub const COMMON_PARTITION: &str = "Common";

/// Configuration of a single tenant: class name -> class value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantConfig(BTreeMap<String, Value>);

impl TenantConfig {
    /// Returns the raw value of a class.
    pub fn class(&self, class: &str) -> Option<&Value> {
        self.0.get(class)
    }

    /// Returns class names present in this tenant.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// A configuration tree keyed by tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree(BTreeMap<String, TenantConfig>);

/// Desired end state.
pub type Declaration = ConfigTree;

/// Last-known appliance state.
pub type CurrentConfig = ConfigTree;

impl ConfigTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no tenant holds any class.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|t| t.0.is_empty())
    }

    /// Returns tenants in key order.
    pub fn tenants(&self) -> impl Iterator<Item = (&str, &TenantConfig)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns a tenant's configuration.
    pub fn tenant(&self, tenant: &str) -> Option<&TenantConfig> {
        self.0.get(tenant)
    }

    /// Returns a class value for a tenant.
    pub fn class(&self, tenant: &str, class: &str) -> Option<&Value> {
        self.0.get(tenant).and_then(|t| t.class(class))
    }

    /// Iterates the objects of a collection class, by name.
    ///
    /// Non-object class values yield nothing.
    pub fn objects<'a>(
        &'a self,
        tenant: &str,
        class: &str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.class(tenant, class)
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Returns a single object body.
    pub fn object(&self, tenant: &str, class: &str, name: &str) -> Option<&Value> {
        self.class(tenant, class)
            .and_then(Value::as_object)
            .and_then(|m| m.get(name))
    }

    /// Returns true if the object is present.
    pub fn contains(&self, tenant: &str, class: &str, name: &str) -> bool {
        self.object(tenant, class, name).is_some()
    }

    /// Inserts an object, creating the tenant and class as needed.
    ///
    /// A non-object class value is replaced.
    pub fn insert_object(
        &mut self,
        tenant: impl Into<String>,
        class: impl Into<String>,
        name: impl Into<String>,
        body: Value,
    ) {
        let class_value = self
            .0
            .entry(tenant.into())
            .or_default()
            .0
            .entry(class.into())
            .or_insert_with(|| Value::Object(Map::new()));
        if !class_value.is_object() {
            *class_value = Value::Object(Map::new());
        }
        if let Value::Object(map) = class_value {
            map.insert(name.into(), body);
        }
    }

    /// Sets a singleton class value.
    pub fn insert_class(&mut self, tenant: impl Into<String>, class: impl Into<String>, value: Value) {
        self.0
            .entry(tenant.into())
            .or_default()
            .0
            .insert(class.into(), value);
    }
}

/// The externally computed difference between declaration and current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    /// Objects to create or modify.
    #[serde(default)]
    pub to_update: ConfigTree,
    /// Objects present only in current state.
    #[serde(default)]
    pub to_delete: ConfigTree,
}

impl Diff {
    /// Creates a diff from its halves.
    pub fn new(to_update: ConfigTree, to_delete: ConfigTree) -> Self {
        Self {
            to_update,
            to_delete,
        }
    }
}
