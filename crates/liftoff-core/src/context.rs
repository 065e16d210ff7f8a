//! Run-scoped activation context.
//!
//! One [`ActivationContext`] lives for a whole orchestration run and is
//! handed by reference to every hook, CanActivate check and observer. It is
//! never module-private: anything a module stores is visible to every module
//! invoked after it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::OrchestratorConfig;

/// Shared property bag plus the run's configuration.
#[derive(Debug, Clone, Default)]
pub struct ActivationContext {
    properties: BTreeMap<String, Value>,
    config: Arc<OrchestratorConfig>,
}

impl ActivationContext {
    #[must_use]
    pub fn new(config: Arc<OrchestratorConfig>) -> Self {
        Self {
            properties: BTreeMap::new(),
            config,
        }
    }

    /// The configuration the run was started with.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.properties.insert(key.into(), value);
        Ok(())
    }

    /// Store a raw JSON value.
    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    /// Read `key` as `T`. `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value does not deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.properties
            .get(key)
            .map(|value| T::deserialize(value))
            .transpose()
    }

    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Loose truthiness used by flag-style gates.
    ///
    /// `true`, non-zero numbers, and strings other than `""`, `"0"`,
    /// `"false"`, `"no"`, `"off"` are truthy. Missing keys, `null`, arrays
    /// and objects are not.
    #[must_use]
    pub fn is_truthy(&self, key: &str) -> bool {
        match self.properties.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "" | "0" | "false" | "no" | "off"
            ),
            _ => false,
        }
    }

    /// Property keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Snapshot of every property, for reports.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}
