//! Capability contract of the evaluation backend.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::cache::DataAdapter;
use crate::domain::BackendIdentity;

/// The class of named resource being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Gate,
    DynamicConfig,
    ParameterStore,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Gate => "gate",
            ResourceKind::DynamicConfig => "dynamic_config",
            ResourceKind::ParameterStore => "parameter_store",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("evaluation backend unavailable: {message}")]
    Unavailable { message: String },
    #[error("evaluating {resource} `{name}` failed: {message}")]
    EvaluationFailed {
        resource: ResourceKind,
        name: String,
        message: String,
    },
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn evaluation_failed(
        resource: ResourceKind,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::EvaluationFailed {
            resource,
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Deployment tier the backend evaluates against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentTier {
    pub tier: String,
}

impl EnvironmentTier {
    pub fn new(tier: impl Into<String>) -> Self {
        Self { tier: tier.into() }
    }
}

/// Session configuration handed to the backend when it is initialized.
#[derive(Clone)]
pub struct BackendOptions {
    pub token: String,
    pub environment: Option<EnvironmentTier>,
    pub data_adapter: Option<Arc<dyn DataAdapter>>,
}

impl fmt::Debug for BackendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendOptions")
            .field("token", &"<redacted>")
            .field("environment", &self.environment)
            .field("data_adapter", &self.data_adapter.is_some())
            .finish()
    }
}

/// A structured evaluation result that supports single-key lookups.
pub trait StructuredValue {
    fn value(&self) -> &Map<String, Value>;

    fn into_value(self) -> Map<String, Value>;

    fn get(&self, key: &str) -> Option<&Value> {
        self.value().get(key)
    }

    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicConfig {
    pub name: String,
    pub value: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl DynamicConfig {
    pub fn new(name: impl Into<String>, value: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            value,
            rule_id: None,
        }
    }
}

impl StructuredValue for DynamicConfig {
    fn value(&self) -> &Map<String, Value> {
        &self.value
    }

    fn into_value(self) -> Map<String, Value> {
        self.value
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterStore {
    pub name: String,
    pub values: Map<String, Value>,
}

impl ParameterStore {
    pub fn new(name: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

impl StructuredValue for ParameterStore {
    fn value(&self) -> &Map<String, Value> {
        &self.values
    }

    fn into_value(self) -> Map<String, Value> {
        self.values
    }
}

/// A remote (or local) service that resolves gates, dynamic configs and
/// parameter stores for a backend identity.
///
/// `initialize` must complete before any evaluation; every call may suspend.
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
    async fn initialize(&self, options: BackendOptions) -> Result<(), BackendError>;

    async fn shutdown(&self) -> Result<(), BackendError>;

    async fn check_gate(
        &self,
        identity: &BackendIdentity,
        gate_name: &str,
    ) -> Result<bool, BackendError>;

    async fn get_dynamic_config(
        &self,
        identity: &BackendIdentity,
        config_name: &str,
    ) -> Result<DynamicConfig, BackendError>;

    async fn get_parameter_store(
        &self,
        identity: &BackendIdentity,
        store_name: &str,
    ) -> Result<ParameterStore, BackendError>;
}
