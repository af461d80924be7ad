//! Evaluation backend that serves static values from a document.
//!
//! No targeting rules are evaluated. A value resolves from the per-user
//! override for the identity's `userID`, then the global entry, then the
//! default (`false` for gates, an empty mapping otherwise).

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::application::backend::{
    BackendError, BackendOptions, DynamicConfig, EvaluationBackend, ParameterStore,
};
use crate::cache::DataAdapter;
use crate::domain::BackendIdentity;
use crate::infra::error::InfraError;
use crate::util::lock::{rw_read, rw_write};

/// Data-adapter key the document snapshot is stored under.
pub const SNAPSHOT_KEY: &str = "gatehouse.local.snapshot";

const LOCK_TARGET: &str = "gatehouse::infra::backends::local";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDocument {
    pub gates: BTreeMap<String, bool>,
    pub configs: BTreeMap<String, Map<String, Value>>,
    pub param_stores: BTreeMap<String, Map<String, Value>>,
    pub user_gates: BTreeMap<String, BTreeMap<String, bool>>,
    pub user_configs: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
}

impl LocalDocument {
    /// Parse a document; `.json` files are read as JSON, anything else as TOML.
    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(&raw).map_err(|err| err.to_string())
        } else {
            toml::from_str(&raw).map_err(|err| err.to_string())
        };

        parsed.map_err(|reason| {
            InfraError::configuration(format!(
                "failed to parse overrides file `{}`: {reason}",
                path.display()
            ))
        })
    }

    fn gate(&self, user_id: Option<&str>, name: &str) -> bool {
        user_id
            .and_then(|id| self.user_gates.get(id))
            .and_then(|gates| gates.get(name))
            .or_else(|| self.gates.get(name))
            .copied()
            .unwrap_or(false)
    }

    fn config(&self, user_id: Option<&str>, name: &str) -> DynamicConfig {
        let user_value = user_id
            .and_then(|id| self.user_configs.get(id))
            .and_then(|configs| configs.get(name));

        let (value, rule_id) = match (user_value, self.configs.get(name)) {
            (Some(value), _) => (value.clone(), Some("user_override")),
            (None, Some(value)) => (value.clone(), Some("global")),
            (None, None) => (Map::new(), None),
        };

        DynamicConfig {
            name: name.to_string(),
            value,
            rule_id: rule_id.map(str::to_string),
        }
    }

    fn param_store(&self, name: &str) -> ParameterStore {
        ParameterStore::new(
            name,
            self.param_stores.get(name).cloned().unwrap_or_default(),
        )
    }
}

#[derive(Default)]
struct LocalState {
    document: LocalDocument,
    ready: bool,
    adapter: Option<Arc<dyn DataAdapter>>,
}

pub struct LocalBackend {
    state: RwLock<LocalState>,
}

impl LocalBackend {
    pub fn new(document: LocalDocument) -> Self {
        Self {
            state: RwLock::new(LocalState {
                document,
                ..LocalState::default()
            }),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, InfraError> {
        Ok(Self::new(LocalDocument::load(path).await?))
    }

    pub fn override_gate(&self, name: impl Into<String>, enabled: bool) {
        let mut state = rw_write(&self.state, LOCK_TARGET, "override_gate");
        state.document.gates.insert(name.into(), enabled);
    }

    pub fn override_config(&self, name: impl Into<String>, value: Map<String, Value>) {
        let mut state = rw_write(&self.state, LOCK_TARGET, "override_config");
        state.document.configs.insert(name.into(), value);
    }

    pub fn document(&self) -> LocalDocument {
        rw_read(&self.state, LOCK_TARGET, "document")
            .document
            .clone()
    }

    fn read_ready<T>(
        &self,
        op: &'static str,
        read: impl FnOnce(&LocalDocument) -> T,
    ) -> Result<T, BackendError> {
        let state = rw_read(&self.state, LOCK_TARGET, op);
        if !state.ready {
            return Err(BackendError::unavailable("local backend is not initialized"));
        }
        Ok(read(&state.document))
    }

    async fn bootstrap(&self, adapter: &Arc<dyn DataAdapter>) -> Result<(), BackendError> {
        adapter
            .initialize()
            .await
            .map_err(|err| BackendError::unavailable(err.to_string()))?;

        let stored = adapter
            .get(SNAPSHOT_KEY)
            .await
            .map_err(|err| BackendError::unavailable(err.to_string()))?;

        if let Some(raw) = stored {
            match serde_json::from_str::<LocalDocument>(&raw) {
                Ok(document) => {
                    info!(key = SNAPSHOT_KEY, "bootstrapped local backend from data store");
                    rw_write(&self.state, LOCK_TARGET, "bootstrap").document = document;
                    return Ok(());
                }
                Err(err) => {
                    warn!(key = SNAPSHOT_KEY, error = %err, "ignoring undecodable snapshot");
                }
            }
        }

        let snapshot = serde_json::to_string(&self.document())
            .map_err(|err| BackendError::unavailable(format!("failed to encode snapshot: {err}")))?;
        adapter
            .set(SNAPSHOT_KEY, &snapshot)
            .await
            .map_err(|err| BackendError::unavailable(err.to_string()))?;
        debug!(key = SNAPSHOT_KEY, bytes = snapshot.len(), "stored local snapshot");
        Ok(())
    }
}

#[async_trait]
impl EvaluationBackend for LocalBackend {
    async fn initialize(&self, options: BackendOptions) -> Result<(), BackendError> {
        if options.token.trim().is_empty() {
            return Err(BackendError::unavailable("a non-empty server secret is required"));
        }

        if let Some(adapter) = options.data_adapter.as_ref() {
            self.bootstrap(adapter).await?;
        }

        let mut state = rw_write(&self.state, LOCK_TARGET, "initialize");
        state.adapter = options.data_adapter;
        state.ready = true;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        let adapter = {
            let mut state = rw_write(&self.state, LOCK_TARGET, "shutdown");
            state.ready = false;
            state.adapter.take()
        };

        if let Some(adapter) = adapter {
            adapter
                .shutdown()
                .await
                .map_err(|err| BackendError::unavailable(err.to_string()))?;
        }
        Ok(())
    }

    async fn check_gate(
        &self,
        identity: &BackendIdentity,
        gate_name: &str,
    ) -> Result<bool, BackendError> {
        self.read_ready("check_gate", |document| {
            document.gate(identity.user_id.as_deref(), gate_name)
        })
    }

    async fn get_dynamic_config(
        &self,
        identity: &BackendIdentity,
        config_name: &str,
    ) -> Result<DynamicConfig, BackendError> {
        self.read_ready("get_dynamic_config", |document| {
            document.config(identity.user_id.as_deref(), config_name)
        })
    }

    async fn get_parameter_store(
        &self,
        _identity: &BackendIdentity,
        store_name: &str,
    ) -> Result<ParameterStore, BackendError> {
        self.read_ready("get_parameter_store", |document| {
            document.param_store(store_name)
        })
    }
}
