//! Evaluation facade: gate checks, dynamic configs and parameter stores
//! resolved for a normalized caller identity.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, Ordering},
};

use serde_json::Value;
use tokio::sync::Mutex;

use super::backend::{
    BackendOptions, EnvironmentTier, EvaluationBackend, ResourceKind, StructuredValue,
};
use super::error::EvaluationError;
use super::observer::{EvaluationObserver, LifecycleEvent, TracingObserver};
use crate::cache::{DataAdapter, DataStore, KeyValueStore};
use crate::domain::{BackendIdentity, Identity, IdentityInput, build};

/// Construction options for [`RolloutService`].
#[derive(Debug, Clone)]
pub struct RolloutOptions {
    pub token: String,
    pub environment: Option<EnvironmentTier>,
}

impl RolloutOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            environment: None,
        }
    }

    pub fn with_environment(mut self, tier: impl Into<String>) -> Self {
        self.environment = Some(EnvironmentTier::new(tier));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Ready,
    ShutDown,
}

/// Facade over an [`EvaluationBackend`].
///
/// One instance is shared by all concurrent requests. Evaluation calls are
/// valid only between [`initialize`](Self::initialize) and
/// [`shutdown`](Self::shutdown).
pub struct RolloutService {
    backend: Arc<dyn EvaluationBackend>,
    options: RolloutOptions,
    data_adapter: Option<Arc<dyn DataAdapter>>,
    observer: Arc<dyn EvaluationObserver>,
    lifecycle: Mutex<Lifecycle>,
    ready: AtomicBool,
    default_identity: OnceLock<Identity>,
}

impl RolloutService {
    pub fn new(options: RolloutOptions, backend: Arc<dyn EvaluationBackend>) -> Self {
        Self {
            backend,
            options,
            data_adapter: None,
            observer: Arc::new(TracingObserver),
            lifecycle: Mutex::new(Lifecycle::Created),
            ready: AtomicBool::new(false),
            default_identity: OnceLock::new(),
        }
    }

    /// Persist backend state through `store`, wrapped in a [`DataStore`].
    pub fn with_cache(self, store: Arc<dyn KeyValueStore>) -> Self {
        self.with_data_adapter(Arc::new(DataStore::new(store)))
    }

    pub fn with_data_adapter(mut self, adapter: Arc<dyn DataAdapter>) -> Self {
        self.data_adapter = Some(adapter);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EvaluationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Establish the backend session. A second call while ready is a no-op.
    pub async fn initialize(&self) -> Result<(), EvaluationError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Ready => return Ok(()),
            Lifecycle::ShutDown => return Err(EvaluationError::ShutDown),
            Lifecycle::Created => {}
        }

        let options = BackendOptions {
            token: self.options.token.clone(),
            environment: self.options.environment.clone(),
            data_adapter: self.data_adapter.clone(),
        };
        self.backend.initialize(options).await?;

        *lifecycle = Lifecycle::Ready;
        self.ready.store(true, Ordering::Release);
        self.observer.lifecycle(LifecycleEvent::Initialized);
        Ok(())
    }

    /// Release the backend session. Calling it again, or before
    /// initialization, does nothing.
    pub async fn shutdown(&self) -> Result<(), EvaluationError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if *lifecycle != Lifecycle::Ready {
            return Ok(());
        }

        self.ready.store(false, Ordering::Release);
        *lifecycle = Lifecycle::ShutDown;
        self.backend.shutdown().await?;
        self.observer.lifecycle(LifecycleEvent::ShutDown);
        Ok(())
    }

    /// The identity used when a caller supplies none. Built once per facade.
    pub fn default_identity(&self) -> &Identity {
        self.default_identity.get_or_init(Identity::default)
    }

    pub async fn check_gate(
        &self,
        gate_name: &str,
        identity: Option<IdentityInput>,
    ) -> Result<bool, EvaluationError> {
        self.ensure_ready()?;
        let user = self.resolve_identity(identity)?;

        let enabled = self
            .backend
            .check_gate(&user, gate_name)
            .await
            .inspect_err(|err| {
                self.observer
                    .evaluation_failed(ResourceKind::Gate, gate_name, err)
            })?;

        self.observer.gate_checked(gate_name, &user, enabled);
        Ok(enabled)
    }

    /// Resolve a dynamic config. With `key`, only that entry is returned and
    /// an absent entry yields `None`.
    pub async fn get_config(
        &self,
        config_name: &str,
        identity: Option<IdentityInput>,
        key: Option<&str>,
    ) -> Result<Option<Value>, EvaluationError> {
        self.ensure_ready()?;
        let user = self.resolve_identity(identity)?;

        let config = self
            .backend
            .get_dynamic_config(&user, config_name)
            .await
            .inspect_err(|err| {
                self.observer
                    .evaluation_failed(ResourceKind::DynamicConfig, config_name, err)
            })?;

        Ok(self.project(ResourceKind::DynamicConfig, config_name, &user, config, key))
    }

    /// Resolve a parameter store; same lookup rules as [`get_config`](Self::get_config).
    pub async fn get_parameter_store(
        &self,
        store_name: &str,
        identity: Option<IdentityInput>,
        key: Option<&str>,
    ) -> Result<Option<Value>, EvaluationError> {
        self.ensure_ready()?;
        let user = self.resolve_identity(identity)?;

        let store = self
            .backend
            .get_parameter_store(&user, store_name)
            .await
            .inspect_err(|err| {
                self.observer
                    .evaluation_failed(ResourceKind::ParameterStore, store_name, err)
            })?;

        Ok(self.project(ResourceKind::ParameterStore, store_name, &user, store, key))
    }

    fn ensure_ready(&self) -> Result<(), EvaluationError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(EvaluationError::NotInitialized)
        }
    }

    fn resolve_identity(
        &self,
        identity: Option<IdentityInput>,
    ) -> Result<Arc<BackendIdentity>, EvaluationError> {
        match identity {
            Some(input) => Ok(build(input)?.to_backend_identity()),
            None => Ok(self.default_identity().to_backend_identity()),
        }
    }

    fn project<R: StructuredValue>(
        &self,
        kind: ResourceKind,
        name: &str,
        user: &BackendIdentity,
        resolved: R,
        key: Option<&str>,
    ) -> Option<Value> {
        self.observer
            .value_resolved(kind, name, user, resolved.value());

        let Some(key) = key else {
            return Some(Value::Object(resolved.into_value()));
        };

        match resolved.get_or(key, Value::Null) {
            Value::Null => {
                self.observer.projection_missed(kind, name, key);
                None
            }
            value => Some(value),
        }
    }
}
