//! Observability seam for the evaluation facade.

use metrics::counter;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::backend::{BackendError, ResourceKind};
use crate::domain::BackendIdentity;

pub const GATE_CHECKS_TOTAL: &str = "gatehouse_gate_checks_total";
pub const CONFIG_LOOKUPS_TOTAL: &str = "gatehouse_config_lookups_total";
pub const PARAM_STORE_LOOKUPS_TOTAL: &str = "gatehouse_param_store_lookups_total";
pub const PROJECTION_MISS_TOTAL: &str = "gatehouse_projection_miss_total";
pub const EVALUATION_ERRORS_TOTAL: &str = "gatehouse_evaluation_errors_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Initialized,
    ShutDown,
}

/// Receives diagnostics from the facade's evaluation path.
pub trait EvaluationObserver: Send + Sync {
    fn gate_checked(&self, _gate_name: &str, _identity: &BackendIdentity, _enabled: bool) {}

    fn value_resolved(
        &self,
        _kind: ResourceKind,
        _name: &str,
        _identity: &BackendIdentity,
        _value: &Map<String, Value>,
    ) {
    }

    /// A projection key was absent from a resolved value. Not an error.
    fn projection_missed(&self, kind: ResourceKind, name: &str, key: &str);

    fn evaluation_failed(&self, _kind: ResourceKind, _name: &str, _error: &BackendError) {}

    fn lifecycle(&self, _event: LifecycleEvent) {}
}

/// Default observer: `tracing` events plus `metrics` counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl EvaluationObserver for TracingObserver {
    fn gate_checked(&self, gate_name: &str, identity: &BackendIdentity, enabled: bool) {
        counter!(GATE_CHECKS_TOTAL, "result" => if enabled { "pass" } else { "fail" })
            .increment(1);
        debug!(
            target = "gatehouse::evaluation",
            gate = gate_name,
            user_id = identity.display_id(),
            enabled,
            "gate checked"
        );
    }

    fn value_resolved(
        &self,
        kind: ResourceKind,
        name: &str,
        identity: &BackendIdentity,
        value: &Map<String, Value>,
    ) {
        let metric = match kind {
            ResourceKind::ParameterStore => PARAM_STORE_LOOKUPS_TOTAL,
            _ => CONFIG_LOOKUPS_TOTAL,
        };
        counter!(metric).increment(1);
        let rendered = Value::Object(value.clone());
        debug!(
            target = "gatehouse::evaluation",
            kind = kind.as_str(),
            resource = name,
            user_id = identity.display_id(),
            value = %rendered,
            "value resolved"
        );
    }

    fn projection_missed(&self, kind: ResourceKind, name: &str, key: &str) {
        counter!(PROJECTION_MISS_TOTAL, "kind" => kind.as_str()).increment(1);
        warn!(
            target = "gatehouse::evaluation",
            kind = kind.as_str(),
            resource = name,
            key,
            "key not found in resolved value"
        );
    }

    fn evaluation_failed(&self, kind: ResourceKind, name: &str, error: &BackendError) {
        counter!(EVALUATION_ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
        warn!(
            target = "gatehouse::evaluation",
            kind = kind.as_str(),
            resource = name,
            error = %error,
            "evaluation failed"
        );
    }

    fn lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Initialized => {
                info!(target = "gatehouse::evaluation", "evaluation backend ready")
            }
            LifecycleEvent::ShutDown => {
                info!(target = "gatehouse::evaluation", "evaluation backend shut down")
            }
        }
    }
}
