//! Application services: the evaluation facade and the contracts it consumes.

pub mod backend;
pub mod error;
pub mod evaluation;
pub mod observer;

pub use backend::{
    BackendError, BackendOptions, DynamicConfig, EnvironmentTier, EvaluationBackend,
    ParameterStore, ResourceKind, StructuredValue,
};
pub use error::EvaluationError;
pub use evaluation::{RolloutOptions, RolloutService};
pub use observer::{EvaluationObserver, LifecycleEvent, TracingObserver};
