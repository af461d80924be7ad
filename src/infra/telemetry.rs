use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::observer::{
    CONFIG_LOOKUPS_TOTAL, EVALUATION_ERRORS_TOTAL, GATE_CHECKS_TOTAL, PARAM_STORE_LOOKUPS_TOTAL,
    PROJECTION_MISS_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            GATE_CHECKS_TOTAL,
            Unit::Count,
            "Total number of feature gate checks, labelled by result."
        );
        describe_counter!(
            CONFIG_LOOKUPS_TOTAL,
            Unit::Count,
            "Total number of dynamic config lookups."
        );
        describe_counter!(
            PARAM_STORE_LOOKUPS_TOTAL,
            Unit::Count,
            "Total number of parameter store lookups."
        );
        describe_counter!(
            PROJECTION_MISS_TOTAL,
            Unit::Count,
            "Total number of key projections that found no value."
        );
        describe_counter!(
            EVALUATION_ERRORS_TOTAL,
            Unit::Count,
            "Total number of evaluations that failed in the backend."
        );
    });
}
