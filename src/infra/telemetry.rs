use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tsuzuri_store_mutation_total",
            Unit::Count,
            "Total number of committed post store mutations."
        );
        describe_counter!(
            "tsuzuri_store_conflict_total",
            Unit::Count,
            "Total number of store mutations rejected for duplicate slugs."
        );
        describe_counter!(
            "tsuzuri_response_cache_hit_total",
            Unit::Count,
            "Total number of public page response-cache hits."
        );
        describe_counter!(
            "tsuzuri_response_cache_miss_total",
            Unit::Count,
            "Total number of public page response-cache misses."
        );
        describe_counter!(
            "tsuzuri_upload_total",
            Unit::Count,
            "Total number of stored image uploads."
        );
        describe_counter!(
            "tsuzuri_upload_rejected_total",
            Unit::Count,
            "Total number of uploads rejected as invalid media."
        );
        describe_counter!(
            "tsuzuri_generation_failure_total",
            Unit::Count,
            "Total number of failed or timed-out draft generations."
        );
        describe_counter!(
            "tsuzuri_invalidation_failure_total",
            Unit::Count,
            "Total number of render invalidation failures per target."
        );
    });
}
