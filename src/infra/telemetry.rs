use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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
            "foglio_cache_hit_total",
            Unit::Count,
            "Total number of query-cache hits."
        );
        describe_counter!(
            "foglio_cache_miss_total",
            Unit::Count,
            "Total number of query-cache misses."
        );
        describe_counter!(
            "foglio_cache_error_total",
            Unit::Count,
            "Total number of query-cache operations that failed and degraded to the durable store."
        );
        describe_counter!(
            "foglio_counter_increment_dropped_total",
            Unit::Count,
            "Total number of view increments dropped because the volatile store was unreachable."
        );
        describe_counter!(
            "foglio_reconcile_ratchet_total",
            Unit::Count,
            "Total number of per-record ratchet updates committed by reconciliation."
        );
        describe_counter!(
            "foglio_reconcile_failed_total",
            Unit::Count,
            "Total number of per-record ratchet updates that failed."
        );
        describe_histogram!(
            "foglio_reconcile_pass_ms",
            Unit::Milliseconds,
            "Reconciliation pass latency in milliseconds."
        );
    });
}
