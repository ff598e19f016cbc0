use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_LAYER_CACHE_ENTRIES, METRIC_LAYER_CACHE_HIT, METRIC_LAYER_CACHE_INVALIDATE,
    METRIC_LAYER_CACHE_MISS, METRIC_LAYER_FETCH_ERROR,
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

/// Register metric descriptions with whatever recorder is installed.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_LAYER_CACHE_HIT,
            Unit::Count,
            "Layer image requests answered from the layer cache."
        );
        describe_counter!(
            METRIC_LAYER_CACHE_MISS,
            Unit::Count,
            "Layer image requests that had to fetch from the blob store."
        );
        describe_counter!(
            METRIC_LAYER_CACHE_INVALIDATE,
            Unit::Count,
            "Layer cache entries removed by saves and deletes."
        );
        describe_counter!(
            METRIC_LAYER_FETCH_ERROR,
            Unit::Count,
            "Blob store fetches for layer images that failed."
        );
        describe_gauge!(
            METRIC_LAYER_CACHE_ENTRIES,
            Unit::Count,
            "Current number of entries in the layer cache."
        );
    });
}
