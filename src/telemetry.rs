use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::board::{GroupId, RecordId};
use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .try_init()?;
    }

    tracing::info!("Attendance board telemetry initialized");
    Ok(())
}

/// Correlation id linking everything one move does
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn create_move_span(
    record_id: &RecordId,
    source: &GroupId,
    target: &GroupId,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "board_move",
        record.id = %record_id,
        group.source = %source,
        group.target = %target,
        correlation.id = correlation_id,
    )
}
