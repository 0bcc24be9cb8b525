//! Tracing initialization for the API binary.

use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

pub fn init(environment: &str) {
    let console_fmt = tracing_subscriber::fmt::layer().event_format(
        Format::default()
            .compact()
            .with_target(false)
            .without_time(),
    );
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recast=debug,tower_http=debug".into()),
        )
        .with(console_fmt)
        .init();

    tracing::info!(environment = %environment, "Telemetry initialized");
}
