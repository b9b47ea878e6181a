// Tracing setup for the CLI
//
// Logs go to stderr so JSON/YAML reports on stdout stay machine-readable.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "taskpool=info,taskpool_cli=info";

/// Resolve the log filter: explicit value, then `RUST_LOG`, then `LOG_LEVEL`
pub fn log_filter(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .or_else(|| {
            std::env::var("LOG_LEVEL")
                .ok()
                .map(|level| format!("taskpool={level},taskpool_cli={level}"))
        })
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
