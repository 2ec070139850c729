pub mod channel; // volatile connection registry + best-effort push
pub mod config;
pub mod error;
pub mod inference; // hosted text-completion endpoint client
pub mod models;
pub mod pipeline; // record processing + completion stages
pub mod store; // job/config registries + blob store

use tracing_subscriber::EnvFilter;

/// Initialize tracing for a pipeline process.
///
/// Honors RUST_LOG when set; falls back to the crate default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Otoscribe starting v{}", config::APP_VERSION);
}
