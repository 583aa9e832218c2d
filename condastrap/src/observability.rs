//! Tracing setup for the wizard binary.

use tracing_subscriber::{prelude::*, EnvFilter};

use condastrap_core::config::ObservabilityConfig;

/// Initialize tracing. Call once at process startup.
///
/// `RUST_LOG` wins when set; otherwise the filter comes from
/// `CONDASTRAP_LOG_LEVEL`, clamped to warnings when `CONDASTRAP_QUIET`
/// is on so prompt output stays clean.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "condastrap=warn"
    } else {
        cfg.log_level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init();
}
