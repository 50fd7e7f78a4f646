//! Logging bootstrap, following `huginn-proxy::main::init_tracing` and
//! `huginn-proxy-lib::telemetry::tracing`: an `EnvFilter` that prefers
//! `RUST_LOG`, falling back to a caller-supplied default (here, the
//! configured `LOG_LEVEL`), installed once at process start.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `default_level` is used only
/// when `RUST_LOG` is unset — it's expected to be [`crate::config::Settings::log_level`].
pub fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
