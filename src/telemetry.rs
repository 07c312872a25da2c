//! Logging setup for experiment binaries.
//!
//! Library code never installs a subscriber; it only emits `tracing`
//! events. Binaries call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
