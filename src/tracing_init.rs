//! Process-wide tracing setup — the single place a global subscriber is
//! installed. Every library crate only ever calls `tracing::info!`/`warn!`/
//! etc. and never touches a subscriber itself.

use tracing_subscriber::{fmt, EnvFilter};

/// Reads `GITVAN_TRACE` (falling back to `info`) the same way the
/// teacher's CLI reads `KNHK_TRACE`, then falls through to `RUST_LOG` via
/// [`EnvFilter::from_default_env`] if `GITVAN_TRACE` is unset entirely.
pub fn init() {
    let filter = match std::env::var("GITVAN_TRACE") {
        Ok(level) => EnvFilter::new(match level.to_lowercase().as_str() {
            "error" => "error",
            "warn" => "warn",
            "info" => "info",
            "debug" => "debug",
            "trace" => "trace",
            "1" | "true" | "yes" => "debug",
            "0" | "false" | "no" => "error",
            _ => "info",
        }),
        Err(_) => EnvFilter::from_default_env(),
    };

    fmt().with_env_filter(filter).with_target(true).init();
}
