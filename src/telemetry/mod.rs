//! Tracing initialization.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber with an env-driven filter.
///
/// Use RUST_LOG to configure, e.g.:
/// RUST_LOG=mousetrap=debug,tower_http=info
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mousetrap=info,tower_http=info,axum=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).compact())
        .init();
}
