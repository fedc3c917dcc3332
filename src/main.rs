use std::sync::Arc;

use mousetrap::config::Config;
use mousetrap::registry::{self, Registry};
use mousetrap::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let cfg = Arc::new(Config::from_env());
    let registry = Registry::new(cfg.clone());
    registry::spawn_reaper(registry.clone());

    let app = mousetrap::router(registry);
    let addr = cfg.server_addr();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
