//! Periscope collector - receives probe reports and serves node detail.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use periscope_app::config::load_config;
use periscope_app::http::{build_router, AppState};
use periscope_app::store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let config = load_config().await;
    let state = AppState {
        store: Arc::new(InMemoryStore::new()),
        probe_token: config.probe_token.clone(),
        id: uuid::Uuid::new_v4().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    if config.probe_token.is_empty() {
        info!("no probe token configured, accepting unauthenticated publishes");
    }

    let app = build_router(state);
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("unparsable listen address {}", config.listen_addr))?;
    info!("collector listening on http://{addr}");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
