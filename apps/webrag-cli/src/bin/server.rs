use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use webrag_cli::server::{serve, AppState};
use webrag_cli::{build_orchestrator, init_tracing};
use webrag_core::config::Config;
use webrag_gate::AccessGate;
use webrag_rag::HttpFetcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;

    let orchestrator = tokio::task::spawn_blocking({
        let settings = settings.clone();
        move || build_orchestrator(&settings)
    })
    .await??;
    let fetcher = Arc::new(HttpFetcher::from_settings(&settings.fetch)?);
    let gate = Arc::new(AccessGate::from_settings(&settings.gate));
    info!(
        max_requests = gate.max_requests(),
        window_secs = gate.window().as_secs(),
        context_size = orchestrator.context_size(),
        "engine ready"
    );

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| format!("invalid server address {}:{}", settings.server.host, settings.server.port))?;
    let state = AppState { orchestrator, fetcher, gate };
    serve(state, addr, Duration::from_secs(settings.gate.purge_interval_secs.max(1))).await
}
