//! spillwayd — serves the streaming movie page demo.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use spillway_api::{ApiState, AppFactory, PageQuery};
use spillway_core::config::SpillwayConfig;

mod demo;

use demo::MovieDemo;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = SpillwayConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = SpillwayConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SpillwayConfig::default()
    });
    tracing::info!(
        default_timeout_ms = config.render.default_timeout_ms,
        network_scale = config.demo.network_scale,
        max_duration_ms = config.demo.max_duration_ms,
        "spillwayd starting"
    );

    let demo = MovieDemo::new(config.demo.clone());
    let app: AppFactory = Arc::new(move |query: &PageQuery| demo.app(query));
    let state = ApiState::new(app, config.render.clone());

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let stats_printer = {
        let counters = state.counters.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let (started, finished, failed) = counters.snapshot();
                tracing::info!(started, finished, failed, "session counters");
            }
        })
    };

    let host = config.server.host.clone();
    let port = config.server.port;
    tokio::select! {
        result = spillway_api::serve(state, &host, port) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "http server failed");
            }
        }
        _ = shutdown_rx.recv() => {}
    }

    stats_printer.abort();
    tracing::info!("spillwayd stopped");
    Ok(())
}
