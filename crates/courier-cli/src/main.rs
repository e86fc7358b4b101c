use std::sync::Arc;

use anyhow::Context;
use courier_core::Settings;
use courier_core::api::{ApiState, router};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env が無くてもよい
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,courier=debug,courier_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load().context("loading settings")?;
    info!(?settings, "settings loaded");

    let bridge = Arc::new(settings.build_bridge().context("building bridge")?);
    let missing = settings.missing_upstream();
    if !missing.is_empty() {
        warn!(?missing, "upstream not configured; /generate will answer 503");
    }
    bridge.start().await;

    let app = router(Arc::new(ApiState {
        bridge: Arc::clone(&bridge),
        webhook_secret: settings.webhook_secret.clone().filter(|s| !s.is_empty()),
    }));

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "courier listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    // 受付を止めたあとで watcher と sweeper を止める
    bridge.shutdown().await;
    info!("courier stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
        // シグナルが取れないなら止まらずに動き続ける
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
