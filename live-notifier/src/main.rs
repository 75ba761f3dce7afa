use live_notifier::{app, config::AppConfig, logging, panic_hook};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    let log_dir = config.as_ref().ok().and_then(|c| c.log_dir.clone());
    let _log_guard = logging::init_logging(log_dir.as_deref())?;
    panic_hook::install(log_dir);

    let config = config.inspect_err(|e| error!("{e}"))?;
    info!(version = env!("CARGO_PKG_VERSION"), "Initiating live-notifier");

    let shutdown = CancellationToken::new();
    let abort = CancellationToken::new();
    tokio::spawn(watch_interrupts(shutdown.clone(), abort.clone()));

    app::run(config, shutdown, abort).await?;
    info!("live-notifier stopped");
    Ok(())
}

/// First interrupt asks for a graceful stop, the second one abandons it.
async fn watch_interrupts(shutdown: CancellationToken, abort: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for interrupt signal");
        return;
    }
    info!("Received interrupt signal, press Ctrl+C again to exit immediately");
    shutdown.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Received second interrupt signal");
        abort.cancel();
    }
}
