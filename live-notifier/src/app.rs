//! Startup wiring.

use stream_platforms::StreamStatusProvider;
use stream_platforms::http::default_client;
use stream_platforms::twitch::HelixClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::monitor::{self, StatusReconciler};
use crate::notification::DiscordChannel;
use crate::state::StateStore;
use crate::{Error, Result};

/// Build the components from `config` and poll until `shutdown` fires.
///
/// `abort` skips whatever is still in flight once shutdown has started to
/// hang; see [`monitor::run`].
///
/// Failing to obtain the initial access token is fatal. An unusable state
/// file only costs the recovery of an earlier notification.
pub async fn run(
    config: AppConfig,
    shutdown: CancellationToken,
    abort: CancellationToken,
) -> Result<()> {
    let client = default_client(config.http_timeout)
        .map_err(|e| Error::Other(format!("Failed to build HTTP client: {e}")))?;

    let mut helix = HelixClient::new(client.clone(), config.helix.clone());
    helix.refresh_access_token().await?;

    let discord = DiscordChannel::new(config.discord.clone(), client);
    let mut reconciler = StatusReconciler::new(helix, discord, config.streamer.clone());
    reconciler.load_profile_image().await;

    let store = StateStore::new(&config.state_file);
    if let Some(saved) = store.load().await {
        reconciler.restore(saved);
    }

    info!(
        streamer = %config.streamer,
        is_live = reconciler.state().is_live,
        "Set-up looks correct"
    );
    monitor::run(
        &mut reconciler,
        &store,
        config.poll_interval,
        shutdown,
        abort,
    )
    .await;
    Ok(())
}
