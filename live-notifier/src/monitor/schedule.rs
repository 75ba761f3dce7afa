//! Fixed-cadence driver loop.

use std::time::Duration;

use stream_platforms::StreamStatusProvider;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::reconciler::StatusReconciler;
use crate::notification::NotificationChannel;
use crate::state::StateStore;

/// Time until the next tick boundary.
///
/// Boundaries sit at whole multiples of `interval` after the loop started,
/// so slow ticks do not push later ticks off the cadence.
pub fn next_delay(elapsed: Duration, interval: Duration) -> Duration {
    let interval_nanos = interval.as_nanos();
    if interval_nanos == 0 {
        return Duration::ZERO;
    }
    let remaining = interval_nanos - elapsed.as_nanos() % interval_nanos;
    Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX))
}

/// Poll until `shutdown` is cancelled, persisting state after every tick.
///
/// Cancellation is observed between ticks. On exit a live notification is
/// finalized once before the final state is written. Cancelling `abort`
/// stops whatever is in flight, including that finalize, and only writes
/// the current state.
pub async fn run<P, C>(
    reconciler: &mut StatusReconciler<P, C>,
    store: &StateStore,
    interval: Duration,
    shutdown: CancellationToken,
    abort: CancellationToken,
) where
    P: StreamStatusProvider,
    C: NotificationChannel,
{
    tokio::select! {
        biased;
        _ = abort.cancelled() => warn!("Aborting without finalizing"),
        _ = drive(reconciler, store, interval, &shutdown) => {}
    }
    persist(store, reconciler).await;
}

async fn drive<P, C>(
    reconciler: &mut StatusReconciler<P, C>,
    store: &StateStore,
    interval: Duration,
    shutdown: &CancellationToken,
) where
    P: StreamStatusProvider,
    C: NotificationChannel,
{
    let started = Instant::now();
    info!(
        streamer = %reconciler.streamer(),
        interval_secs = interval.as_secs_f64(),
        "Starting main loop"
    );

    while !shutdown.is_cancelled() {
        let outcome = reconciler.tick().await;
        debug!(?outcome, is_live = reconciler.state().is_live, "Tick finished");
        persist(store, reconciler).await;

        let delay = next_delay(started.elapsed(), interval);
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!("Caught wish to exit, finalizing");
    reconciler.shutdown().await;
}

async fn persist<P, C>(store: &StateStore, reconciler: &StatusReconciler<P, C>)
where
    P: StreamStatusProvider,
    C: NotificationChannel,
{
    if let Err(e) = store.save(reconciler.state()).await {
        warn!(path = %store.path().display(), error = %e, "Failed to persist state");
    }
}
