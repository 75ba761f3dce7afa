//! Live status state machine.
//!
//! Each tick compares the freshly polled stream against the previous state
//! and performs at most one notification operation:
//!
//! | state   | poll         | action                | next    |
//! |---------|--------------|-----------------------|---------|
//! | offline | none         | -                     | offline |
//! | offline | stream       | post new message      | live    |
//! | live    | same stream  | update message        | live    |
//! | live    | none         | finalize message      | offline |
//! | live    | other stream | finalize, then post   | live    |
//!
//! Any error aborts the tick and the next tick retries from the last state
//! that was reached. Only a rollover has an intermediate state: once the old
//! message is finalized the reconciler is offline, so a failed post of the
//! new stream is retried as a plain "went live" on the next tick.

use serde::{Deserialize, Serialize};
use stream_platforms::{LiveStreamSnapshot, StreamStatusProvider};
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::notification::NotificationChannel;

/// What the reconciler knows between ticks.
///
/// `last_known_stream` is always set while `is_live` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerState {
    pub is_live: bool,
    #[serde(rename = "stream")]
    pub last_known_stream: Option<LiveStreamSnapshot>,
}

impl ReconcilerState {
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn live(stream: LiveStreamSnapshot) -> Self {
        Self {
            is_live: true,
            last_known_stream: Some(stream),
        }
    }

    /// Message id of the notification for the current stream, if posted.
    pub fn message_id(&self) -> Option<&str> {
        self.last_known_stream
            .as_ref()
            .and_then(|s| s.notification_message_id.as_deref())
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Offline and still offline.
    Idle,
    WentLive,
    Updated,
    WentOffline,
    /// A different stream replaced the one being tracked.
    Rollover,
    /// The tick failed; state is unchanged.
    Failed,
}

pub struct StatusReconciler<P, C> {
    provider: P,
    channel: C,
    streamer: String,
    profile_image_url: Option<String>,
    state: ReconcilerState,
}

impl<P, C> StatusReconciler<P, C>
where
    P: StreamStatusProvider,
    C: NotificationChannel,
{
    pub fn new(provider: P, channel: C, streamer: impl Into<String>) -> Self {
        Self {
            provider,
            channel,
            streamer: streamer.into(),
            profile_image_url: None,
            state: ReconcilerState::offline(),
        }
    }

    pub fn state(&self) -> &ReconcilerState {
        &self.state
    }

    pub fn streamer(&self) -> &str {
        &self.streamer
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Look up the streamer's profile picture for notification embeds.
    ///
    /// Failures only cost the embed its author icon.
    pub async fn load_profile_image(&mut self) {
        match self.provider.get_profile_image_url(&self.streamer).await {
            Ok(Some(url)) => {
                debug!(url = %url, "Cached streamer profile image");
                self.profile_image_url = Some(url);
            }
            Ok(None) => warn!(streamer = %self.streamer, "No profile image available"),
            Err(e) => warn!(streamer = %self.streamer, error = %e, "Failed to fetch profile image"),
        }
    }

    /// Seed the reconciler with state saved by an earlier run.
    ///
    /// A live state is only kept when it references a posted message;
    /// otherwise the stream is treated as not yet announced.
    pub fn restore(&mut self, state: ReconcilerState) {
        if !state.is_live {
            self.state = ReconcilerState::offline();
            return;
        }

        let Some(message_id) = state.message_id().map(str::to_string) else {
            warn!("Saved live state has no notification message, starting offline");
            self.state = ReconcilerState::offline();
            return;
        };

        info!(message_id = %message_id, "Recovering notification from saved state");
        self.channel.adopt_message(message_id);
        self.state = state;
    }

    /// Run one poll-decide-act cycle.
    ///
    /// Errors are logged here and never escape. The state reflects the
    /// notification operations that did succeed.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.try_tick().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(streamer = %self.streamer, error = ?e, "Tick failed, keeping previous state");
                TickOutcome::Failed
            }
        }
    }

    async fn try_tick(&mut self) -> Result<TickOutcome> {
        let polled = self
            .provider
            .get_current_live_stream(&self.streamer)
            .await?;

        match (self.state.is_live, polled) {
            (false, None) => Ok(TickOutcome::Idle),
            (false, Some(stream)) => {
                self.go_live(stream).await?;
                Ok(TickOutcome::WentLive)
            }
            (true, None) => {
                self.go_offline().await?;
                Ok(TickOutcome::WentOffline)
            }
            (true, Some(stream)) => {
                let same_stream = self
                    .state
                    .last_known_stream
                    .as_ref()
                    .is_some_and(|last| last.is_same_stream(&stream));

                if same_stream {
                    self.update(stream).await?;
                    Ok(TickOutcome::Updated)
                } else {
                    info!(stream_id = %stream.id, "A new stream replaced the tracked one");
                    self.go_offline().await?;
                    self.go_live(stream).await?;
                    Ok(TickOutcome::Rollover)
                }
            }
        }
    }

    async fn go_live(&mut self, stream: LiveStreamSnapshot) -> Result<()> {
        info!(
            stream_id = %stream.id,
            title = %stream.title,
            game = %stream.game_name,
            "Streamer went live"
        );
        let message_id = self
            .channel
            .post_new(&stream, self.profile_image_url.as_deref())
            .await?;

        self.state = ReconcilerState::live(stream.with_message_id(Some(message_id)));
        Ok(())
    }

    async fn update(&mut self, stream: LiveStreamSnapshot) -> Result<()> {
        let stream = stream.with_message_id(self.state.message_id().map(str::to_string));
        self.channel
            .update_existing(&stream, self.profile_image_url.as_deref())
            .await?;

        self.state.last_known_stream = Some(stream);
        Ok(())
    }

    async fn go_offline(&mut self) -> Result<()> {
        info!(streamer = %self.streamer, "Streamer went offline");
        if let Some(last) = self.state.last_known_stream.clone() {
            self.finalize(&last).await?;
        }
        self.state = ReconcilerState::offline();
        Ok(())
    }

    async fn finalize(&mut self, last: &LiveStreamSnapshot) -> Result<()> {
        let recording_url = match self.provider.get_recording_url(&last.user_id).await {
            Ok(url) => url,
            Err(e) => {
                warn!(user_id = %last.user_id, error = %e, "Recording lookup failed");
                None
            }
        };

        self.channel
            .finalize(&last.user_name, recording_url.as_deref())
            .await
    }

    /// Best-effort finalize before the process exits.
    ///
    /// Failures are logged and leave the state live, so a later run can
    /// still recover the message.
    pub async fn shutdown(&mut self) {
        if !self.state.is_live {
            return;
        }
        let Some(last) = self.state.last_known_stream.clone() else {
            return;
        };

        info!(stream_id = %last.id, "Finalizing notification before exit");
        match self.finalize(&last).await {
            Ok(()) => self.state = ReconcilerState::offline(),
            Err(e) => error!(error = ?e, "Final notification update failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use stream_platforms::PlatformError;

    use crate::Error;

    fn snapshot(id: &str, viewers: u64) -> LiveStreamSnapshot {
        LiveStreamSnapshot {
            id: id.to_string(),
            user_id: "101".to_string(),
            user_login: "oak".to_string(),
            user_name: "Oak".to_string(),
            title: "Planting trees".to_string(),
            game_name: "Just Chatting".to_string(),
            viewer_count: viewers,
            started_at: "2024-05-01T17:00:00Z".to_string(),
            thumbnail_url: "https://x/1280x720.jpg?1".to_string(),
            notification_message_id: None,
        }
    }

    fn server_error() -> PlatformError {
        PlatformError::Status {
            endpoint: "streams".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        polls: VecDeque<std::result::Result<Option<LiveStreamSnapshot>, PlatformError>>,
        recording_url: Option<String>,
        fail_recording: bool,
        recording_lookups: Vec<String>,
    }

    impl FakeProvider {
        fn with_polls(polls: Vec<Option<LiveStreamSnapshot>>) -> Self {
            Self {
                polls: polls.into_iter().map(Ok).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl StreamStatusProvider for FakeProvider {
        async fn refresh_access_token(&mut self) -> std::result::Result<(), PlatformError> {
            Ok(())
        }

        async fn get_current_live_stream(
            &mut self,
            _channel: &str,
        ) -> std::result::Result<Option<LiveStreamSnapshot>, PlatformError> {
            self.polls.pop_front().unwrap_or(Ok(None))
        }

        async fn get_recording_url(
            &mut self,
            user_id: &str,
        ) -> std::result::Result<Option<String>, PlatformError> {
            self.recording_lookups.push(user_id.to_string());
            if self.fail_recording {
                return Err(server_error());
            }
            Ok(self.recording_url.clone())
        }

        async fn get_profile_image_url(
            &mut self,
            _channel: &str,
        ) -> std::result::Result<Option<String>, PlatformError> {
            Ok(Some("https://img/oak.png".to_string()))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        PostNew { stream_id: String, viewers: u64 },
        Update { message_id: Option<String>, viewers: u64 },
        Finalize { name: String, recording_url: Option<String> },
    }

    #[derive(Default)]
    struct FakeChannel {
        calls: Vec<Call>,
        message_id: Option<String>,
        next_id: u32,
        failures: VecDeque<bool>,
    }

    impl FakeChannel {
        fn should_fail(&mut self) -> bool {
            self.failures.pop_front().unwrap_or(false)
        }

        fn take_calls(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    fn webhook_error() -> Error {
        Error::Webhook {
            operation: "test",
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
        }
    }

    #[async_trait]
    impl NotificationChannel for FakeChannel {
        fn message_id(&self) -> Option<&str> {
            self.message_id.as_deref()
        }

        fn adopt_message(&mut self, message_id: String) {
            self.message_id = Some(message_id);
        }

        async fn post_new(
            &mut self,
            stream: &LiveStreamSnapshot,
            _profile_image_url: Option<&str>,
        ) -> Result<String> {
            self.calls.push(Call::PostNew {
                stream_id: stream.id.clone(),
                viewers: stream.viewer_count,
            });
            if self.should_fail() {
                return Err(webhook_error());
            }
            self.next_id += 1;
            let id = format!("msg-{}", self.next_id);
            self.message_id = Some(id.clone());
            Ok(id)
        }

        async fn update_existing(
            &mut self,
            stream: &LiveStreamSnapshot,
            _profile_image_url: Option<&str>,
        ) -> Result<()> {
            self.calls.push(Call::Update {
                message_id: stream.notification_message_id.clone(),
                viewers: stream.viewer_count,
            });
            if self.should_fail() {
                return Err(webhook_error());
            }
            Ok(())
        }

        async fn finalize(
            &mut self,
            display_name: &str,
            recording_url: Option<&str>,
        ) -> Result<()> {
            if self.message_id.is_none() {
                return Ok(());
            }
            self.calls.push(Call::Finalize {
                name: display_name.to_string(),
                recording_url: recording_url.map(str::to_string),
            });
            if self.should_fail() {
                return Err(webhook_error());
            }
            self.message_id = None;
            Ok(())
        }
    }

    type TestReconciler = StatusReconciler<FakeProvider, FakeChannel>;

    fn reconciler(provider: FakeProvider) -> TestReconciler {
        StatusReconciler::new(provider, FakeChannel::default(), "oak")
    }

    #[tokio::test]
    async fn test_full_stream_lifecycle() {
        let mut provider = FakeProvider::with_polls(vec![
            None,
            Some(snapshot("A", 10)),
            Some(snapshot("A", 25)),
            None,
        ]);
        provider.recording_url = Some("https://www.twitch.tv/videos/7".to_string());
        let mut r = reconciler(provider);

        assert_eq!(r.tick().await, TickOutcome::Idle);
        assert!(r.channel.take_calls().is_empty());
        assert!(!r.state().is_live);

        assert_eq!(r.tick().await, TickOutcome::WentLive);
        assert_eq!(
            r.channel.take_calls(),
            vec![Call::PostNew {
                stream_id: "A".to_string(),
                viewers: 10
            }]
        );
        assert!(r.state().is_live);
        assert_eq!(r.state().message_id(), Some("msg-1"));

        assert_eq!(r.tick().await, TickOutcome::Updated);
        assert_eq!(
            r.channel.take_calls(),
            vec![Call::Update {
                message_id: Some("msg-1".to_string()),
                viewers: 25
            }]
        );
        let last = r.state().last_known_stream.as_ref().unwrap();
        assert_eq!(last.viewer_count, 25);
        assert_eq!(last.notification_message_id.as_deref(), Some("msg-1"));

        assert_eq!(r.tick().await, TickOutcome::WentOffline);
        assert_eq!(
            r.channel.take_calls(),
            vec![Call::Finalize {
                name: "Oak".to_string(),
                recording_url: Some("https://www.twitch.tv/videos/7".to_string())
            }]
        );
        assert_eq!(r.state(), &ReconcilerState::offline());
        assert_eq!(r.provider().recording_lookups, vec!["101".to_string()]);
    }

    #[tokio::test]
    async fn test_finalize_without_recording() {
        let provider = FakeProvider::with_polls(vec![Some(snapshot("A", 1)), None]);
        let mut r = reconciler(provider);

        r.tick().await;
        r.channel.take_calls();

        assert_eq!(r.tick().await, TickOutcome::WentOffline);
        assert_eq!(
            r.channel.take_calls(),
            vec![Call::Finalize {
                name: "Oak".to_string(),
                recording_url: None
            }]
        );
        assert!(!r.state().is_live);
    }

    #[tokio::test]
    async fn test_recording_lookup_error_still_finalizes() {
        let mut provider = FakeProvider::with_polls(vec![Some(snapshot("A", 1)), None]);
        provider.fail_recording = true;
        let mut r = reconciler(provider);

        r.tick().await;
        assert_eq!(r.tick().await, TickOutcome::WentOffline);
        assert!(matches!(
            r.channel.calls.last(),
            Some(Call::Finalize { recording_url: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_steady_offline_makes_no_calls() {
        let mut r = reconciler(FakeProvider::with_polls(vec![None, None, None]));
        for _ in 0..3 {
            assert_eq!(r.tick().await, TickOutcome::Idle);
        }
        assert!(r.channel.calls.is_empty());
        assert!(r.provider().recording_lookups.is_empty());
    }

    #[tokio::test]
    async fn test_steady_live_only_updates() {
        let polls = (0..5).map(|v| Some(snapshot("A", v))).collect();
        let mut r = reconciler(FakeProvider::with_polls(polls));

        r.tick().await;
        r.channel.take_calls();
        for _ in 0..4 {
            assert_eq!(r.tick().await, TickOutcome::Updated);
        }

        let calls = r.channel.take_calls();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|c| matches!(c, Call::Update { .. })));
    }

    #[tokio::test]
    async fn test_provider_error_keeps_state() {
        let mut provider = FakeProvider::with_polls(vec![Some(snapshot("A", 1))]);
        provider.polls.push_back(Err(server_error()));
        provider.polls.push_back(Ok(Some(snapshot("A", 2))));
        let mut r = reconciler(provider);

        r.tick().await;
        let before = r.state().clone();
        r.channel.take_calls();

        assert_eq!(r.tick().await, TickOutcome::Failed);
        assert_eq!(r.state(), &before);
        assert!(r.channel.calls.is_empty());

        assert_eq!(r.tick().await, TickOutcome::Updated);
    }

    #[tokio::test]
    async fn test_failed_post_is_retried_next_tick() {
        let provider = FakeProvider::with_polls(vec![Some(snapshot("A", 1)), Some(snapshot("A", 2))]);
        let mut r = reconciler(provider);
        r.channel.failures.push_back(true);

        assert_eq!(r.tick().await, TickOutcome::Failed);
        assert!(!r.state().is_live);

        assert_eq!(r.tick().await, TickOutcome::WentLive);
        let posts = r
            .channel
            .calls
            .iter()
            .filter(|c| matches!(c, Call::PostNew { .. }))
            .count();
        assert_eq!(posts, 2);
        assert_eq!(r.state().message_id(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_failed_finalize_stays_live() {
        let provider = FakeProvider::with_polls(vec![Some(snapshot("A", 1)), None, None]);
        let mut r = reconciler(provider);
        r.channel.failures.extend([false, true]);

        r.tick().await;
        assert_eq!(r.tick().await, TickOutcome::Failed);
        assert!(r.state().is_live);

        assert_eq!(r.tick().await, TickOutcome::WentOffline);
        assert!(!r.state().is_live);
    }

    #[tokio::test]
    async fn test_new_stream_id_rolls_over() {
        let provider = FakeProvider::with_polls(vec![Some(snapshot("A", 1)), Some(snapshot("B", 3))]);
        let mut r = reconciler(provider);

        r.tick().await;
        r.channel.take_calls();

        assert_eq!(r.tick().await, TickOutcome::Rollover);
        assert_eq!(
            r.channel.take_calls(),
            vec![
                Call::Finalize {
                    name: "Oak".to_string(),
                    recording_url: None
                },
                Call::PostNew {
                    stream_id: "B".to_string(),
                    viewers: 3
                },
            ]
        );
        assert_eq!(r.state().last_known_stream.as_ref().unwrap().id, "B");
        assert_eq!(r.state().message_id(), Some("msg-2"));
    }

    #[tokio::test]
    async fn test_rollover_with_failed_post_goes_offline_then_posts() {
        let provider = FakeProvider::with_polls(vec![
            Some(snapshot("A", 5)),
            Some(snapshot("B", 3)),
            Some(snapshot("B", 4)),
        ]);
        let mut r = reconciler(provider);
        r.channel.failures.extend([false, false, true]);

        r.tick().await;
        r.channel.take_calls();

        assert_eq!(r.tick().await, TickOutcome::Failed);
        assert!(!r.state().is_live);
        assert!(r.state().last_known_stream.is_none());

        assert_eq!(r.tick().await, TickOutcome::WentLive);
        let calls = r.channel.take_calls();
        assert!(matches!(calls[0], Call::Finalize { .. }));
        assert!(matches!(&calls[1], Call::PostNew { stream_id, .. } if stream_id == "B"));
        assert!(matches!(&calls[2], Call::PostNew { stream_id, .. } if stream_id == "B"));
        assert_eq!(calls.len(), 3);
        assert_eq!(r.state().last_known_stream.as_ref().unwrap().id, "B");
    }

    #[tokio::test]
    async fn test_restored_state_updates_same_message() {
        let provider = FakeProvider::with_polls(vec![Some(snapshot("A", 40))]);
        let mut r = reconciler(provider);
        r.restore(ReconcilerState::live(
            snapshot("A", 30).with_message_id(Some("old-msg".to_string())),
        ));

        assert_eq!(r.channel().message_id(), Some("old-msg"));
        assert_eq!(r.tick().await, TickOutcome::Updated);
        assert_eq!(
            r.channel.calls,
            vec![Call::Update {
                message_id: Some("old-msg".to_string()),
                viewers: 40
            }]
        );
    }

    #[tokio::test]
    async fn test_restored_state_finalizes_when_offline() {
        let mut r = reconciler(FakeProvider::with_polls(vec![None]));
        r.restore(ReconcilerState::live(
            snapshot("A", 30).with_message_id(Some("old-msg".to_string())),
        ));

        assert_eq!(r.tick().await, TickOutcome::WentOffline);
        assert_eq!(r.channel.calls.len(), 1);
        assert!(r.channel().message_id().is_none());
    }

    #[tokio::test]
    async fn test_restore_without_message_starts_offline() {
        let mut r = reconciler(FakeProvider::default());

        r.restore(ReconcilerState::live(snapshot("A", 1)));
        assert_eq!(r.state(), &ReconcilerState::offline());

        r.restore(ReconcilerState {
            is_live: true,
            last_known_stream: None,
        });
        assert_eq!(r.state(), &ReconcilerState::offline());
        assert!(r.channel().message_id().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_finalizes_live_stream() {
        let mut provider = FakeProvider::with_polls(vec![Some(snapshot("A", 1))]);
        provider.recording_url = Some("https://www.twitch.tv/videos/9".to_string());
        let mut r = reconciler(provider);

        r.tick().await;
        r.channel.take_calls();
        r.shutdown().await;

        assert_eq!(
            r.channel.calls,
            vec![Call::Finalize {
                name: "Oak".to_string(),
                recording_url: Some("https://www.twitch.tv/videos/9".to_string())
            }]
        );
        assert!(!r.state().is_live);
    }

    #[tokio::test]
    async fn test_shutdown_when_offline_does_nothing() {
        let mut r = reconciler(FakeProvider::default());
        r.shutdown().await;
        assert!(r.channel.calls.is_empty());
        assert!(r.provider().recording_lookups.is_empty());
    }

    #[tokio::test]
    async fn test_failed_shutdown_keeps_state_for_recovery() {
        let mut r = reconciler(FakeProvider::with_polls(vec![Some(snapshot("A", 1))]));
        r.channel.failures.extend([false, true]);

        r.tick().await;
        r.shutdown().await;
        assert!(r.state().is_live);
        assert_eq!(r.state().message_id(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_load_profile_image() {
        let mut r = reconciler(FakeProvider::default());
        r.load_profile_image().await;
        assert_eq!(r.profile_image_url.as_deref(), Some("https://img/oak.png"));
    }

    #[test]
    fn test_state_json_shape() {
        let state = ReconcilerState::live(snapshot("A", 1).with_message_id(Some("m".into())));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["is_live"], true);
        assert_eq!(json["stream"]["id"], "A");
        assert_eq!(json["stream"]["notification_message_id"], "m");

        let offline = serde_json::to_value(ReconcilerState::offline()).unwrap();
        assert_eq!(offline, serde_json::json!({"is_live": false, "stream": null}));
    }
}
