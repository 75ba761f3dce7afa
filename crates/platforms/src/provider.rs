//! Platform-agnostic live status lookups.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::media::LiveStreamSnapshot;

/// Read access to a streaming platform for a single streamer.
///
/// "Not live", "no recording yet" and "unknown user" are expected outcomes
/// and come back as `Ok(None)`. Connection-level failures and exhausted auth
/// retries are also reported as `Ok(None)` so that a poll degrades to "no
/// data" instead of failing. Only unexpected responses are errors.
#[async_trait]
pub trait StreamStatusProvider: Send {
    /// Exchange the configured credentials for a fresh access token.
    async fn refresh_access_token(&mut self) -> Result<(), PlatformError>;

    /// The stream currently live on `channel`, if any.
    async fn get_current_live_stream(
        &mut self,
        channel: &str,
    ) -> Result<Option<LiveStreamSnapshot>, PlatformError>;

    /// URL of the most recent recording for `user_id`.
    async fn get_recording_url(&mut self, user_id: &str) -> Result<Option<String>, PlatformError>;

    /// Profile picture URL for `channel`.
    async fn get_profile_image_url(
        &mut self,
        channel: &str,
    ) -> Result<Option<String>, PlatformError>;
}
