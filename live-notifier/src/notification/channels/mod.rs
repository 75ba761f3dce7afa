//! Notification channels.
//!
//! A channel owns at most one notification message at a time: it is created
//! when the stream starts, edited while it runs and finalized when it ends.

mod discord;

pub use discord::{DiscordChannel, DiscordConfig, RECORDING_PLACEHOLDER};

use async_trait::async_trait;
use stream_platforms::LiveStreamSnapshot;

use crate::Result;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send {
    /// Identifier of the message currently owned by this channel.
    fn message_id(&self) -> Option<&str>;

    /// Take ownership of a message posted earlier, e.g. before a restart.
    fn adopt_message(&mut self, message_id: String);

    /// Post a new notification for `stream` and remember its id.
    async fn post_new(
        &mut self,
        stream: &LiveStreamSnapshot,
        profile_image_url: Option<&str>,
    ) -> Result<String>;

    /// Refresh the owned message with the latest stream details.
    async fn update_existing(
        &mut self,
        stream: &LiveStreamSnapshot,
        profile_image_url: Option<&str>,
    ) -> Result<()>;

    /// Replace the owned message with a closing notice.
    ///
    /// Does nothing when no message is owned.
    async fn finalize(&mut self, display_name: &str, recording_url: Option<&str>) -> Result<()>;
}
