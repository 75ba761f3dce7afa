use serde::{Deserialize, Serialize};

/// One poll's view of a live stream.
///
/// Produced fresh on every successful poll. `notification_message_id` is the
/// only field the consumer fills in: it links the snapshot to the chat message
/// announcing this stream so later polls can edit that message in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStreamSnapshot {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub title: String,
    pub game_name: String,
    pub viewer_count: u64,
    /// RFC 3339 start time as reported by the platform.
    pub started_at: String,
    /// Sized and cache-busted thumbnail URL.
    pub thumbnail_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_message_id: Option<String>,
}

impl LiveStreamSnapshot {
    /// Whether both snapshots describe the same broadcast.
    pub fn is_same_stream(&self, other: &LiveStreamSnapshot) -> bool {
        self.id == other.id
    }

    /// Carry the message id of an earlier snapshot of the same stream forward.
    pub fn with_message_id(mut self, message_id: Option<String>) -> Self {
        self.notification_message_id = message_id;
        self
    }

    pub fn channel_url(&self) -> String {
        format!("https://www.twitch.tv/{}", self.user_login)
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str) -> LiveStreamSnapshot {
    LiveStreamSnapshot {
        id: id.to_string(),
        user_id: "141981764".to_string(),
        user_login: "twitchdev".to_string(),
        user_name: "TwitchDev".to_string(),
        title: "Building things".to_string(),
        game_name: "Software and Game Development".to_string(),
        viewer_count: 42,
        started_at: "2024-05-01T17:00:00Z".to_string(),
        thumbnail_url: "https://x/1280x720.jpg?7".to_string(),
        notification_message_id: None,
    }
}
