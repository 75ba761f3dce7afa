use serde::Deserialize;

use super::cache_buster::CacheBuster;
use crate::media::LiveStreamSnapshot;

pub const THUMBNAIL_WIDTH: u32 = 1280;
pub const THUMBNAIL_HEIGHT: u32 = 720;

/// Envelope shared by all Helix list endpoints.
#[derive(Debug, Deserialize)]
pub struct HelixResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixStream {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub viewer_count: u64,
    #[serde(default)]
    pub started_at: String,
    /// Contains literal `{width}` and `{height}` placeholders.
    #[serde(default)]
    pub thumbnail_url: String,
}

impl HelixStream {
    pub fn into_snapshot(self, cache_buster: &mut CacheBuster) -> LiveStreamSnapshot {
        let thumbnail_url = cache_buster.bust(&sized_thumbnail_url(&self.thumbnail_url));
        LiveStreamSnapshot {
            id: self.id,
            user_id: self.user_id,
            user_login: self.user_login,
            user_name: self.user_name,
            title: self.title,
            game_name: self.game_name,
            viewer_count: self.viewer_count,
            started_at: self.started_at,
            thumbnail_url,
            notification_message_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixVideo {
    #[serde(default)]
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Substitute the fixed thumbnail dimensions into a Helix URL template.
pub fn sized_thumbnail_url(template: &str) -> String {
    template
        .replace("{width}", &THUMBNAIL_WIDTH.to_string())
        .replace("{height}", &THUMBNAIL_HEIGHT.to_string())
}
