//! Discord webhook notification channel.
//!
//! Posts one message per stream through the webhook and keeps editing that
//! same message:
//! - `POST {webhook}?wait=true` creates it and returns its id
//! - `PATCH {webhook}/messages/{id}` refreshes the embed while live
//! - the same `PATCH` replaces it with the recording link once offline
//!
//! Failed requests are returned to the caller without retrying.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use stream_platforms::LiveStreamSnapshot;
use tracing::{debug, info, warn};
use url::Url;

use super::NotificationChannel;
use crate::{Error, Result};

/// Closing text used when the platform has no recording for the stream yet.
pub const RECORDING_PLACEHOLDER: &str = "None available. Please contact the developer.";

/// Discord channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Discord webhook URL.
    pub webhook_url: String,
    /// Optional username for the webhook.
    pub username: Option<String>,
    /// Optional avatar URL for the webhook.
    pub avatar_url: Option<String>,
    /// Prepended to the "went live" text, e.g. `@everyone`.
    pub mention: Option<String>,
    pub embed_color: u32,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            username: Some("Oak Tree".to_string()),
            avatar_url: Some("https://i.imgur.com/DBOuwjx.png".to_string()),
            mention: Some("@everyone".to_string()),
            embed_color: 0x8000ff, // Purple
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    id: String,
}

/// Discord notification channel.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
    message_id: Option<String>,
}

impl DiscordChannel {
    /// Create a new Discord channel.
    pub fn new(config: DiscordConfig, client: Client) -> Self {
        Self {
            config,
            client,
            message_id: None,
        }
    }

    /// `{webhook}/messages/{id}`, keeping any query such as `thread_id`.
    fn message_url(&self, message_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.webhook_url)
            .map_err(|e| Error::config(format!("Invalid Discord webhook URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::config("Discord webhook URL cannot have a path"))?
            .pop_if_empty()
            .extend(["messages", message_id]);
        Ok(url)
    }

    fn build_embed(
        &self,
        stream: &LiveStreamSnapshot,
        profile_image_url: Option<&str>,
    ) -> serde_json::Value {
        let channel_url = stream.channel_url();

        let mut author = json!({
            "name": stream.user_name,
            "url": channel_url,
        });
        if let Some(icon_url) = profile_image_url {
            author["icon_url"] = json!(icon_url);
        }

        json!({
            "title": stream.title,
            "color": self.config.embed_color,
            "timestamp": stream.started_at,
            "url": channel_url,
            "author": author,
            "image": { "url": stream.thumbnail_url },
            "fields": [
                { "name": "Game", "value": stream.game_name, "inline": true },
                { "name": "Viewers", "value": stream.viewer_count.to_string(), "inline": true },
            ],
        })
    }

    /// Payload for the initial "went live" message.
    fn build_live_payload(
        &self,
        stream: &LiveStreamSnapshot,
        profile_image_url: Option<&str>,
    ) -> serde_json::Value {
        let content = match &self.config.mention {
            Some(mention) => format!("{mention} {} went live!", stream.user_name),
            None => format!("{} went live!", stream.user_name),
        };

        let mut payload = json!({
            "content": content,
            "embeds": [self.build_embed(stream, profile_image_url)],
        });
        self.apply_identity(&mut payload);
        payload
    }

    fn build_update_payload(
        &self,
        stream: &LiveStreamSnapshot,
        profile_image_url: Option<&str>,
    ) -> serde_json::Value {
        json!({
            "embeds": [self.build_embed(stream, profile_image_url)],
        })
    }

    fn build_final_payload(
        &self,
        display_name: &str,
        recording_url: Option<&str>,
    ) -> serde_json::Value {
        let recording_url = recording_url
            .filter(|url| !url.is_empty())
            .unwrap_or(RECORDING_PLACEHOLDER);

        let mut payload = json!({
            "content": format!("{display_name} stopped the stream. Check out the VOD!\n{recording_url}"),
            "embeds": [],
        });
        self.apply_identity(&mut payload);
        payload
    }

    fn apply_identity(&self, payload: &mut serde_json::Value) {
        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }
        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }
    }

    async fn edit_message(
        &self,
        operation: &'static str,
        message_id: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let response = self
            .client
            .patch(self.message_url(message_id)?)
            .json(payload)
            .send()
            .await?;
        ensure_success(operation, response).await?;
        Ok(())
    }
}

async fn ensure_success(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(operation, %status, %body, "Discord webhook failed");
    Err(Error::Webhook {
        operation,
        status,
        body,
    })
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    fn adopt_message(&mut self, message_id: String) {
        debug!(message_id = %message_id, "Adopting existing Discord message");
        self.message_id = Some(message_id);
    }

    async fn post_new(
        &mut self,
        stream: &LiveStreamSnapshot,
        profile_image_url: Option<&str>,
    ) -> Result<String> {
        info!(stream_id = %stream.id, "Sending stream notification to Discord");
        let payload = self.build_live_payload(stream, profile_image_url);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .query(&[("wait", "true")])
            .json(&payload)
            .send()
            .await?;
        let message: WebhookMessage = ensure_success("post", response).await?.json().await?;

        info!(message_id = %message.id, "Stream notification sent to Discord");
        self.message_id = Some(message.id.clone());
        Ok(message.id)
    }

    async fn update_existing(
        &mut self,
        stream: &LiveStreamSnapshot,
        profile_image_url: Option<&str>,
    ) -> Result<()> {
        let message_id = self
            .message_id
            .as_deref()
            .ok_or(Error::MissingMessageId { operation: "update" })?;

        debug!(message_id, viewers = stream.viewer_count, "Updating Discord message");
        let payload = self.build_update_payload(stream, profile_image_url);
        self.edit_message("update", message_id, &payload).await?;
        debug!(message_id, "Discord message embed updated");
        Ok(())
    }

    async fn finalize(&mut self, display_name: &str, recording_url: Option<&str>) -> Result<()> {
        let Some(message_id) = self.message_id.clone() else {
            info!("Message id not set, nothing to finalize");
            return Ok(());
        };

        info!(message_id = %message_id, has_recording = recording_url.is_some(), "Finalizing Discord message");
        let payload = self.build_final_payload(display_name, recording_url);
        self.edit_message("finalize", &message_id, &payload).await?;

        self.message_id = None;
        info!(message_id = %message_id, "Discord message finalized");
        Ok(())
    }
}
