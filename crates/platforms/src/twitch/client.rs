use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::cache_buster::{CacheBuster, DEFAULT_REFRESH_EVERY};
use super::models::{HelixResponse, HelixStream, HelixUser, HelixVideo, TokenResponse};
use crate::error::PlatformError;
use crate::media::LiveStreamSnapshot;
use crate::provider::StreamStatusProvider;

pub const HELIX_API_BASE: &str = "https://api.twitch.tv/helix";
pub const TWITCH_AUTH_BASE: &str = "https://id.twitch.tv";

/// How many times a request is retried after a 401 and a token refresh.
const MAX_AUTH_RETRIES: usize = 1;

#[derive(Debug, Clone)]
pub struct HelixConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub auth_base: String,
    /// Calls between thumbnail cache-buster refreshes.
    pub cache_refresh_every: u64,
}

impl HelixConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: HELIX_API_BASE.to_string(),
            auth_base: TWITCH_AUTH_BASE.to_string(),
            cache_refresh_every: DEFAULT_REFRESH_EVERY,
        }
    }
}

/// Twitch Helix client authenticated with an app access token.
///
/// The token is obtained through the client-credentials grant and is only
/// replaced when a request comes back with 401.
pub struct HelixClient {
    client: Client,
    config: HelixConfig,
    access_token: String,
    cache_buster: CacheBuster,
}

impl HelixClient {
    pub fn new(client: Client, config: HelixConfig) -> Self {
        let cache_buster = CacheBuster::new(config.cache_refresh_every);
        Self {
            client,
            config,
            access_token: String::new(),
            cache_buster,
        }
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn cache_buster(&self) -> &CacheBuster {
        &self.cache_buster
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), endpoint)
    }

    /// GET a Helix endpoint with the 401 refresh-and-retry policy applied.
    ///
    /// `Ok(None)` means no data could be obtained this time: the platform was
    /// unreachable, the token refresh failed, or the retried request was
    /// rejected again.
    async fn authorized_get<T: DeserializeOwned>(
        &mut self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<Option<HelixResponse<T>>, PlatformError> {
        let url = self.endpoint_url(endpoint);

        for attempt in 0..=MAX_AUTH_RETRIES {
            let sent = self
                .client
                .get(&url)
                .query(query)
                .header("Client-Id", &self.config.client_id)
                .bearer_auth(&self.access_token)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => return degrade_transient(endpoint, PlatformError::from_transport(e)),
            };

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                if attempt == MAX_AUTH_RETRIES {
                    error!(endpoint, "Auth failed twice, aborting");
                    break;
                }
                info!(endpoint, "Request returned an auth issue, refreshing access token");
                if let Err(e) = self.refresh_access_token().await {
                    error!(endpoint, error = %e, "Access token refresh failed, aborting");
                    break;
                }
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PlatformError::Status {
                    endpoint: endpoint.to_string(),
                    status,
                    body,
                });
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => return degrade_transient(endpoint, PlatformError::from_transport(e)),
            };
            debug!(endpoint, attempt, "Helix request succeeded");
            return Ok(Some(serde_json::from_str(&body)?));
        }

        Ok(None)
    }
}

/// Turn connection-level failures into "no data", pass everything else on.
fn degrade_transient<T>(endpoint: &str, error: PlatformError) -> Result<Option<T>, PlatformError> {
    if error.is_transient() {
        warn!(endpoint, error = %error, "Request failed with a connection error");
        Ok(None)
    } else {
        Err(error)
    }
}

#[async_trait]
impl StreamStatusProvider for HelixClient {
    async fn refresh_access_token(&mut self) -> Result<(), PlatformError> {
        info!("Updating twitch access token");
        let url = format!("{}/oauth2/token", self.config.auth_base.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Auth(format!("malformed token response: {e}")))?;

        let Some(access_token) = token.access_token.filter(|t| !t.is_empty()) else {
            return Err(PlatformError::Auth(
                "access_token missing from token response".to_string(),
            ));
        };

        self.access_token = access_token;
        info!(expires_in = ?token.expires_in, "Twitch access token updated");
        Ok(())
    }

    async fn get_current_live_stream(
        &mut self,
        channel: &str,
    ) -> Result<Option<LiveStreamSnapshot>, PlatformError> {
        let Some(response) = self
            .authorized_get::<HelixStream>("streams", &[("user_login", channel)])
            .await?
        else {
            return Ok(None);
        };

        let Some(stream) = response.data.into_iter().next() else {
            debug!(channel, "Channel is not live");
            return Ok(None);
        };

        Ok(Some(stream.into_snapshot(&mut self.cache_buster)))
    }

    async fn get_recording_url(&mut self, user_id: &str) -> Result<Option<String>, PlatformError> {
        let Some(response) = self
            .authorized_get::<HelixVideo>("videos", &[("user_id", user_id)])
            .await?
        else {
            return Ok(None);
        };

        let url = response.data.into_iter().next().map(|video| video.url);
        if url.is_none() {
            info!(user_id, "No recordings available yet");
        }
        Ok(url)
    }

    async fn get_profile_image_url(
        &mut self,
        channel: &str,
    ) -> Result<Option<String>, PlatformError> {
        let Some(response) = self
            .authorized_get::<HelixUser>("users", &[("login", channel)])
            .await?
        else {
            return Ok(None);
        };

        Ok(response
            .data
            .into_iter()
            .next()
            .map(|user| user.profile_image_url)
            .filter(|url| !url.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_points_at_twitch() {
        let config = HelixConfig::new("id", "secret");
        assert_eq!(config.api_base, HELIX_API_BASE);
        assert_eq!(config.auth_base, TWITCH_AUTH_BASE);
        assert_eq!(config.cache_refresh_every, DEFAULT_REFRESH_EVERY);
    }

    #[test]
    fn test_endpoint_url_tolerates_trailing_slash() {
        let mut config = HelixConfig::new("id", "secret");
        config.api_base = "http://localhost:1234/helix/".to_string();
        let client = HelixClient::new(crate::http::default_client(Duration::ZERO).unwrap(), config);
        assert_eq!(client.endpoint_url("streams"), "http://localhost:1234/helix/streams");
        assert!(!client.has_access_token());
    }
}
