//! Process configuration loaded from the environment.
//!
//! All values are read and validated once at startup. A missing required
//! variable or an unparsable value is a fatal [`Error::Configuration`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use stream_platforms::twitch::HelixConfig;
use stream_platforms::twitch::cache_buster::DEFAULT_REFRESH_EVERY;
use stream_platforms::twitch::client::{HELIX_API_BASE, TWITCH_AUTH_BASE};
use url::Url;

use crate::notification::DiscordConfig;
use crate::{Error, Result};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATE_FILE: &str = "streams.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Login name of the streamer to watch.
    pub streamer: String,
    pub helix: HelixConfig,
    pub discord: DiscordConfig,
    pub poll_interval: Duration,
    /// Zero disables the request timeout.
    pub http_timeout: Duration,
    pub state_file: PathBuf,
    /// Rolling log files are written here when set.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required =
            |key: &str| get(key).ok_or_else(|| Error::config(format!("{key} must be set")));

        let streamer = required("STREAMER_NAME")?;

        let webhook_url = required("DISCORD_WEBHOOK_URL")?;
        Url::parse(&webhook_url)
            .map_err(|e| Error::config(format!("DISCORD_WEBHOOK_URL is not a valid URL: {e}")))?;

        let cache_refresh_every = parse_or(
            "CACHE_REFRESH_EVERY",
            get("CACHE_REFRESH_EVERY"),
            DEFAULT_REFRESH_EVERY,
        )?;
        if cache_refresh_every == 0 {
            return Err(Error::config("CACHE_REFRESH_EVERY must be at least 1"));
        }

        let helix = HelixConfig {
            client_id: required("TWITCH_CLIENT_ID")?,
            client_secret: required("TWITCH_CLIENT_SECRET")?,
            api_base: get("TWITCH_API_BASE").unwrap_or_else(|| HELIX_API_BASE.to_string()),
            auth_base: get("TWITCH_AUTH_BASE").unwrap_or_else(|| TWITCH_AUTH_BASE.to_string()),
            cache_refresh_every,
        };

        let defaults = DiscordConfig::default();
        let discord = DiscordConfig {
            webhook_url,
            username: get("WEBHOOK_USERNAME").or(defaults.username),
            avatar_url: get("WEBHOOK_AVATAR_URL").or(defaults.avatar_url),
            mention: get("WEBHOOK_MENTION").or(defaults.mention),
            ..defaults
        };

        let poll_interval_secs = parse_or(
            "POLL_INTERVAL_SECS",
            get("POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        if poll_interval_secs == 0 {
            return Err(Error::config("POLL_INTERVAL_SECS must be at least 1"));
        }

        let http_timeout_secs = parse_or(
            "HTTP_TIMEOUT_SECS",
            get("HTTP_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;

        Ok(Self {
            streamer,
            helix,
            discord,
            poll_interval: Duration::from_secs(poll_interval_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::config(format!("{key}={raw:?} is invalid: {e}"))),
    }
}
