//! Query-string cache busting for CDN-served images.

use tracing::info;

/// Default number of calls between nonce refreshes.
///
/// With a 30 second poll this refreshes thumbnails roughly every five minutes.
pub const DEFAULT_REFRESH_EVERY: u64 = 10;

const NONCE_UPPER_BOUND: u32 = 1_000_000;

/// Appends a nonce to URLs, changing it every `refresh_every` calls.
///
/// Calls `refresh_every`, `2 * refresh_every`, ... emit a nonce different from
/// the previous one; every other call reuses the current nonce so the CDN can
/// still serve the cached image between refreshes.
#[derive(Debug, Clone)]
pub struct CacheBuster {
    calls: u64,
    nonce: u32,
    refresh_every: u64,
}

impl CacheBuster {
    /// `refresh_every` is clamped to at least 1.
    pub fn new(refresh_every: u64) -> Self {
        Self {
            calls: 0,
            nonce: rand::random_range(0..NONCE_UPPER_BOUND),
            refresh_every: refresh_every.max(1),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn bust(&mut self, url: &str) -> String {
        self.calls += 1;
        if self.calls % self.refresh_every == 0 {
            self.nonce = self.next_nonce();
            info!(calls = self.calls, "Forcing image cache refresh");
        }
        format!("{url}?{}", self.nonce)
    }

    fn next_nonce(&self) -> u32 {
        loop {
            let candidate = rand::random_range(0..NONCE_UPPER_BOUND);
            if candidate != self.nonce {
                return candidate;
            }
        }
    }
}

impl Default for CacheBuster {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_EVERY)
    }
}
