//! Twitch Helix API access.

pub mod cache_buster;
pub mod client;
pub mod models;

pub use cache_buster::CacheBuster;
pub use client::{HelixClient, HelixConfig};
