//! Live status lookups against streaming platform APIs.
//!
//! The crate exposes a single [`StreamStatusProvider`] abstraction and its
//! Twitch Helix implementation, [`twitch::HelixClient`].

pub mod error;
pub mod http;
pub mod media;
pub mod provider;
pub mod twitch;

pub use error::PlatformError;
pub use media::LiveStreamSnapshot;
pub use provider::StreamStatusProvider;
