//! Chat notifications mirroring the stream state.

pub mod channels;

pub use channels::{DiscordChannel, DiscordConfig, NotificationChannel};
