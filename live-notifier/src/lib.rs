//! live-notifier library crate.
//!
//! Watches one streamer and mirrors their live status into a Discord
//! webhook message that is posted, kept up to date, and finalized with the
//! recording link once the stream ends.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod panic_hook;
pub mod state;

pub use error::{Error, Result};
