//! # streamrelay
//!
//! A single-channel Twitch chat bot for a Valorant streamer.
//!
//! ## Features
//!
//! - **Chat Commands**: `!clip`, `!rank`/`!rango`, `!setpuuid` and `!pot` with role checks and per-command cooldowns
//! - **Duplicate Suppression**: the same chat message id is only handled once
//! - **Upload Announcements**: new YouTube videos are announced through a `!editcom !youtube` update,
//!   triggered by a polling timer or by a Discord notification relay
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamrelay::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BotConfig::from_env()?;
//!     let bot = ChatBot::from_config(config);
//!
//!     bot.run(CancellationToken::new()).await
//! }
//! ```

pub mod bot;
pub mod config;
pub mod platforms;
pub mod services;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::ChatBot;
    pub use crate::bot::commands::{CommandOutcome, CommandSystem};
    pub use crate::config::BotConfig;
    pub use crate::platforms::{
        discord::{DiscordConfig, DiscordRelay},
        twitch::{TwitchConfig, TwitchConnection},
        PlatformConnection,
    };
    pub use crate::types::{ChatMessage, ChatRole, RankInfo, RelayMessage, VideoRecord};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
