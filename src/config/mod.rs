// src/config/mod.rs - Startup configuration read from the process environment

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::env;
use std::path::PathBuf;

use crate::bot::subject::is_valid_puuid;
use crate::platforms::discord::DiscordConfig;
use crate::platforms::twitch::TwitchConfig;

pub const DEFAULT_LAST_VIDEO_PATH: &str = "./storage/lastVideo.json";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15 * 60;
pub const DEFAULT_VALORANT_REGION: &str = "eu";

/// Credentials for the Twitch Helix API (user lookup and clip creation)
#[derive(Debug, Clone)]
pub struct HelixConfig {
    pub client_id: String,
    pub api_token: String,
}

/// Settings for the HenrikDev Valorant stats API
#[derive(Debug, Clone)]
pub struct RankConfig {
    pub api_key: String,
    pub region: String,
    pub initial_puuid: String,
}

/// Settings for the YouTube Data API upload feed
#[derive(Debug, Clone)]
pub struct YouTubeFeedConfig {
    pub api_key: String,
    pub channel_id: String,
    pub poll_interval_secs: u64,
}

/// Everything the bot needs, loaded once at startup
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub twitch: TwitchConfig,
    pub helix: HelixConfig,
    pub rank: RankConfig,
    pub youtube: YouTubeFeedConfig,
    pub discord: Option<DiscordConfig>,
    pub last_video_path: PathBuf,
    pub clip_allowed_users: Vec<String>,
}

impl BotConfig {
    /// Load the full configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let twitch = TwitchConfig::from_source(&get)?;

        let helix = HelixConfig {
            client_id: required(&get, "TWITCH_CLIENT_ID")?,
            api_token: required(&get, "TWITCH_API_TOKEN")?,
        };

        let initial_puuid = required(&get, "VALORANT_PUUID")?;
        if !is_valid_puuid(&initial_puuid) {
            return Err(anyhow::anyhow!(
                "VALORANT_PUUID is not a valid PUUID: {}",
                initial_puuid
            ));
        }

        let rank = RankConfig {
            api_key: required(&get, "HENRIK_API_KEY")?,
            region: optional(&get, "VALORANT_REGION")
                .unwrap_or_else(|| DEFAULT_VALORANT_REGION.to_string()),
            initial_puuid,
        };

        let poll_interval_secs = match optional(&get, "YOUTUBE_POLL_INTERVAL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .with_context(|| format!("YOUTUBE_POLL_INTERVAL_SECS must be a positive integer, got: {}", raw))?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        let youtube = YouTubeFeedConfig {
            api_key: required(&get, "YOUTUBE_API_KEY")?,
            channel_id: required(&get, "YOUTUBE_CHANNEL_ID")?,
            poll_interval_secs,
        };

        let discord = DiscordConfig::from_source(&get)?;
        if discord.is_none() {
            warn!("DISCORD_TOKEN not set, Discord relay disabled");
        }

        let last_video_path = optional(&get, "LAST_VIDEO_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LAST_VIDEO_PATH));

        let clip_allowed_users = optional(&get, "CLIP_ALLOWED_USERS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();

        info!(
            "Loaded bot config for #{} (poll every {}s, relay {})",
            twitch.channel,
            youtube.poll_interval_secs,
            if discord.is_some() { "enabled" } else { "disabled" }
        );
        debug!("Clip allow-list: {:?}", clip_allowed_users);

        Ok(Self {
            twitch,
            helix,
            rank,
            youtube,
            discord,
            last_video_path,
            clip_allowed_users,
        })
    }
}

/// Read a required key, treating blank values as missing
pub(crate) fn required<F>(get: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(get, key).with_context(|| format!("{} environment variable not set", key))
}

pub(crate) fn optional<F>(get: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse a comma-separated list, dropping blanks
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
