use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as _};
use twilight_model::channel::Message;

use crate::config::{optional, required};
use crate::types::RelayMessage;

/// Configuration for the Discord notification channel listener
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: u64,
    /// Only messages from this author (the upload notifier bot) are relayed
    pub relay_author_id: u64,
}

impl DiscordConfig {
    /// Returns `Ok(None)` when `DISCORD_TOKEN` is unset; the rest of the group is then ignored
    pub fn from_source<F>(get: &F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(token) = optional(get, "DISCORD_TOKEN") else {
            return Ok(None);
        };

        let channel_id = parse_snowflake(&required(get, "DISCORD_CHANNEL_ID")?, "DISCORD_CHANNEL_ID")?;
        let relay_author_id = parse_snowflake(
            &required(get, "DISCORD_RELAY_AUTHOR_ID")?,
            "DISCORD_RELAY_AUTHOR_ID",
        )?;

        Ok(Some(Self {
            token,
            channel_id,
            relay_author_id,
        }))
    }

    /// Whether a message comes from the watched channel and the trusted author
    pub fn is_trusted(&self, message: &RelayMessage) -> bool {
        message.channel_id == self.channel_id && message.author_id == self.relay_author_id
    }
}

impl From<&Message> for RelayMessage {
    fn from(message: &Message) -> Self {
        Self {
            channel_id: message.channel_id.get(),
            author_id: message.author.id.get(),
            content: message.content.clone(),
        }
    }
}

fn parse_snowflake(raw: &str, key: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .with_context(|| format!("{} must be a Discord snowflake id, got: {}", key, raw))
}

/// Gateway listener that forwards trusted messages from the notification channel
pub struct DiscordRelay {
    config: DiscordConfig,
}

impl DiscordRelay {
    pub fn new(config: DiscordConfig) -> Self {
        Self { config }
    }

    /// Open the gateway shard and stream relay messages until cancelled
    pub fn start(self, cancel: CancellationToken) -> mpsc::Receiver<RelayMessage> {
        let (tx, rx) = mpsc::channel(32);
        let intents = Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT;
        let mut shard = Shard::new(ShardId::ONE, self.config.token.clone(), intents);
        let config = self.config;

        tokio::spawn(async move {
            info!("Discord relay listening on channel {}", config.channel_id);

            loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break,
                    item = shard.next_event(EventTypeFlags::READY | EventTypeFlags::MESSAGE_CREATE) => item,
                };

                let event = match item {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        warn!("Discord gateway error: {}", e);
                        continue;
                    }
                    None => break,
                };

                match event {
                    Event::Ready(ready) => {
                        info!("Discord relay connected as {}", ready.user.name);
                    }
                    Event::MessageCreate(msg) => {
                        let relay = RelayMessage::from(&msg.0);

                        if !config.is_trusted(&relay) {
                            continue;
                        }

                        debug!("Relay message from {}: {}", msg.author.name, relay.content);
                        if tx.send(relay).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }

            warn!("Discord relay listener stopped");
        });

        rx
    }
}
