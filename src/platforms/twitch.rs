use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::env;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::config::required;
use crate::platforms::PlatformConnection;
use crate::types::{ChatMessage, ChatRole};

// Type aliases for cleaner code
type WebSocketWriter = Arc<RwLock<futures_util::stream::SplitSink<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>, Message>>>;

const TWITCH_IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Configuration for Twitch chat connection
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub username: String,
    pub oauth_token: String, // oauth:your_token_here
    pub channel: String,
}

impl TwitchConfig {
    /// Load Twitch configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_source(&|key: &str| env::var(key).ok())
    }

    pub fn from_source<F>(get: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = required(get, "TWITCH_BOT_USERNAME")?;
        let oauth_token = required(get, "TWITCH_OAUTH_TOKEN")?;
        let channel = required(get, "TWITCH_CHANNEL")?
            .trim_start_matches('#')
            .to_lowercase();

        // Validate OAuth token format
        if !oauth_token.starts_with("oauth:") {
            return Err(anyhow::anyhow!(
                "TWITCH_OAUTH_TOKEN must start with 'oauth:' - got: {}...",
                &oauth_token[..std::cmp::min(10, oauth_token.len())]
            ));
        }

        info!("Loaded Twitch config for user '{}' in #{}", username, channel);

        Ok(Self {
            username,
            oauth_token,
            channel,
        })
    }
}

/// Twitch IRC connection implementation
pub struct TwitchConnection {
    config: TwitchConfig,
    message_sender: Option<broadcast::Sender<ChatMessage>>,
    websocket_writer: Option<WebSocketWriter>,
    is_connected: Arc<RwLock<bool>>,
}

impl TwitchConnection {
    pub fn new(config: TwitchConfig) -> Self {
        Self {
            config,
            message_sender: None,
            websocket_writer: None,
            is_connected: Arc::new(RwLock::new(false)),
        }
    }

    /// Parse every PRIVMSG in a websocket frame, skipping the bot's own lines
    pub(crate) fn parse_frame(raw_message: &str, bot_username: &str) -> Vec<ChatMessage> {
        raw_message
            .split('\n')
            .map(str::trim)
            .filter(|line| line.starts_with('@') && line.contains(" PRIVMSG "))
            .filter_map(Self::parse_privmsg)
            .filter(|msg| !msg.username.eq_ignore_ascii_case(bot_username))
            .collect()
    }

    fn parse_privmsg(line: &str) -> Option<ChatMessage> {
        // Format: @badges=...;id=...;mod=... :user!user@user.tmi.twitch.tv PRIVMSG #channel :message
        let (tags, rest) = line.strip_prefix('@')?.split_once(' ')?;
        let (prefix, command) = rest.strip_prefix(':')?.split_once(' ')?;
        let (channel, content) = command.strip_prefix("PRIVMSG ")?.split_once(" :")?;

        let mut id = None;
        let mut display_name = None;
        let mut roles = Vec::new();

        for tag in tags.split(';') {
            let Some((key, value)) = tag.split_once('=') else {
                continue;
            };
            match key {
                "id" if !value.is_empty() => id = Some(value.to_string()),
                "display-name" if !value.is_empty() => display_name = Some(value.to_string()),
                "mod" if value == "1" => push_role(&mut roles, ChatRole::Moderator),
                "badges" => {
                    for badge in value.split(',').filter_map(|b| b.split('/').next()) {
                        match badge {
                            "broadcaster" => push_role(&mut roles, ChatRole::Broadcaster),
                            "moderator" => push_role(&mut roles, ChatRole::Moderator),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        let username = prefix.split('!').next().unwrap_or_default().to_lowercase();
        if username.is_empty() {
            debug!("PRIVMSG without sender: {}", line);
            return None;
        }

        Some(ChatMessage {
            id,
            platform: "twitch".to_string(),
            channel: channel.trim_start_matches('#').to_string(),
            username,
            display_name,
            content: content.trim_end_matches('\r').to_string(),
            // Local receive time; dedup sweeps compare against the same clock
            timestamp: chrono::Utc::now(),
            roles,
        })
    }
}

fn push_role(roles: &mut Vec<ChatRole>, role: ChatRole) {
    if !roles.contains(&role) {
        roles.push(role);
    }
}

#[async_trait]
impl PlatformConnection for TwitchConnection {
    async fn connect(&mut self) -> Result<()> {
        info!("Connecting to Twitch IRC...");

        let url = Url::parse(TWITCH_IRC_URL)
            .context("Failed to parse Twitch WebSocket URL")?;

        let (ws_stream, _) = connect_async(url)
            .await
            .context("Failed to connect to Twitch WebSocket")?;

        let (write, read) = ws_stream.split();

        let writer = Arc::new(RwLock::new(write));
        let writer_for_pong = Arc::clone(&writer);

        // Tags carry the message id and the badges used for permission checks
        let handshake = [
            format!("PASS {}", self.config.oauth_token),
            format!("NICK {}", self.config.username),
            "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
            format!("JOIN #{}", self.config.channel),
        ];
        {
            let mut writer = writer.write().await;
            for line in handshake {
                let verb = line.split(' ').next().unwrap_or_default().to_string();
                writer.send(Message::Text(format!("{}\r\n", line))).await
                    .with_context(|| format!("Failed to send {} command", verb))?;
            }
        }
        self.websocket_writer = Some(writer);
        info!("Joined channel: #{}", self.config.channel);

        let (tx, _) = broadcast::channel(1000);
        self.message_sender = Some(tx.clone());

        *self.is_connected.write().await = true;

        let message_sender = tx;
        let is_connected = Arc::clone(&self.is_connected);
        let bot_username = self.config.username.clone();

        tokio::spawn(async move {
            let mut read = read;
            info!("Twitch message reader started");

            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received: {}", text);

                        // Handle PING/PONG to keep connection alive
                        if text.starts_with("PING") {
                            debug!("Responding to PING");
                            let pong_msg = text.replace("PING", "PONG");
                            if let Err(e) = writer_for_pong.write().await.send(Message::Text(pong_msg)).await {
                                error!("Failed to send PONG: {}", e);
                            }
                            continue;
                        }

                        for chat_msg in TwitchConnection::parse_frame(&text, &bot_username) {
                            debug!("Parsed message from {}: {}", chat_msg.username, chat_msg.content);
                            if let Err(e) = message_sender.send(chat_msg) {
                                warn!("Failed to broadcast message: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        debug!("Received ping, sending pong");
                        if let Err(e) = writer_for_pong.write().await.send(Message::Pong(payload)).await {
                            error!("Failed to send pong: {}", e);
                        }
                    }
                    Some(Ok(Message::Close(close_frame))) => {
                        info!("WebSocket connection closed: {:?}", close_frame);
                        break;
                    }
                    Some(Ok(_)) => {
                        debug!("Ignoring non-text websocket frame");
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        warn!("WebSocket stream ended");
                        break;
                    }
                }
            }

            *is_connected.write().await = false;
            warn!("Twitch connection handler exited");
        });

        info!("Successfully connected to Twitch IRC");
        Ok(())
    }

    async fn send_message(&self, channel: &str, message: &str) -> Result<()> {
        if let Some(writer_arc) = &self.websocket_writer {
            let privmsg = format!("PRIVMSG #{} :{}\r\n", channel, message);

            match writer_arc.write().await.send(Message::Text(privmsg)).await {
                Ok(_) => {
                    debug!("Sent message to #{}: {}", channel, message);
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to send message to #{}: {}", channel, e);
                    Err(e.into())
                }
            }
        } else {
            Err(anyhow::anyhow!("Not connected to Twitch"))
        }
    }

    fn platform_name(&self) -> &str {
        "twitch"
    }

    async fn is_connected(&self) -> bool {
        *self.is_connected.read().await
    }

    fn get_message_receiver(&self) -> Option<broadcast::Receiver<ChatMessage>> {
        self.message_sender.as_ref().map(|sender| sender.subscribe())
    }

    async fn disconnect(&mut self) -> Result<()> {
        *self.is_connected.write().await = false;
        self.websocket_writer = None;
        self.message_sender = None;
        info!("Disconnected from Twitch");
        Ok(())
    }
}
