// src/types/mod.rs - Message and record types shared across the bot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel roles that grant access to privileged commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Moderator,
    Broadcaster,
}

/// Core message type that flows from the chat platform into the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform-assigned message id; `None` when the platform omitted it
    pub id: Option<String>,
    pub platform: String,
    pub channel: String,
    pub username: String,
    pub display_name: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub roles: Vec<ChatRole>,
}

impl ChatMessage {
    pub fn has_role(&self, role: ChatRole) -> bool {
        self.roles.contains(&role)
    }

    /// Moderators and the broadcaster pass every role check
    pub fn is_privileged(&self) -> bool {
        self.has_role(ChatRole::Moderator) || self.has_role(ChatRole::Broadcaster)
    }
}

/// Message seen on the Discord notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub channel_id: u64,
    pub author_id: u64,
    pub content: String,
}

/// The most recent upload the bot has announced, persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }
}

/// Competitive rank returned by the stats API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankInfo {
    pub tier: String,
    pub ranking_in_tier: i64,
}
