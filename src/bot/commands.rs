use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use crate::bot::cooldowns::CooldownFamily;
use crate::bot::handlers::{ClipCommand, PotCommand, RankCommand, SetPuuidCommand};
use crate::bot::permissions::Access;
use crate::bot::session::Session;
use crate::types::ChatMessage;

pub const CLIP_DENIED: &str = "No tienes permisos para crear clips.";
pub const COMMAND_DENIED: &str = "No tienes permisos para usar este comando.";

/// How a command is recognised in normalized (trimmed, lowercased) chat text
#[derive(Debug, Clone)]
pub enum Matcher {
    /// The whole message equals one of these words
    Exact(Vec<&'static str>),
    /// The message is this word, optionally followed by whitespace and arguments
    Prefix(&'static str),
}

impl Matcher {
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            Matcher::Exact(words) => words.iter().any(|word| *word == normalized),
            Matcher::Prefix(word) => normalized
                .strip_prefix(word)
                .map_or(false, |rest| rest.is_empty() || rest.starts_with(char::is_whitespace)),
        }
    }
}

/// Result of running a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command's effect ran (successfully or not); its cooldown starts
    Completed(Vec<String>),
    /// Input was rejected before any effect; no state changes
    Rejected(Vec<String>),
}

pub struct CommandContext<'a> {
    pub message: &'a ChatMessage,
    /// Text after the command word, original case preserved
    pub args: &'a str,
    pub session: &'a Session,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &CommandContext<'_>) -> CommandOutcome;
}

/// One row of the command table
pub struct BotCommand {
    pub name: &'static str,
    pub matcher: Matcher,
    pub access: Access,
    pub denial_message: &'static str,
    pub cooldown: Option<CooldownFamily>,
    pub handler: Box<dyn CommandHandler>,
}

/// Ordered command table plus the session it operates on
pub struct CommandSystem {
    commands: Vec<BotCommand>,
    session: Arc<Session>,
}

impl CommandSystem {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            commands: Vec::new(),
            session,
        }
    }

    /// The bot's built-in commands, in match priority order
    pub fn with_default_commands(session: Arc<Session>, clip_allow_list: Vec<String>) -> Self {
        let mut system = Self::new(session);

        system.add_command(BotCommand {
            name: "clip",
            matcher: Matcher::Exact(vec!["!clip"]),
            access: Access::privileged_with(clip_allow_list),
            denial_message: CLIP_DENIED,
            cooldown: Some(CooldownFamily::Clip),
            handler: Box::new(ClipCommand),
        });
        system.add_command(BotCommand {
            name: "rank",
            matcher: Matcher::Exact(vec!["!rank", "!rango"]),
            access: Access::Open,
            denial_message: COMMAND_DENIED,
            cooldown: Some(CooldownFamily::Rank),
            handler: Box::new(RankCommand),
        });
        system.add_command(BotCommand {
            name: "setpuuid",
            matcher: Matcher::Prefix("!setpuuid"),
            access: Access::privileged(),
            denial_message: COMMAND_DENIED,
            cooldown: None,
            handler: Box::new(SetPuuidCommand),
        });
        system.add_command(BotCommand {
            name: "pot",
            matcher: Matcher::Exact(vec!["!pot"]),
            access: Access::privileged(),
            denial_message: COMMAND_DENIED,
            cooldown: Some(CooldownFamily::Pot),
            handler: Box::new(PotCommand),
        });

        system
    }

    /// Register a command after the existing ones
    pub fn add_command(&mut self, command: BotCommand) {
        info!("Registered command: {}", command.name);
        self.commands.push(command);
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run one inbound message through dedup, permissions, cooldown and the handler
    pub async fn dispatch(&self, message: &ChatMessage) -> Vec<String> {
        let now = message.timestamp;

        if !self.session.dedup.observe(message.id.as_deref(), now).await {
            return Vec::new();
        }

        let content = message.content.trim();
        let normalized = content.to_lowercase();

        let Some(command) = self.commands.iter().find(|c| c.matcher.matches(&normalized)) else {
            return Vec::new();
        };

        debug!("Processing command '{}' from user '{}' in #{}",
               command.name, message.username, message.channel);

        if !command.access.is_authorized(message) {
            debug!("User '{}' is not allowed to use '{}'", message.username, command.name);
            return vec![command.denial_message.to_string()];
        }

        let permit = match command.cooldown {
            Some(family) => match self.session.cooldowns.try_acquire(family, now) {
                Ok(permit) => Some(permit),
                Err(remaining) => return vec![format!("Espera {} segundos", remaining)],
            },
            None => None,
        };

        info!("Executing command '{}' for user '{}' in #{}",
              command.name, message.username, message.channel);

        let args = content
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");
        let ctx = CommandContext {
            message,
            args,
            session: &self.session,
        };

        match command.handler.execute(&ctx).await {
            CommandOutcome::Completed(replies) => {
                if let Some(permit) = permit {
                    permit.commit();
                }
                replies
            }
            CommandOutcome::Rejected(replies) => replies,
        }
    }
}
