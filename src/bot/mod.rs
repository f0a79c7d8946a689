use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::BotConfig;
use crate::platforms::discord::DiscordRelay;
use crate::platforms::twitch::TwitchConnection;
use crate::platforms::PlatformConnection;
use crate::services::{HelixClient, HenrikClient, YouTubeClient};
use crate::types::ChatMessage;

pub mod commands;
pub mod cooldowns;
pub mod dedup;
pub mod handlers;
pub mod notifier;
pub mod permissions;
pub mod session;
pub mod subject;
pub mod timers;
pub mod video_store;

use commands::CommandSystem;
use notifier::VideoNotifier;
use session::Session;
use timers::PeriodicTask;
use video_store::VideoStore;

type SharedConnection = Arc<RwLock<Box<dyn PlatformConnection>>>;

/// Wires the chat connection, command dispatcher, upload notifier and Discord relay together
pub struct ChatBot {
    connection: SharedConnection,
    commands: Arc<CommandSystem>,
    notifier: Arc<VideoNotifier>,
    relay: Option<DiscordRelay>,
    channel: String,
    poll_interval: Duration,
}

impl ChatBot {
    pub fn new(
        connection: Box<dyn PlatformConnection>,
        commands: CommandSystem,
        notifier: VideoNotifier,
        poll_interval: Duration,
    ) -> Self {
        let channel = commands.session().channel.clone();

        Self {
            connection: Arc::new(RwLock::new(connection)),
            commands: Arc::new(commands),
            notifier: Arc::new(notifier),
            relay: None,
            channel,
            poll_interval,
        }
    }

    /// Build the bot and its API clients from startup configuration
    pub fn from_config(config: BotConfig) -> Self {
        let session = Arc::new(Session::new(
            config.twitch.channel.clone(),
            config.rank.initial_puuid.clone(),
            Arc::new(HelixClient::new(config.helix.clone())),
            Arc::new(HenrikClient::new(config.rank.clone())),
        ));
        let commands = CommandSystem::with_default_commands(session, config.clip_allowed_users.clone());

        let notifier = VideoNotifier::new(
            Arc::new(YouTubeClient::new(config.youtube.clone())),
            VideoStore::new(&config.last_video_path),
        );

        let bot = Self::new(
            Box::new(TwitchConnection::new(config.twitch.clone())),
            commands,
            notifier,
            Duration::from_secs(config.youtube.poll_interval_secs),
        );

        match config.discord {
            Some(discord) => bot.with_relay(DiscordRelay::new(discord)),
            None => bot,
        }
    }

    pub fn with_relay(mut self, relay: DiscordRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Connect and process events until `cancel` fires or the chat stream ends
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!("Starting chat bot...");

        self.notifier.store().initialize().await?;

        let receiver = {
            let mut connection = self.connection.write().await;
            connection.connect().await
                .with_context(|| format!("Failed to connect to {}", connection.platform_name()))?;
            connection.get_message_receiver()
                .context("Connection did not provide a message receiver")?
        };

        let mut tasks = vec![
            self.start_dedup_sweeper(cancel.clone()),
            self.start_video_poller(cancel.clone()),
        ];
        if let Some(relay) = self.relay.take() {
            tasks.push(self.start_relay(relay, cancel.clone()));
        }

        info!("Chat bot started successfully");
        self.process_messages(receiver, &cancel).await;

        cancel.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Background task failed: {}", e);
            }
        }

        let mut connection = self.connection.write().await;
        if !connection.is_connected().await {
            warn!("{} connection was lost", connection.platform_name());
        }
        connection.disconnect().await?;

        info!("Chat bot stopped");
        Ok(())
    }

    /// Dispatch each chat message in its own task so a slow command never stalls the stream
    async fn process_messages(&self, mut receiver: broadcast::Receiver<ChatMessage>, cancel: &CancellationToken) {
        let mut in_flight = JoinSet::new();

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = finished {
                        error!("Command task failed: {}", e);
                    }
                    continue;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(message) => {
                    let commands = Arc::clone(&self.commands);
                    let connection = Arc::clone(&self.connection);
                    in_flight.spawn(async move {
                        let replies = commands.dispatch(&message).await;
                        say(&connection, &message.channel, &replies).await;
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Message processor lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => {
                    warn!("Chat message stream closed");
                    break;
                }
            }
        }

        if !in_flight.is_empty() {
            info!("Abandoning {} unfinished commands", in_flight.len());
            in_flight.abort_all();
        }
        while in_flight.join_next().await.is_some() {}
    }

    fn start_dedup_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let session = Arc::clone(self.commands.session());
        let period = session
            .dedup
            .retention()
            .to_std()
            .unwrap_or(Duration::from_secs(dedup::MESSAGE_RETENTION_SECONDS as u64));

        PeriodicTask::new("dedup-sweep", period).spawn(cancel, move || {
            let session = Arc::clone(&session);
            async move {
                session.dedup.sweep(chrono::Utc::now()).await;
            }
        })
    }

    fn start_video_poller(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let connection = Arc::clone(&self.connection);
        let channel = self.channel.clone();

        PeriodicTask::new("youtube-poll", self.poll_interval)
            .run_immediately()
            .spawn(cancel, move || {
                let notifier = Arc::clone(&notifier);
                let connection = Arc::clone(&connection);
                let channel = channel.clone();
                async move {
                    if let Some(announcement) = notifier.check_for_new_video().await {
                        say(&connection, &channel, &[announcement]).await;
                    }
                }
            })
    }

    fn start_relay(&self, relay: DiscordRelay, cancel: CancellationToken) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let connection = Arc::clone(&self.connection);
        let channel = self.channel.clone();
        let mut messages = relay.start(cancel);

        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                if let Some(announcement) = notifier.handle_relay(&message.content).await {
                    say(&connection, &channel, &[announcement]).await;
                }
            }
        })
    }
}

/// Send each line to the channel, logging failures instead of propagating them
async fn say(connection: &SharedConnection, channel: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }

    let connection = connection.read().await;
    for line in lines {
        if let Err(e) = connection.send_message(channel, line).await {
            error!("Failed to send response to {}#{}: {}", connection.platform_name(), channel, e);
        } else {
            info!("Sent response to {}#{}: {}", connection.platform_name(), channel, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{AdapterError, AdapterResult, ClipService, RankService, VideoFeed};
    use crate::types::{ChatRole, RankInfo, VideoRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    type SentLines = Arc<Mutex<Vec<(String, String)>>>;

    /// In-memory chat connection that records everything the bot says
    struct RecordingConnection {
        sender: broadcast::Sender<ChatMessage>,
        sent: SentLines,
    }

    #[async_trait]
    impl PlatformConnection for RecordingConnection {
        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        async fn send_message(&self, channel: &str, message: &str) -> Result<()> {
            self.sent.lock().unwrap().push((channel.to_string(), message.to_string()));
            Ok(())
        }

        fn platform_name(&self) -> &str {
            "test"
        }

        async fn is_connected(&self) -> bool {
            true
        }

        fn get_message_receiver(&self) -> Option<broadcast::Receiver<ChatMessage>> {
            Some(self.sender.subscribe())
        }

        async fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl ClipService for Unavailable {
        async fn broadcaster_id(&self, _login: &str) -> AdapterResult<String> {
            Err(AdapterError::MissingField("data[0].id"))
        }

        async fn create_clip(&self, _broadcaster_id: &str) -> AdapterResult<String> {
            Err(AdapterError::MissingField("data[0].id"))
        }
    }

    #[async_trait]
    impl RankService for Unavailable {
        async fn rank(&self, _puuid: &str) -> AdapterResult<RankInfo> {
            Err(AdapterError::MissingField("data"))
        }
    }

    /// Clip service whose user lookup never answers
    #[derive(Default)]
    struct HangingClips {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ClipService for HangingClips {
        async fn broadcaster_id(&self, _login: &str) -> AdapterResult<String> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn create_clip(&self, _broadcaster_id: &str) -> AdapterResult<String> {
            std::future::pending().await
        }
    }

    struct StaticFeed;

    #[async_trait]
    impl VideoFeed for StaticFeed {
        async fn latest_video(&self) -> AdapterResult<VideoRecord> {
            Ok(VideoRecord {
                id: "B".to_string(),
                title: "Nuevo".to_string(),
                url: VideoRecord::watch_url("B"),
                published_at: None,
            })
        }

        async fn video_by_id(&self, video_id: &str) -> AdapterResult<VideoRecord> {
            Ok(VideoRecord {
                id: video_id.to_string(),
                title: "Nuevo".to_string(),
                url: VideoRecord::watch_url(video_id),
                published_at: None,
            })
        }
    }

    struct RunningBot {
        sender: broadcast::Sender<ChatMessage>,
        sent: SentLines,
        cancel: CancellationToken,
        handle: JoinHandle<Result<()>>,
        _store_dir: TempDir,
    }

    impl RunningBot {
        async fn start(clips: Arc<dyn ClipService>) -> Self {
            let store_dir = tempdir().unwrap();
            let (sender, _) = broadcast::channel(16);
            let sent: SentLines = Arc::new(Mutex::new(Vec::new()));
            let connection = RecordingConnection {
                sender: sender.clone(),
                sent: Arc::clone(&sent),
            };

            let session = Arc::new(Session::new(
                "b0rja".to_string(),
                "566844b6-f15b-558a-8617-575b5f7b04a4".to_string(),
                clips,
                Arc::new(Unavailable),
            ));
            let notifier = VideoNotifier::new(
                Arc::new(StaticFeed),
                VideoStore::new(store_dir.path().join("lastVideo.json")),
            );
            let bot = ChatBot::new(
                Box::new(connection),
                CommandSystem::with_default_commands(session, Vec::new()),
                notifier,
                Duration::from_secs(3600),
            );

            let cancel = CancellationToken::new();
            let handle = tokio::spawn(bot.run(cancel.clone()));

            // Wait for the receiver to be subscribed before sending
            while sender.receiver_count() == 0 {
                tokio::task::yield_now().await;
            }

            Self {
                sender,
                sent,
                cancel,
                handle,
                _store_dir: store_dir,
            }
        }

        fn send(&self, id: &str, username: &str, role: ChatRole, text: &str) {
            self.sender
                .send(ChatMessage {
                    id: Some(id.to_string()),
                    platform: "twitch".to_string(),
                    channel: "b0rja".to_string(),
                    username: username.to_string(),
                    display_name: None,
                    content: text.to_string(),
                    timestamp: chrono::Utc::now(),
                    roles: vec![role],
                })
                .unwrap();
        }

        async fn wait_for_lines(&self, count: usize) -> Vec<(String, String)> {
            for _ in 0..200 {
                if self.sent.lock().unwrap().len() >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.sent.lock().unwrap().clone()
        }

        async fn stop(self) {
            self.cancel.cancel();
            self.handle.await.unwrap().unwrap();
        }
    }

    fn count_starting_with(sent: &[(String, String)], prefix: &str) -> usize {
        sent.iter().filter(|(_, line)| line.starts_with(prefix)).count()
    }

    #[tokio::test]
    async fn test_run_announces_and_replies() {
        let bot = RunningBot::start(Arc::new(Unavailable)).await;

        bot.send("1", "mod", ChatRole::Moderator, "!pot");
        let sent = bot.wait_for_lines(6).await;
        bot.stop().await;

        assert!(sent.iter().all(|(channel, _)| channel == "b0rja"));
        assert_eq!(count_starting_with(&sent, "pot"), 5);
        assert_eq!(count_starting_with(&sent, "!editcom !youtube"), 1);
    }

    #[tokio::test]
    async fn test_hung_clip_does_not_block_other_commands() {
        let clips = Arc::new(HangingClips::default());
        let bot = RunningBot::start(clips.clone()).await;

        bot.send("1", "b0rja", ChatRole::Broadcaster, "!clip");
        for _ in 0..200 {
            if clips.lookups.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(clips.lookups.load(Ordering::SeqCst), 1);

        bot.send("2", "b0rja", ChatRole::Broadcaster, "!clip");
        bot.send("3", "mod", ChatRole::Moderator, "!pot");

        // announcement + in-flight clip denial + five pot lines
        let sent = bot.wait_for_lines(7).await;
        bot.stop().await;

        assert_eq!(count_starting_with(&sent, "pot"), 5);
        assert_eq!(count_starting_with(&sent, "Espera 30 segundos"), 1);
        assert_eq!(clips.lookups.load(Ordering::SeqCst), 1);
    }
}
