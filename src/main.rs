use anyhow::Result;
use log::{error, info};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use streamrelay::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting streamrelay v{}", streamrelay::VERSION);

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return Err(e);
        }
    };

    info!("Channel: #{}", config.twitch.channel);
    info!("Last video store: {}", config.last_video_path.display());
    if config.discord.is_none() {
        info!("Discord relay not configured, relying on the polling timer only");
    }

    let bot = ChatBot::from_config(config);
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, stopping bot...");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    bot.run(cancel).await?;

    info!("Shutdown complete");
    Ok(())
}
