use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::bot::ZorniBot;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("zorni_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting ZORNI bot v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return sources::health_check().await;
    }

    let config = Config::load()?;
    info!("⚙️ {}", config.summary());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;

    let shutdown = CancellationToken::new();
    let token = config.discord_token.clone();
    let handler = ZorniBot::new(config, shutdown.clone());

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Connecting to Discord");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
