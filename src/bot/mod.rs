//! # Bot Module
//!
//! Discord side of ZORNI: the shared application context and the gateway
//! event handler.
//!
//! [`ZorniBot`] implements Serenity's [`EventHandler`] and routes every
//! incoming message to one of two places:
//!
//! - the welcome gate, for anything posted in the welcome channel
//! - the static command table, for prefixed commands in other guild text
//!   channels
//!
//! Direct messages are ignored.
//!
//! Voice playback state lives in a per-guild [`PlaybackRegistry`]; it is
//! created on the first join and torn down on `stop` or when the bot is
//! disconnected from voice.

use serenity::{
    all::{ActivityData, Context, EventHandler, GuildId, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod commands;
pub mod events;
pub mod gate;
pub mod handlers;
pub mod price;
pub mod reporter;

use crate::{
    audio::{player::PlaybackSettings, registry::PlaybackRegistry},
    config::Config,
    sources::{clips::ClipLibrary, youtube::YouTubeClient},
};
use commands::{CommandTable, Invocation};
use gate::{DiscordMember, WelcomeGate};
use price::PriceClient;
use reporter::GuildDirectory;

/// Where an incoming message goes.
#[derive(Debug, PartialEq)]
pub enum Route<'a> {
    /// Welcome channel: handled (and deleted) by the gate.
    Gate,
    Command(Invocation<'a>),
    Ignore,
}

/// Picks the destination of a message. `channel_name` is `None` for
/// anything that is not a guild text channel, such as direct messages.
pub fn route<'a>(
    config: &Config,
    commands: &CommandTable,
    channel_name: Option<&str>,
    author_is_bot: bool,
    content: &'a str,
) -> Route<'a> {
    let Some(channel_name) = channel_name else {
        return Route::Ignore;
    };

    // Every message there is deleted, including those of bots.
    if channel_name == config.welcome_channel {
        return Route::Gate;
    }

    if author_is_bot {
        return Route::Ignore;
    }

    match commands.parse(content) {
        Some(invocation) if invocation.scope.allows(Some(channel_name), &config.bot_channel) => {
            Route::Command(invocation)
        }
        Some(invocation) => {
            debug!(
                "Ignoring {:?} outside #{}",
                invocation.kind, config.bot_channel
            );
            Route::Ignore
        }
        None => Route::Ignore,
    }
}

/// Application context shared by every event.
pub struct ZorniBot {
    pub config: Arc<Config>,
    pub commands: CommandTable,
    pub gate: WelcomeGate,
    pub playback: Arc<PlaybackRegistry>,
    pub youtube: YouTubeClient,
    pub clips: ClipLibrary,
    pub price: PriceClient,
    /// Shared HTTP client for stream lookups and the price API.
    pub http_client: reqwest::Client,
    shutdown: CancellationToken,
    reporter_started: AtomicBool,
}

impl ZorniBot {
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        let http_client = reqwest::Client::new();

        Self {
            commands: CommandTable::new(config.command_prefix.clone()),
            gate: WelcomeGate::new(config.welcome_command(), config.member_role.clone()),
            playback: Arc::new(PlaybackRegistry::new()),
            youtube: YouTubeClient::new(),
            clips: ClipLibrary::new(config.clips_dir.clone()),
            price: PriceClient::new(
                http_client.clone(),
                config.price_api_url.clone(),
                config.price_field.clone(),
            ),
            http_client,
            shutdown,
            reporter_started: AtomicBool::new(false),
            config: Arc::new(config),
        }
    }

    pub fn playback_settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            skip_vote_threshold: self.config.skip_vote_threshold,
            default_volume: self.config.default_volume,
        }
    }

    async fn channel_name(&self, ctx: &Context, msg: &Message) -> Option<String> {
        let cached = msg.guild_id.and_then(|guild_id| {
            ctx.cache.guild(guild_id).and_then(|guild| {
                guild
                    .channels
                    .get(&msg.channel_id)
                    .map(|channel| channel.name.clone())
            })
        });

        if cached.is_some() {
            return cached;
        }

        match msg.channel_id.to_channel(ctx).await {
            Ok(channel) => channel.guild().map(|channel| channel.name),
            Err(e) => {
                warn!("⚠️ Could not resolve channel {}: {}", msg.channel_id, e);
                None
            }
        }
    }

    /// Tears down the guild's playback after the bot left voice.
    async fn on_voice_disconnect(&self, guild_id: GuildId) {
        if self.playback.teardown_if_disconnected(guild_id).await {
            info!("🔌 Disconnected from voice in guild {}, playback cleared", guild_id);
        }
    }
}

#[async_trait]
impl EventHandler for ZorniBot {
    /// Sets the presence and starts the guild reporter. `ready` fires again
    /// after every reconnect; the reporter is only started once.
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::playing(self.config.presence_text.clone())));

        if !self.reporter_started.swap(true, Ordering::SeqCst) {
            let directory: Arc<dyn GuildDirectory> = ctx.cache.clone();
            tokio::spawn(reporter::run_reporter(
                directory,
                self.config.report_interval(),
                self.shutdown.clone(),
            ));
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let channel_name = match msg.guild_id {
            Some(_) => self.channel_name(&ctx, &msg).await,
            None => None,
        };

        let destination = route(
            &self.config,
            &self.commands,
            channel_name.as_deref(),
            msg.author.bot,
            &msg.content,
        );

        match destination {
            Route::Gate => {
                let member = DiscordMember { ctx: &ctx, msg: &msg };
                let outcome = self.gate.handle(&member, &msg.content).await;
                debug!("🚪 Welcome gate: {:?} for {}", outcome, msg.author.name);
            }
            Route::Command(invocation) => handlers::dispatch(&ctx, &msg, self, invocation).await,
            Route::Ignore => {}
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                self.on_voice_disconnect(guild_id).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::CommandKind;
    use pretty_assertions::assert_eq;

    fn route_in<'a>(channel: Option<&str>, author_is_bot: bool, content: &'a str) -> Route<'a> {
        let config = Config::default();
        let commands = CommandTable::new(config.command_prefix.clone());
        route(&config, &commands, channel, author_is_bot, content)
    }

    fn command_kind(route: Route<'_>) -> Option<CommandKind> {
        match route {
            Route::Command(invocation) => Some(invocation.kind),
            _ => None,
        }
    }

    #[test]
    fn welcome_channel_goes_to_the_gate() {
        assert_eq!(route_in(Some("willkommen"), false, "?gelesen"), Route::Gate);
        assert_eq!(route_in(Some("willkommen"), false, "hallo"), Route::Gate);
        // Commands are not run there; the message is deleted like any other.
        assert_eq!(route_in(Some("willkommen"), false, "?btc"), Route::Gate);
        assert_eq!(route_in(Some("willkommen"), true, "Willkommen!"), Route::Gate);
    }

    #[test]
    fn invite_is_answered_in_the_bot_channel_only() {
        assert_eq!(
            command_kind(route_in(Some("bot"), false, "?invite")),
            Some(CommandKind::Invite)
        );
        assert_eq!(route_in(Some("general"), false, "?invite"), Route::Ignore);
    }

    #[test]
    fn other_commands_work_in_any_guild_channel() {
        assert_eq!(
            command_kind(route_in(Some("general"), false, "?play never gonna")),
            Some(CommandKind::Play)
        );
        assert_eq!(
            command_kind(route_in(Some("bot"), false, "?btc")),
            Some(CommandKind::Price)
        );
        assert_eq!(route_in(Some("general"), false, "just chatting"), Route::Ignore);
        assert_eq!(route_in(Some("general"), false, "?unknown"), Route::Ignore);
    }

    #[test]
    fn bots_and_direct_messages_are_ignored() {
        assert_eq!(route_in(Some("bot"), true, "?invite"), Route::Ignore);
        assert_eq!(route_in(Some("general"), true, "?btc"), Route::Ignore);

        assert_eq!(route_in(None, false, "?btc"), Route::Ignore);
        assert_eq!(route_in(None, false, "?help"), Route::Ignore);
        assert_eq!(route_in(None, false, "?gelesen"), Route::Ignore);
    }
}
