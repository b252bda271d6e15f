use serenity::{
    all::{ChannelId, ChannelType, GuildId, UserId},
    builder::{CreateEmbed, CreateMessage},
    model::channel::Message,
    prelude::Context,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    audio::{
        backend::SongbirdBackend,
        player::{GuildPlayback, VoteOutcome},
        queue::QueueItem,
    },
    bot::{
        commands::{CommandKind, Invocation},
        events::spawn_announcer,
        price::format_quote,
        ZorniBot,
    },
    error::{BotError, PlaybackError},
    sources::TrackSource,
    ui::embeds,
};

/// Runs the handler bound to `invocation`. Failures are posted to the
/// channel as a formatted error and then dropped; nothing is retried.
pub async fn dispatch(ctx: &Context, msg: &Message, bot: &ZorniBot, invocation: Invocation<'_>) {
    info!(
        "📝 Command {:?} by {} in channel {}",
        invocation.kind, msg.author.name, msg.channel_id
    );

    let args = invocation.args;
    let result = match invocation.kind {
        CommandKind::Invite => say(ctx, msg, &bot.config.invite_link).await,
        CommandKind::Join => handle_join(ctx, msg, bot, args).await,
        CommandKind::Summon => handle_summon(ctx, msg, bot).await,
        CommandKind::Play => handle_play(ctx, msg, bot, args).await,
        CommandKind::Clip => handle_clip(ctx, msg, bot, args).await,
        CommandKind::Clips => handle_clips(ctx, msg, bot).await,
        CommandKind::Volume => handle_volume(ctx, msg, bot, args).await,
        CommandKind::Pause => handle_pause(ctx, msg, bot).await,
        CommandKind::Resume => handle_resume(ctx, msg, bot).await,
        CommandKind::Stop => handle_stop(ctx, msg, bot).await,
        CommandKind::Skip => handle_skip(ctx, msg, bot).await,
        CommandKind::Playing => handle_playing(ctx, msg, bot).await,
        CommandKind::Queue => handle_queue(ctx, msg, bot).await,
        CommandKind::Price => handle_price(ctx, msg, bot).await,
        CommandKind::Help => say(ctx, msg, &bot.commands.help_text()).await,
    };

    if let Some(reply) = failure_reply(invocation.kind, result) {
        if let Err(send_err) = msg.channel_id.say(&ctx.http, reply).await {
            error!("Error sending error message: {:?}", send_err);
        }
    }
}

/// Logs a failed command and returns the text posted in its place.
fn failure_reply(kind: CommandKind, result: Result<(), BotError>) -> Option<String> {
    let e = result.err()?;
    warn!("⚠️ Command {:?} failed: {}", kind, e);
    Some(e.user_message())
}

// Command handlers

async fn handle_join(ctx: &Context, msg: &Message, bot: &ZorniBot, args: &str) -> Result<(), BotError> {
    if args.is_empty() {
        return Err(BotError::MissingArgument("Kanalname"));
    }

    let guild_id = guild_id(msg)?;
    let channel_id = voice_channel_by_name(ctx, guild_id, args)
        .ok_or_else(|| BotError::ChannelNotFound(args.to_string()))?;

    connect(ctx, bot, guild_id, channel_id).await?;
    say(ctx, msg, &format!("🔊 Verbunden mit **{args}**")).await
}

async fn handle_summon(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    let guild_id = guild_id(msg)?;
    let channel_id = author_voice_channel(ctx, guild_id, msg.author.id).ok_or(BotError::AuthorNotInVoice)?;

    connect(ctx, bot, guild_id, channel_id).await?;
    say(ctx, msg, &format!("🔊 Verbunden mit <#{channel_id}>")).await
}

async fn handle_play(ctx: &Context, msg: &Message, bot: &ZorniBot, args: &str) -> Result<(), BotError> {
    if args.is_empty() {
        return Err(BotError::MissingArgument("Titel oder URL"));
    }

    let playback = ensure_voice(ctx, msg, bot).await?;
    let source = bot.youtube.resolve(args).await?;
    enqueue(ctx, msg, &playback, source).await
}

async fn handle_clip(ctx: &Context, msg: &Message, bot: &ZorniBot, args: &str) -> Result<(), BotError> {
    if args.is_empty() {
        return Err(BotError::MissingArgument("Clipname"));
    }

    let source = bot.clips.resolve(args).await?;
    let playback = ensure_voice(ctx, msg, bot).await?;
    enqueue(ctx, msg, &playback, source).await
}

async fn handle_clips(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    let names = bot.clips.list().await;
    let text = if names.is_empty() {
        "Keine Clips vorhanden.".to_string()
    } else {
        format!("🔈 Clips: {}", names.join(", "))
    };
    say(ctx, msg, &text).await
}

async fn handle_volume(ctx: &Context, msg: &Message, bot: &ZorniBot, args: &str) -> Result<(), BotError> {
    let percent = parse_volume(args)?;
    let playback = connected(msg, bot)?;
    let volume = playback.set_volume(percent)?;
    say(ctx, msg, &format!("🔊 Lautstärke: {volume}%")).await
}

async fn handle_pause(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    if connected(msg, bot)?.pause()? {
        say(ctx, msg, "⏸️ Pausiert").await?;
    }
    Ok(())
}

async fn handle_resume(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    if connected(msg, bot)?.resume()? {
        say(ctx, msg, "▶️ Weiter geht's").await?;
    }
    Ok(())
}

async fn handle_stop(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    let guild_id = guild_id(msg)?;
    if !bot.playback.teardown(guild_id).await {
        return Err(BotError::NotConnected);
    }
    say(ctx, msg, "👋 Tschüss! Warteschlange geleert.").await
}

async fn handle_skip(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    let outcome = connected(msg, bot)?.vote_skip(msg.author.id);
    let reply = vote_reply(outcome)?;
    say(ctx, msg, &reply).await
}

async fn handle_playing(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    let now = bot
        .playback
        .get(guild_id(msg)?)
        .and_then(|playback| playback.now_playing())
        .ok_or(PlaybackError::NothingPlaying)?;

    send_embed(ctx, msg, embeds::create_status_embed(&now)).await
}

async fn handle_queue(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    let playback = connected(msg, bot)?;
    let now = playback.now_playing();
    let queued = playback.queued();

    send_embed(ctx, msg, embeds::create_queue_embed(now.as_ref(), &queued)).await
}

async fn handle_price(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<(), BotError> {
    let price = bot.price.quote().await?;
    say(ctx, msg, &format_quote(price)).await
}

// Helpers

fn guild_id(msg: &Message) -> Result<GuildId, BotError> {
    msg.guild_id.ok_or(BotError::NotInGuild)
}

fn connected(msg: &Message, bot: &ZorniBot) -> Result<Arc<GuildPlayback>, BotError> {
    bot.playback.get(guild_id(msg)?).ok_or(BotError::NotConnected)
}

/// The guild's playback state, joining the author's voice channel first if
/// the bot is not connected yet.
async fn ensure_voice(ctx: &Context, msg: &Message, bot: &ZorniBot) -> Result<Arc<GuildPlayback>, BotError> {
    let guild_id = guild_id(msg)?;
    if let Some(playback) = bot.playback.get(guild_id) {
        return Ok(playback);
    }

    let channel_id = author_voice_channel(ctx, guild_id, msg.author.id).ok_or(BotError::AuthorNotInVoice)?;
    connect(ctx, bot, guild_id, channel_id).await
}

/// Joins (or moves to) `channel_id` and makes sure the guild has a playback state.
async fn connect(
    ctx: &Context,
    bot: &ZorniBot,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<Arc<GuildPlayback>, BotError> {
    let manager = songbird::get(ctx).await.ok_or(BotError::VoiceUnavailable)?;
    let call = manager.join(guild_id, channel_id).await?;

    info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);

    let playback = bot.playback.get_or_insert_with(guild_id, || {
        let backend = Arc::new(SongbirdBackend::new(
            guild_id,
            manager.clone(),
            call.clone(),
            bot.http_client.clone(),
        ));
        let playback = GuildPlayback::spawn(guild_id, backend, bot.playback_settings());
        spawn_announcer(ctx.http.clone(), playback.subscribe());
        playback
    });

    Ok(playback)
}

async fn enqueue(
    ctx: &Context,
    msg: &Message,
    playback: &GuildPlayback,
    source: TrackSource,
) -> Result<(), BotError> {
    let item = QueueItem::new(source, msg.author.id, msg.author.name.clone(), msg.channel_id);
    let position = playback.enqueue(item.clone());
    send_embed(ctx, msg, embeds::create_track_added_embed(&item, position)).await
}

fn author_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
}

fn voice_channel_by_name(ctx: &Context, guild_id: GuildId, name: &str) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .channels
        .values()
        .find(|channel| {
            matches!(channel.kind, ChannelType::Voice | ChannelType::Stage) && channel.name == name
        })
        .map(|channel| channel.id)
}

fn parse_volume(args: &str) -> Result<i64, BotError> {
    if args.is_empty() {
        return Err(BotError::MissingArgument("0-100"));
    }
    args.trim_end_matches('%')
        .parse()
        .map_err(|_| BotError::InvalidArgument(format!("`{args}` ist keine Zahl")))
}

fn vote_reply(outcome: VoteOutcome) -> Result<String, PlaybackError> {
    match outcome {
        VoteOutcome::RequesterSkip => Ok("⏭️ Übersprungen.".to_string()),
        VoteOutcome::QuorumSkip { votes } => {
            Ok(format!("⏭️ Abstimmung erfolgreich ({votes} Stimmen), übersprungen."))
        }
        VoteOutcome::Counted { votes, needed } => {
            Ok(format!("🗳️ Stimme gezählt, aktuell {votes}/{needed}."))
        }
        VoteOutcome::AlreadyVoted { votes, needed } => {
            Ok(format!("Du hast schon abgestimmt ({votes}/{needed})."))
        }
        VoteOutcome::NothingPlaying => Err(PlaybackError::NothingPlaying),
    }
}

async fn say(ctx: &Context, msg: &Message, text: &str) -> Result<(), BotError> {
    msg.channel_id.say(&ctx.http, text).await?;
    Ok(())
}

async fn send_embed(ctx: &Context, msg: &Message, embed: CreateEmbed) -> Result<(), BotError> {
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}
