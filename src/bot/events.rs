use serenity::{all::ChannelId, builder::CreateMessage, http::Http};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, warn};

use crate::{
    audio::player::PlaybackEvent,
    error::BotError,
    ui::embeds::{create_error_embed, create_now_playing_embed},
};

/// Posts playback events of one guild to the channel each request came
/// from. Ends when the guild's playback state is dropped.
pub fn spawn_announcer(http: Arc<Http>, mut events: broadcast::Receiver<PlaybackEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = announce(&http, event).await {
                        error!("Error sending playback announcement: {:?}", e);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("⚠️ Announcer skipped {} playback events", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("📪 Announcer stopped");
    });
}

async fn announce(http: &Http, event: PlaybackEvent) -> Result<(), BotError> {
    let (channel_id, embed) = match event {
        PlaybackEvent::Started(item) => (item.channel_id, create_now_playing_embed(&item)),
        PlaybackEvent::Failed { item, reason } => (
            item.channel_id,
            create_error_embed(&format!("{} konnte nicht abgespielt werden", item.title()), &reason),
        ),
        PlaybackEvent::Finished {
            item,
            error: Some(reason),
        } => (
            item.channel_id,
            create_error_embed(&format!("Wiedergabe von {} abgebrochen", item.title()), &reason),
        ),
        PlaybackEvent::Finished { error: None, .. } => return Ok(()),
    };

    send_embed(http, channel_id, embed).await
}

async fn send_embed(
    http: &Http,
    channel_id: ChannelId,
    embed: serenity::builder::CreateEmbed,
) -> Result<(), BotError> {
    channel_id
        .send_message(http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}
