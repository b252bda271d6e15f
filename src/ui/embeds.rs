use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{player::NowPlayingInfo, queue::QueueItem};

/// Bot colour palette
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 ZORNI";
const QUEUE_PAGE_LIMIT: usize = 10;

fn duration_field(duration: Option<Duration>) -> String {
    duration.map(format_duration).unwrap_or_else(|| "🔴 Live".to_string())
}

fn with_link(embed: CreateEmbed, item: &QueueItem) -> CreateEmbed {
    let mut embed = embed;
    if let Some(url) = item.source.url() {
        embed = embed.url(url);
    }
    if let Some(thumbnail) = item.source.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

/// Announcement when the loop starts an entry.
pub fn create_now_playing_embed(item: &QueueItem) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("🎵 Jetzt läuft")
        .description(format!("**{}**", item.title()))
        .color(colors::MUSIC_PURPLE)
        .field("⏱️ Dauer", duration_field(item.source.duration()), true)
        .field("👤 Gewünscht von", format!("<@{}>", item.requested_by), true)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    with_link(embed, item)
}

/// Status reply for the now-playing command.
pub fn create_status_embed(now: &NowPlayingInfo) -> CreateEmbed {
    let state = if now.paused { "⏸️ Pausiert" } else { "▶️ Läuft" };

    let embed = CreateEmbed::default()
        .title(state)
        .description(format!("**{}**", now.item.title()))
        .color(if now.paused {
            colors::NEUTRAL_GRAY
        } else {
            colors::MUSIC_PURPLE
        })
        .field("⏱️ Dauer", duration_field(now.item.source.duration()), true)
        .field("👤 Gewünscht von", format!("<@{}>", now.item.requested_by), true)
        .field("🔊 Lautstärke", format!("{}%", now.volume), true)
        .field(
            "⏭️ Skip-Stimmen",
            format!("{}/{}", now.skip_votes, now.skip_vote_threshold),
            true,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    let embed = match Timestamp::from_unix_timestamp(now.started_at.timestamp()) {
        Ok(started) => embed.timestamp(started),
        Err(_) => embed,
    };

    with_link(embed, &now.item)
}

/// Reply after a successful play request.
pub fn create_track_added_embed(item: &QueueItem, position: usize) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("✅ Eingereiht")
        .description(format!("**{}**", item.title()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Dauer", duration_field(item.source.duration()), true)
        .field("📍 Position", position.to_string(), true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    with_link(embed, item)
}

pub fn create_queue_embed(current: Option<&NowPlayingInfo>, queued: &[QueueItem]) -> CreateEmbed {
    let mut description = match current {
        Some(now) => format!("▶️ **{}**\n\n", now.item.title()),
        None => "Gerade läuft nichts.\n\n".to_string(),
    };

    if queued.is_empty() {
        description.push_str("Die Warteschlange ist leer.");
    } else {
        for (index, item) in queued.iter().take(QUEUE_PAGE_LIMIT).enumerate() {
            description.push_str(&format!(
                "`{}.` {} ({}) - {}\n",
                index + 1,
                item.title(),
                duration_field(item.source.duration()),
                item.requester_name
            ));
        }
        if queued.len() > QUEUE_PAGE_LIMIT {
            description.push_str(&format!("… und {} weitere", queued.len() - QUEUE_PAGE_LIMIT));
        }
    }

    CreateEmbed::default()
        .title("📋 Warteschlange")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_error_embed(title: &str, message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {title}"))
        .description(message)
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_clock_formatted() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(212)), "3:32");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(duration_field(None), "🔴 Live");
    }
}
