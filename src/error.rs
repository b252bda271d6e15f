//! Error types shared by the command handlers and the playback core.
//!
//! The `Display` text of [`BotError`] is what members see in the channel, so
//! it is written in German like the rest of the bot's replies.

use thiserror::Error;

/// Failures raised by a guild's playback state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Gerade läuft nichts.")]
    NothingPlaying,

    #[error("Die Lautstärke muss zwischen 0 und 100 liegen (angegeben: {0}).")]
    VolumeOutOfRange(i64),

    #[error("Wiedergabe konnte nicht gestartet werden: {0}")]
    Stream(String),

    #[error("Wiedergabe konnte nicht gesteuert werden: {0}")]
    Control(String),
}

/// Everything a command handler can fail with.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Dieser Befehl funktioniert nur auf einem Server.")]
    NotInGuild,

    #[error("Du bist in keinem Sprachkanal.")]
    AuthorNotInVoice,

    #[error("Ich bin mit keinem Sprachkanal verbunden.")]
    NotConnected,

    #[error("Die Sprachfunktion ist gerade nicht verfügbar.")]
    VoiceUnavailable,

    #[error("Sprachkanal `{0}` wurde nicht gefunden.")]
    ChannelNotFound(String),

    #[error("Es fehlt ein Argument: {0}")]
    MissingArgument(&'static str),

    #[error("Ungültiges Argument: {0}")]
    InvalidArgument(String),

    #[error("Quelle konnte nicht geladen werden: {0}")]
    Source(String),

    #[error("Clip `{0}` gibt es nicht.")]
    ClipNotFound(String),

    #[error("Die Preis-API hat keinen brauchbaren Wert geliefert: {0}")]
    PriceFormat(String),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("Discord-Fehler: {0}")]
    Discord(#[from] serenity::Error),

    #[error("Sprachverbindung fehlgeschlagen: {0}")]
    Join(#[from] songbird::error::JoinError),

    #[error("HTTP-Fehler: {0}")]
    Http(#[from] reqwest::Error),
}

impl BotError {
    /// Text posted to the channel when a handler fails.
    pub fn user_message(&self) -> String {
        format!("⚠️ {self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_errors_keep_their_text_when_wrapped() {
        let err = BotError::from(PlaybackError::VolumeOutOfRange(140));
        assert_eq!(
            err.user_message(),
            "⚠️ Die Lautstärke muss zwischen 0 und 100 liegen (angegeben: 140)."
        );
    }
}
