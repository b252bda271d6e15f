//! The seam between a guild's playback state and the voice driver.
//!
//! [`GuildPlayback`](super::player::GuildPlayback) only ever talks to a
//! [`VoiceBackend`]; in production that is songbird, in tests an in-memory fake.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use songbird::{
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::{audio::queue::QueueItem, error::PlaybackError};

/// How a stream ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackEnd {
    Completed,
    Failed(String),
}

/// Controls of an active stream.
pub trait TrackControl: Send + Sync {
    fn stop(&self) -> Result<(), PlaybackError>;
    fn pause(&self) -> Result<(), PlaybackError>;
    fn resume(&self) -> Result<(), PlaybackError>;
    /// `volume` is linear gain, 1.0 being unchanged.
    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError>;
}

/// A stream that has been handed to the driver.
pub struct StartedTrack {
    pub control: Arc<dyn TrackControl>,
    /// Resolves once the stream ends for any reason, including `stop()`.
    pub finished: oneshot::Receiver<TrackEnd>,
}

#[async_trait]
pub trait VoiceBackend: Send + Sync {
    async fn start(&self, item: &QueueItem, volume: f32) -> Result<StartedTrack, PlaybackError>;
    async fn disconnect(&self) -> Result<(), PlaybackError>;
    /// Whether the voice connection this backend plays into is still up.
    async fn is_connected(&self) -> bool;
}

fn control_error(err: impl std::fmt::Display) -> PlaybackError {
    PlaybackError::Control(err.to_string())
}

impl TrackControl for TrackHandle {
    fn stop(&self) -> Result<(), PlaybackError> {
        TrackHandle::stop(self).map_err(control_error)
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        TrackHandle::pause(self).map_err(control_error)
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        TrackHandle::play(self).map_err(control_error)
    }

    fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        TrackHandle::set_volume(self, volume).map_err(control_error)
    }
}

/// Plays into the guild's songbird call.
pub struct SongbirdBackend {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
}

impl SongbirdBackend {
    pub fn new(
        guild_id: GuildId,
        manager: Arc<Songbird>,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            guild_id,
            manager,
            call,
            http,
        }
    }
}

#[async_trait]
impl VoiceBackend for SongbirdBackend {
    async fn start(&self, item: &QueueItem, volume: f32) -> Result<StartedTrack, PlaybackError> {
        let input = item.source.to_input(&self.http);

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        let (tx, rx) = oneshot::channel();
        let notifier = TrackFinished {
            guild_id: self.guild_id,
            tx: Arc::new(Mutex::new(Some(tx))),
        };

        let registered = handle
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .and_then(|_| handle.add_event(Event::Track(TrackEvent::Error), notifier))
            .map_err(|e| PlaybackError::Stream(e.to_string()));

        if let Err(e) = registered {
            let _ = handle.stop();
            return Err(e);
        }

        TrackControl::set_volume(&handle, volume)?;

        Ok(StartedTrack {
            control: Arc::new(handle),
            finished: rx,
        })
    }

    async fn disconnect(&self) -> Result<(), PlaybackError> {
        self.manager.remove(self.guild_id).await.map_err(control_error)
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_channel().is_some()
    }
}

/// Resolves the one-shot completion signal of a single track.
#[derive(Clone)]
struct TrackFinished {
    guild_id: GuildId,
    tx: Arc<Mutex<Option<oneshot::Sender<TrackEnd>>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackFinished {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut outcome = TrackEnd::Completed;

        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let PlayMode::Errored(e) = &state.playing {
                    error!("❌ Track error in guild {}: {:?}", self.guild_id, e);
                    outcome = TrackEnd::Failed(format!("{e:?}"));
                }
            }
        }

        if let Some(tx) = self.tx.lock().take() {
            debug!("🏁 Track finished in guild {}: {:?}", self.guild_id, outcome);
            let _ = tx.send(outcome);
        }

        // Cancel this handler; the track is done either way.
        Some(Event::Cancel)
    }
}
