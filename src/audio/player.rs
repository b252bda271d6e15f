use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serenity::model::id::{GuildId, UserId};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        backend::{TrackControl, TrackEnd, VoiceBackend},
        queue::{MusicQueue, QueueItem},
    },
    error::PlaybackError,
};

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct PlaybackSettings {
    pub skip_vote_threshold: usize,
    /// Percent, 0..=100.
    pub default_volume: u8,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            skip_vote_threshold: 3,
            default_volume: 50,
        }
    }
}

/// Published by the consumption loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started(QueueItem),
    Finished { item: QueueItem, error: Option<String> },
    Failed { item: QueueItem, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The requester voted on their own entry.
    RequesterSkip,
    QuorumSkip { votes: usize },
    Counted { votes: usize, needed: usize },
    AlreadyVoted { votes: usize, needed: usize },
    NothingPlaying,
}

/// Snapshot of the current entry for status replies.
#[derive(Debug, Clone)]
pub struct NowPlayingInfo {
    pub item: QueueItem,
    pub paused: bool,
    pub volume: u8,
    pub skip_votes: usize,
    pub skip_vote_threshold: usize,
    pub started_at: DateTime<Utc>,
}

struct NowPlaying {
    item: QueueItem,
    control: Arc<dyn TrackControl>,
    paused: bool,
    /// Set once `stop()` was issued; the loop clears `current` when the
    /// completion signal arrives.
    stopping: bool,
    started_at: DateTime<Utc>,
}

struct PlaybackState {
    queue: MusicQueue,
    current: Option<NowPlaying>,
    skip_votes: HashSet<UserId>,
    volume: u8,
}

impl PlaybackState {
    /// The current entry, unless it is already on its way out.
    fn active(&mut self) -> Option<&mut NowPlaying> {
        self.current.as_mut().filter(|now| !now.stopping)
    }

    fn stop_current(&mut self) -> bool {
        self.skip_votes.clear();
        match self.active() {
            Some(now) => {
                now.stopping = true;
                if let Err(e) = now.control.stop() {
                    warn!("⚠️ Could not stop {}: {}", now.item.title(), e);
                }
                true
            }
            None => false,
        }
    }
}

/// Playback state of one guild: a FIFO of pending requests, the single
/// entry that is currently streaming, and the skip votes against it.
///
/// Exactly one consumption loop runs per instance. It is the only writer of
/// `current`; every other operation goes through the same mutex, which is
/// never held across an `.await`.
pub struct GuildPlayback {
    guild_id: GuildId,
    state: Mutex<PlaybackState>,
    wake: Notify,
    events: broadcast::Sender<PlaybackEvent>,
    shutdown: CancellationToken,
    backend: Arc<dyn VoiceBackend>,
    skip_vote_threshold: usize,
}

impl GuildPlayback {
    /// Creates the state and spawns its consumption loop.
    pub fn spawn(
        guild_id: GuildId,
        backend: Arc<dyn VoiceBackend>,
        settings: PlaybackSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let playback = Arc::new(Self {
            guild_id,
            state: Mutex::new(PlaybackState {
                queue: MusicQueue::new(),
                current: None,
                skip_votes: HashSet::new(),
                volume: settings.default_volume.min(100),
            }),
            wake: Notify::new(),
            events,
            shutdown: CancellationToken::new(),
            backend,
            skip_vote_threshold: settings.skip_vote_threshold.max(1),
        });

        tokio::spawn(playback.clone().consume());
        playback
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Appends to the queue and returns the 1-based queue position. Never
    /// starts playback itself; the loop picks the entry up.
    pub fn enqueue(&self, item: QueueItem) -> usize {
        let position = self.state.lock().queue.push(item);
        self.wake.notify_one();
        position
    }

    /// Stops the current entry. Returns `false` (and does nothing) when idle.
    pub fn skip(&self) -> bool {
        let skipped = self.state.lock().stop_current();
        if skipped {
            info!("⏭️ Skipped in guild {}", self.guild_id);
        }
        skipped
    }

    pub fn vote_skip(&self, voter: UserId) -> VoteOutcome {
        let needed = self.skip_vote_threshold;
        let mut state = self.state.lock();

        let requester = match state.active() {
            Some(now) => now.item.requested_by,
            None => return VoteOutcome::NothingPlaying,
        };

        if requester == voter {
            state.stop_current();
            return VoteOutcome::RequesterSkip;
        }

        if !state.skip_votes.insert(voter) {
            return VoteOutcome::AlreadyVoted {
                votes: state.skip_votes.len(),
                needed,
            };
        }

        let votes = state.skip_votes.len();
        if votes >= needed {
            state.stop_current();
            info!("🗳️ Skip vote passed in guild {} ({} votes)", self.guild_id, votes);
            VoteOutcome::QuorumSkip { votes }
        } else {
            VoteOutcome::Counted { votes, needed }
        }
    }

    /// Pauses a playing entry. `false` when there is nothing to pause.
    pub fn pause(&self) -> Result<bool, PlaybackError> {
        let mut state = self.state.lock();
        match state.active() {
            Some(now) if !now.paused => {
                now.control.pause()?;
                now.paused = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Resumes a paused entry. `false` when nothing is paused.
    pub fn resume(&self) -> Result<bool, PlaybackError> {
        let mut state = self.state.lock();
        match state.active() {
            Some(now) if now.paused => {
                now.control.resume()?;
                now.paused = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Sets the volume of the current entry and of every following one.
    /// Values outside 0..=100 are rejected and leave the volume untouched.
    pub fn set_volume(&self, percent: i64) -> Result<u8, PlaybackError> {
        let percent = u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(PlaybackError::VolumeOutOfRange(percent))?;

        let mut state = self.state.lock();
        let now = state.active().ok_or(PlaybackError::NothingPlaying)?;
        now.control.set_volume(gain(percent))?;
        state.volume = percent;

        debug!("🔊 Volume in guild {} set to {}%", self.guild_id, percent);
        Ok(percent)
    }

    #[cfg(test)]
    pub fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    #[cfg(test)]
    pub fn skip_votes(&self) -> usize {
        self.state.lock().skip_votes.len()
    }

    pub fn now_playing(&self) -> Option<NowPlayingInfo> {
        let state = self.state.lock();
        state.current.as_ref().map(|now| NowPlayingInfo {
            item: now.item.clone(),
            paused: now.paused,
            volume: state.volume,
            skip_votes: state.skip_votes.len(),
            skip_vote_threshold: self.skip_vote_threshold,
            started_at: now.started_at,
        })
    }

    pub fn queued(&self) -> Vec<QueueItem> {
        self.state.lock().queue.items()
    }

    #[cfg(test)]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn is_connected(&self) -> bool {
        self.backend.is_connected().await
    }

    /// Stops playback, ends the consumption loop, clears the queue and
    /// disconnects from voice. Safe to call more than once and without an
    /// active connection; disconnect failures are only logged.
    pub async fn teardown(&self) {
        self.shutdown.cancel();
        {
            let mut state = self.state.lock();
            state.queue.clear();
            state.stop_current();
        }

        if let Err(e) = self.backend.disconnect().await {
            warn!("⚠️ Disconnect in guild {} failed: {}", self.guild_id, e);
        }

        info!("👋 Playback for guild {} torn down", self.guild_id);
    }

    async fn next_item(&self) -> QueueItem {
        loop {
            let next = self.state.lock().queue.pop();
            if let Some(item) = next {
                return item;
            }
            self.wake.notified().await;
        }
    }

    async fn consume(self: Arc<Self>) {
        debug!("🔁 Consumption loop started for guild {}", self.guild_id);

        loop {
            let item = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                item = self.next_item() => item,
            };

            let volume = gain(self.state.lock().volume);
            let started = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                started = self.backend.start(&item, volume) => started,
            };

            let started = match started {
                Ok(started) => started,
                Err(e) => {
                    warn!("❌ Could not start {}: {}", item.title(), e);
                    let _ = self.events.send(PlaybackEvent::Failed {
                        item,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            {
                let mut state = self.state.lock();
                state.skip_votes.clear();
                state.current = Some(NowPlaying {
                    item: item.clone(),
                    control: started.control.clone(),
                    paused: false,
                    stopping: false,
                    started_at: Utc::now(),
                });
            }
            info!("▶️ Now playing in guild {}: {}", self.guild_id, item.title());
            let _ = self.events.send(PlaybackEvent::Started(item.clone()));

            let end = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    if let Err(e) = started.control.stop() {
                        warn!("⚠️ Could not stop {}: {}", item.title(), e);
                    }
                    None
                }
                // A dropped sender means the driver went away with the track.
                end = started.finished => Some(end.unwrap_or(TrackEnd::Completed)),
            };

            {
                let mut state = self.state.lock();
                state.current = None;
                state.skip_votes.clear();
            }

            let Some(end) = end else { break };
            let error = match end {
                TrackEnd::Completed => None,
                TrackEnd::Failed(reason) => Some(reason),
            };
            let _ = self.events.send(PlaybackEvent::Finished { item, error });
        }

        self.state.lock().current = None;
        debug!("⏹️ Consumption loop ended for guild {}", self.guild_id);
    }
}

/// Percent to linear gain.
fn gain(percent: u8) -> f32 {
    f32::from(percent) / 100.0
}
