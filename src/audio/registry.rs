use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::player::GuildPlayback;

/// Every guild's playback state, created on first use and removed on teardown.
#[derive(Default)]
pub struct PlaybackRegistry {
    guilds: DashMap<GuildId, Arc<GuildPlayback>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayback>> {
        self.guilds.get(&guild_id).map(|entry| entry.clone())
    }

    /// Returns the guild's state, building it with `create` if there is none.
    /// The entry lock makes creation happen at most once per guild.
    pub fn get_or_insert_with<F>(&self, guild_id: GuildId, create: F) -> Arc<GuildPlayback>
    where
        F: FnOnce() -> Arc<GuildPlayback>,
    {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Playback state created for guild {}", guild_id);
                create()
            })
            .clone()
    }

    /// Teardown after the bot was seen leaving voice. A leave event can
    /// arrive after `stop` and a fresh join; the state is only torn down if
    /// its own connection is gone.
    pub async fn teardown_if_disconnected(&self, guild_id: GuildId) -> bool {
        let Some(playback) = self.get(guild_id) else {
            return false;
        };

        if playback.is_connected().await {
            debug!("🔁 Stale voice leave in guild {}, session kept", guild_id);
            return false;
        }

        let removed = self
            .guilds
            .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, &playback))
            .is_some();
        if removed {
            playback.teardown().await;
        }
        removed
    }

    /// Removes and tears down the guild's state. `false` if there was none.
    pub async fn teardown(&self, guild_id: GuildId) -> bool {
        // No DashMap guard may live across the await below.
        let removed = self.guilds.remove(&guild_id);

        match removed {
            Some((_, playback)) => {
                playback.teardown().await;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::{tests::FakeBackend, PlaybackSettings};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn creates_once_and_tears_down() {
        let registry = PlaybackRegistry::new();
        let guild = GuildId::new(7);
        let backend = Arc::new(FakeBackend::default());

        let first = registry.get_or_insert_with(guild, || {
            GuildPlayback::spawn(guild, backend.clone(), PlaybackSettings::default())
        });
        let second = registry.get_or_insert_with(guild, || unreachable!("already registered"));
        assert!(Arc::ptr_eq(&first, &second));

        assert!(registry.teardown(guild).await);
        assert!(first.is_shut_down());
        assert!(backend.disconnected.load(Ordering::SeqCst));
        assert!(registry.get(guild).is_none());

        // Nothing left to tear down.
        assert!(!registry.teardown(guild).await);
    }

    #[tokio::test]
    async fn late_voice_leave_keeps_a_fresh_session() {
        let registry = PlaybackRegistry::new();
        let guild = GuildId::new(7);

        // `stop`, then a new join before the old leave event is handled.
        let old = Arc::new(FakeBackend::default());
        registry.get_or_insert_with(guild, || {
            GuildPlayback::spawn(guild, old.clone(), PlaybackSettings::default())
        });
        assert!(registry.teardown(guild).await);

        let fresh = Arc::new(FakeBackend::default());
        let playback = registry.get_or_insert_with(guild, || {
            GuildPlayback::spawn(guild, fresh.clone(), PlaybackSettings::default())
        });

        assert!(!registry.teardown_if_disconnected(guild).await);
        assert!(registry.get(guild).is_some());
        assert!(!playback.is_shut_down());
        assert!(!fresh.disconnected.load(Ordering::SeqCst));

        // A real disconnect of the current session still tears it down.
        fresh.dropped.store(true, Ordering::SeqCst);
        assert!(registry.teardown_if_disconnected(guild).await);
        assert!(playback.is_shut_down());
        assert!(registry.get(guild).is_none());
        assert!(!registry.teardown_if_disconnected(guild).await);
    }
}
