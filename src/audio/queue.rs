use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, UserId};
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::sources::TrackSource;

/// One play request waiting in (or taken from) a guild's queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub source: TrackSource,
    pub requested_by: UserId,
    pub requester_name: String,
    /// Text channel the request came from; announcements go there.
    pub channel_id: ChannelId,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(
        source: TrackSource,
        requested_by: UserId,
        requester_name: impl Into<String>,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            source,
            requested_by,
            requester_name: requester_name.into(),
            channel_id,
            added_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        self.source.title()
    }
}

/// Strict FIFO of pending requests.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<QueueItem>,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail and returns the 1-based position.
    pub fn push(&mut self, item: QueueItem) -> usize {
        info!("➕ Queued: {}", item.title());
        self.items.push_back(item);
        self.items.len()
    }

    /// Takes the oldest entry.
    pub fn pop(&mut self) -> Option<QueueItem> {
        let next = self.items.pop_front();
        if let Some(ref item) = next {
            debug!("➡️ Next in queue: {}", item.title());
        }
        next
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        if removed > 0 {
            info!("🗑️ Queue cleared ({} entries)", removed);
        }
        removed
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn item(title: &str, requester: u64) -> QueueItem {
        QueueItem::new(
            TrackSource::youtube(title.to_string(), format!("https://youtu.be/{title}")),
            UserId::new(requester),
            format!("user{requester}"),
            ChannelId::new(42),
        )
    }

    #[test]
    fn pops_in_insertion_order() {
        let mut queue = MusicQueue::new();
        assert_eq!(queue.push(item("a", 1)), 1);
        assert_eq!(queue.push(item("b", 2)), 2);
        assert_eq!(queue.push(item("c", 1)), 3);

        assert_eq!(queue.pop().map(|i| i.title().to_string()), Some("a".into()));
        let titles: Vec<String> = queue.items().iter().map(|i| i.title().to_string()).collect();
        assert_eq!(titles, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(queue.clear(), 2);
        assert!(queue.items().is_empty());
        assert!(queue.pop().is_none());
    }
}
