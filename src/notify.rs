use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Notice;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for per-party notices: one channel per tutor or parent id.
/// Delivery is fire-and-forget — no acknowledgment, no retry, and sends
/// without a subscriber are dropped.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notice>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a party's notices. Creates the channel if needed.
    pub fn subscribe(&self, party: Ulid) -> broadcast::Receiver<Notice> {
        let sender = self
            .channels
            .entry(party)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notice. No-op if nobody is listening.
    pub fn send(&self, party: Ulid, notice: &Notice) {
        tracing::debug!(
            party = %party,
            payload = %serde_json::to_string(notice).unwrap_or_default(),
            "notice dispatched"
        );
        if let Some(sender) = self.channels.get(&party) {
            let _ = sender.send(notice.clone());
        }
    }

    /// Remove a party's channel.
    #[allow(dead_code)]
    pub fn remove(&self, party: &Ulid) {
        self.channels.remove(party);
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}
