//! Notification fan-out to live subscribers.
//!
//! Every channel is a `tokio::sync::broadcast` sender created on first
//! subscription and dropped again when its last [`Subscription`] goes away.
//! Delivery is best-effort: a slow subscriber that lags behind the channel
//! capacity skips the missed messages and keeps receiving newer ones.

use crate::document::DocKey;
use crate::event::{IndexChange, LiveUpdate, Notification};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::debug;

/// A notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Channel {
    /// Added/Changed/Removed/Reset/EndpointAdded/EndpointRemoved
    Index,
    /// Live values of one document
    Document { source: String, id: String },
}

impl Channel {
    pub fn document(key: &DocKey) -> Self {
        Channel::Document {
            source: key.source.clone(),
            id: key.id.clone(),
        }
    }
}

/// Broadcasts notifications to the subscribers of each channel.
pub struct NotificationHub {
    channels: RwLock<HashMap<Channel, broadcast::Sender<Notification>>>,
    capacity: usize,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Broadcast `message` on `channel`, returning the number of receivers.
    pub fn notify(&self, channel: &Channel, message: Notification) -> usize {
        let channels = self.channels.read();
        match channels.get(channel) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// Broadcast an index change on the index channel.
    pub fn publish_change(&self, change: IndexChange) -> usize {
        self.notify(&Channel::Index, Notification::Index(change))
    }

    /// Broadcast a live update on the document's own channel.
    pub fn publish_live(&self, update: LiveUpdate) -> usize {
        let channel = Channel::Document {
            source: update.source.clone(),
            id: update.id.clone(),
        };
        self.notify(&channel, Notification::Live(update))
    }

    /// Whether anyone currently listens on `channel`.
    pub fn has_subscribers(&self, channel: &Channel) -> bool {
        self.channels
            .read()
            .get(channel)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Open a subscription; dropping it unsubscribes.
    pub fn subscribe(self: &Arc<Self>, channel: Channel) -> Subscription {
        let mut channels = self.channels.write();
        let sender = channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let receiver = sender.subscribe();
        debug!(channel = ?channel, "Subscription opened");

        Subscription {
            channel,
            receiver,
            hub: Arc::downgrade(self),
        }
    }

    fn release(&self, channel: &Channel) {
        let mut channels = self.channels.write();
        // The releasing subscription's receiver is still alive here.
        if channels
            .get(channel)
            .is_some_and(|sender| sender.receiver_count() <= 1)
        {
            channels.remove(channel);
            debug!(channel = ?channel, "Channel closed");
        }
    }
}

/// A live subscription to one channel.
pub struct Subscription {
    channel: Channel,
    receiver: broadcast::Receiver<Notification>,
    hub: Weak<NotificationHub>,
}

impl Subscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Wait for the next message. Returns `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(channel = ?self.channel, skipped, "Subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.release(&self.channel);
        }
    }
}
