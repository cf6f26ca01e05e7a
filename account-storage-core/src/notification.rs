//! Notification bus
//!
//! A single broadcast channel carries every backend's change events to any
//! number of subscribers. Each backend gets its own [`Notifier`] bound to its
//! registration index, so subscribers can tell who emitted what.

use tokio::sync::broadcast;

use account_storage_plugin::{Notifier, StorageEvent};

/// Fan-out channel for [`StorageEvent`]s
///
/// Events are not deduplicated, acknowledged or retried. A subscriber that
/// falls more than `capacity` events behind loses the oldest ones.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<StorageEvent>,
}

impl NotificationBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    ///
    /// `capacity` must be non-zero; see [`StorageConfig::validate`](crate::types::StorageConfig::validate).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Start receiving events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.sender.subscribe()
    }

    /// Build the notifier handed to the backend registered at `backend_id`.
    pub fn notifier_for(&self, backend_id: usize, backend: &str) -> Notifier {
        Notifier::new(backend_id, backend, self.sender.clone())
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
