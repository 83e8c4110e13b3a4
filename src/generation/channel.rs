//! Progress channel abstraction.
//!
//! The orchestrator only observes a channel: it reads the connected flag
//! and subscribes to the `generation:progress` event. Unsubscribing is
//! dropping the receiver. Events published while nobody is subscribed are
//! lost; there is no replay.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::models::GenerationProgress;

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub trait ProgressChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Watch the connected flag.
    fn connection(&self) -> watch::Receiver<bool>;

    /// Subscribe to `generation:progress`. Drop the receiver to unsubscribe.
    fn subscribe(&self) -> broadcast::Receiver<GenerationProgress>;
}

/// In-process channel: a broadcast of progress events plus a connected flag.
#[derive(Clone)]
pub struct LocalChannel {
    events: broadcast::Sender<GenerationProgress>,
    connected: Arc<watch::Sender<bool>>,
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl LocalChannel {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let (connected, _) = watch::channel(false);
        Self {
            events,
            connected: Arc::new(connected),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.send_replace(connected);
    }

    /// Deliver an event to current subscribers; returns how many received it.
    /// Nothing is delivered while disconnected.
    pub fn publish(&self, event: GenerationProgress) -> usize {
        if !self.is_connected() {
            return 0;
        }
        self.events.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl ProgressChannel for LocalChannel {
    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn connection(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    fn subscribe(&self) -> broadcast::Receiver<GenerationProgress> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::models::GenerationStep;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let channel = LocalChannel::default();
        channel.set_connected(true);
        let mut rx1 = channel.subscribe();
        let mut rx2 = channel.subscribe();

        let event = GenerationProgress::in_progress(GenerationStep::Course, 10, "Course");
        assert_eq!(channel.publish(event.clone()), 2);
        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let channel = LocalChannel::default();
        channel.set_connected(true);
        let event = GenerationProgress::in_progress(GenerationStep::Course, 10, "Course");
        assert_eq!(channel.publish(event), 0);

        let mut late = channel.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnected_channel_delivers_nothing() {
        let channel = LocalChannel::default();
        let mut rx = channel.subscribe();
        assert!(!channel.is_connected());
        assert_eq!(
            channel.publish(GenerationProgress::failed(Some("lost"))),
            0
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connection_watch_sees_changes() {
        let channel = LocalChannel::default();
        let mut connection = channel.connection();
        assert!(!*connection.borrow());

        channel.set_connected(true);
        connection.changed().await.unwrap();
        assert!(*connection.borrow());
        assert!(channel.is_connected());
    }

    #[test]
    fn test_dropping_receiver_unsubscribes() {
        let channel = LocalChannel::default();
        let rx = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);
        drop(rx);
        assert_eq!(channel.subscriber_count(), 0);
    }
}
