//! Typed lifecycle notifications for UI consumption.
//!
//! Fire-and-forget: emission never blocks and never fails, whether or not
//! anyone is subscribed. A slow subscriber that lags the channel misses
//! events rather than stalling the manager.

use tokio::sync::broadcast;

/// Sized for bursts of status churn; consumers that fall further behind are
/// status displays that only care about the latest state anyway.
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    NetworkStatusChanged { is_online: bool },
    WorkerUpdate,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // An Err here just means nobody is listening right now.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(Event::NetworkStatusChanged { is_online: false });
        bus.emit(Event::WorkerUpdate);

        assert_eq!(
            rx.recv().await.unwrap(),
            Event::NetworkStatusChanged { is_online: false }
        );
        assert_eq!(rx.recv().await.unwrap(), Event::WorkerUpdate);
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(Event::WorkerUpdate);
    }
}
