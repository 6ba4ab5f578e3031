use tokio::sync::broadcast;
use tracing::debug;

use crate::coordinator::CycleReport;

/// Published once per completed cycle so views can refresh
#[derive(Debug, Clone)]
pub enum CycleEvent {
    Completed(CycleReport),
}

/// Broadcast bus for cycle events; publishing without subscribers is fine
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CycleEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: CycleEvent) {
        let receivers = self.tx.receiver_count();
        debug!(receivers, "Event bus: publishing cycle event");
        // Ignore errors if there are no receivers
        let _ = self.tx.send(event);
    }
}
