//! Ledger Event Stream
//!
//! Observers subscribe to record changes and busy/quiescent transitions
//! instead of polling a shared flag.

use tokio::sync::broadcast;

use crate::constants::upload::EVENT_CHANNEL_CAPACITY;
use crate::types::{AssetId, AssetRecord, AssetStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A record was added or changed state
    RecordChanged {
        id: AssetId,
        source_handle: String,
        status: AssetStatus,
        committed_ref: Option<String>,
        error: Option<String>,
    },
    /// A record was dropped from the ledger
    RecordRemoved { id: AssetId },
    /// First record went in flight
    Busy { in_flight: usize },
    /// Last in-flight record settled
    Quiescent { committed: usize, failed: usize },
}

impl LedgerEvent {
    pub fn changed(record: &AssetRecord) -> Self {
        Self::RecordChanged {
            id: record.id.clone(),
            source_handle: record.source_handle.clone(),
            status: record.status,
            committed_ref: record.committed_ref.clone(),
            error: record.error.clone(),
        }
    }
}

/// Broadcast sender for ledger events
#[derive(Debug, Clone)]
pub struct LedgerEvents {
    sender: broadcast::Sender<LedgerEvent>,
}

impl Default for LedgerEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send an event through the broadcast channel.
    /// Silently discards if no receivers are listening.
    #[inline]
    pub fn emit(&self, event: LedgerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_receivers_is_silent() {
        let events = LedgerEvents::new();
        events.emit(LedgerEvent::Busy { in_flight: 1 });

        let mut rx = events.subscribe();
        events.emit(LedgerEvent::Quiescent {
            committed: 1,
            failed: 0,
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            LedgerEvent::Quiescent {
                committed: 1,
                failed: 0
            }
        );
    }
}
