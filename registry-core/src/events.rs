//! Registry events consumed by external indexers

use crate::types::{Address, Metadata, RecipientId, RequestKind, Timestamp};
use serde::{Deserialize, Serialize};

/// Event emitted by a committed registry transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// Recipient admitted to a slot
    RecipientAdded {
        /// Recipient identifier
        recipient_id: RecipientId,
        /// Payout address
        address: Address,
        /// Recipient metadata
        metadata: Metadata,
        /// Assigned slot index
        index: u64,
        /// Admission time
        time: Timestamp,
    },

    /// Recipient slot tombstoned
    RecipientRemoved {
        /// Recipient identifier
        recipient_id: RecipientId,
        /// Removal time
        time: Timestamp,
    },

    /// Deposit-backed request opened
    RequestSubmitted {
        /// Recipient identifier
        recipient_id: RecipientId,
        /// Registration or removal
        kind: RequestKind,
        /// Recipient address (zero for removals)
        address: Address,
        /// Recipient metadata (empty for removals)
        metadata: Metadata,
        /// Submission time
        time: Timestamp,
    },

    /// Request challenged or executed
    RequestResolved {
        /// Recipient identifier
        recipient_id: RecipientId,
        /// Registration or removal
        kind: RequestKind,
        /// True when the controller challenged the request
        rejected: bool,
        /// Admitted index for executed registrations, 0 otherwise
        index: u64,
        /// Resolution time
        time: Timestamp,
    },
}

impl RegistryEvent {
    /// Recipient the event is about
    pub fn recipient_id(&self) -> &RecipientId {
        match self {
            RegistryEvent::RecipientAdded { recipient_id, .. }
            | RegistryEvent::RecipientRemoved { recipient_id, .. }
            | RegistryEvent::RequestSubmitted { recipient_id, .. }
            | RegistryEvent::RequestResolved { recipient_id, .. } => recipient_id,
        }
    }

    /// Event timestamp
    pub fn time(&self) -> Timestamp {
        match self {
            RegistryEvent::RecipientAdded { time, .. }
            | RegistryEvent::RecipientRemoved { time, .. }
            | RegistryEvent::RequestSubmitted { time, .. }
            | RegistryEvent::RequestResolved { time, .. } => *time,
        }
    }
}

/// Append-only event log owned by a registry
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<RegistryEvent>,
}

impl EventLog {
    /// Create empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub(crate) fn push(&mut self, event: RegistryEvent) {
        self.entries.push(event);
    }

    /// All events, oldest first
    pub fn entries(&self) -> &[RegistryEvent] {
        &self.entries
    }

    /// Events appended at or after `cursor`
    pub fn since(&self, cursor: usize) -> &[RegistryEvent] {
        self.entries.get(cursor..).unwrap_or(&[])
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether any event has been emitted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&RegistryEvent> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_cursor() {
        let mut log = EventLog::new();
        let id = RecipientId::from_bytes([3u8; 32]);
        log.push(RegistryEvent::RecipientRemoved { recipient_id: id, time: 1 });
        log.push(RegistryEvent::RecipientRemoved { recipient_id: id, time: 2 });

        assert_eq!(log.len(), 2);
        assert_eq!(log.since(1).len(), 1);
        assert_eq!(log.since(1)[0].time(), 2);
        assert!(log.since(5).is_empty());
    }
}
