//! Slot ledger: vote-option indices mapped to recipients over time
//!
//! # Model
//!
//! Every index in `1..=max_slots` owns a history of tenures, oldest first.
//! Removal tombstones the current tenure (sets `removed_at`) and marks the
//! index vacant; the next admission takes the lowest vacant index and appends
//! a new tenure to its history. Nothing is ever deleted, so a query for a past
//! window keeps returning the same answer after later mutations.
//!
//! # Invariants
//!
//! - At most one active tenure per recipient id
//! - `max_slots` never decreases
//! - `active_count == number of tenures with removed_at unset`
//! - Vacant indices are exactly the allocated indices whose latest tenure is tombstoned

use crate::{
    types::{Address, Metadata, RecipientId, RecipientSlot, Timestamp},
    Error, Result,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Position of a tenure: slot index plus offset into that slot's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotRef {
    index: u64,
    tenure: usize,
}

/// Inverse of a successful mutation, applied when a later step of the same
/// transaction fails
#[derive(Debug, Clone)]
pub(crate) enum LedgerUndo {
    Added {
        recipient_id: RecipientId,
        index: u64,
        previous: Option<SlotRef>,
        reused: bool,
    },
    Removed {
        slot: SlotRef,
    },
}

/// Slot ledger shared by every registry variant
#[derive(Debug, Clone, Default)]
pub struct SlotLedger {
    max_slots: u64,
    slots: BTreeMap<u64, Vec<RecipientSlot>>,
    recipients: HashMap<RecipientId, SlotRef>,
    vacant: BTreeSet<u64>,
    active: u64,
}

/// Reject the null address and empty metadata
pub(crate) fn validate_recipient(address: &Address, metadata: &Metadata) -> Result<()> {
    if address.is_zero() {
        return Err(Error::InvalidInput("Recipient address is zero".to_string()));
    }
    if metadata.is_empty() {
        return Err(Error::InvalidInput("Metadata info is empty string".to_string()));
    }
    Ok(())
}

impl SlotLedger {
    /// Create an unconfigured ledger (`max_slots == 0`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger with an initial capacity
    pub fn with_capacity(max_slots: u64) -> Self {
        Self {
            max_slots,
            ..Self::default()
        }
    }

    /// Admit a recipient, returning the assigned index
    pub fn add(
        &mut self,
        recipient_id: RecipientId,
        address: Address,
        metadata: Metadata,
        now: Timestamp,
    ) -> Result<u64> {
        self.add_undoable(recipient_id, address, metadata, now)
            .map(|(index, _)| index)
    }

    pub(crate) fn add_undoable(
        &mut self,
        recipient_id: RecipientId,
        address: Address,
        metadata: Metadata,
        now: Timestamp,
    ) -> Result<(u64, LedgerUndo)> {
        if self.max_slots == 0 {
            return Err(Error::NotConfigured);
        }
        if self.active >= self.max_slots {
            return Err(Error::LimitReached);
        }
        if self.is_active(&recipient_id) {
            return Err(Error::AlreadyRegistered(recipient_id.to_string()));
        }
        validate_recipient(&address, &metadata)?;

        // A vacated index is always below the high-water mark
        let (index, reused) = match self.vacant.pop_first() {
            Some(index) => (index, true),
            None => (self.slots.len() as u64 + 1, false),
        };

        let history = self.slots.entry(index).or_default();
        history.push(RecipientSlot {
            index,
            recipient_id,
            address,
            metadata,
            registered_at: now,
            removed_at: None,
        });
        let slot = SlotRef {
            index,
            tenure: history.len() - 1,
        };

        let previous = self.recipients.insert(recipient_id, slot);
        self.active += 1;

        tracing::debug!(%recipient_id, index, reused, "slot assigned");

        Ok((
            index,
            LedgerUndo::Added {
                recipient_id,
                index,
                previous,
                reused,
            },
        ))
    }

    /// Tombstone a recipient's active tenure
    pub fn remove(&mut self, recipient_id: &RecipientId, now: Timestamp) -> Result<()> {
        self.remove_undoable(recipient_id, now).map(|_| ())
    }

    pub(crate) fn remove_undoable(
        &mut self,
        recipient_id: &RecipientId,
        now: Timestamp,
    ) -> Result<LedgerUndo> {
        let slot = self
            .recipients
            .get(recipient_id)
            .copied()
            .ok_or_else(|| Error::NotRegistered(recipient_id.to_string()))?;

        let tenure = self
            .tenure_mut(slot)
            .ok_or_else(|| Error::NotRegistered(recipient_id.to_string()))?;
        if tenure.removed_at.is_some() {
            return Err(Error::AlreadyRemoved(recipient_id.to_string()));
        }
        tenure.removed_at = Some(now);

        self.active -= 1;
        self.vacant.insert(slot.index);

        tracing::debug!(%recipient_id, index = slot.index, "slot vacated");

        Ok(LedgerUndo::Removed { slot })
    }

    /// Revert a mutation made earlier in the current transaction
    pub(crate) fn rollback(&mut self, undo: LedgerUndo) {
        match undo {
            LedgerUndo::Added {
                recipient_id,
                index,
                previous,
                reused,
            } => {
                if let Some(history) = self.slots.get_mut(&index) {
                    history.pop();
                }
                if reused {
                    self.vacant.insert(index);
                } else {
                    self.slots.remove(&index);
                }
                match previous {
                    Some(slot) => self.recipients.insert(recipient_id, slot),
                    None => self.recipients.remove(&recipient_id),
                };
                self.active -= 1;
            }
            LedgerUndo::Removed { slot } => {
                if let Some(tenure) = self.tenure_mut(slot) {
                    tenure.removed_at = None;
                }
                self.vacant.remove(&slot.index);
                self.active += 1;
            }
        }
    }

    /// Address valid at `index` for the window `[start, end]`
    ///
    /// Tenures are kept in admission order, so the first one overlapping the
    /// window is the oldest.
    pub fn get_address(&self, index: u64, start: Timestamp, end: Timestamp) -> Option<Address> {
        self.slots
            .get(&index)?
            .iter()
            .find(|tenure| tenure.overlaps(start, end))
            .map(|tenure| tenure.address)
    }

    /// Raise the recipient limit
    pub fn set_max_slots(&mut self, max_slots: u64) -> Result<()> {
        if max_slots <= self.max_slots {
            return Err(Error::LimitDecreaseRejected);
        }
        self.max_slots = max_slots;
        Ok(())
    }

    /// Number of active recipients
    pub fn count(&self) -> u64 {
        self.active
    }

    /// Current recipient limit
    pub fn max_slots(&self) -> u64 {
        self.max_slots
    }

    /// Check whether a recipient holds an active slot
    pub fn is_active(&self, recipient_id: &RecipientId) -> bool {
        self.recipient(recipient_id)
            .map_or(false, RecipientSlot::is_active)
    }

    /// Latest tenure of a recipient (active or tombstoned)
    pub fn recipient(&self, recipient_id: &RecipientId) -> Option<&RecipientSlot> {
        let slot = self.recipients.get(recipient_id)?;
        self.slots.get(&slot.index)?.get(slot.tenure)
    }

    /// Active tenure of a recipient, or the reason there is none
    pub fn require_active(&self, recipient_id: &RecipientId) -> Result<&RecipientSlot> {
        match self.recipient(recipient_id) {
            None => Err(Error::NotRegistered(recipient_id.to_string())),
            Some(slot) if !slot.is_active() => Err(Error::AlreadyRemoved(recipient_id.to_string())),
            Some(slot) => Ok(slot),
        }
    }

    /// Every tenure of an index, oldest first
    pub fn history(&self, index: u64) -> &[RecipientSlot] {
        self.slots.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest index ever allocated
    pub fn high_water_mark(&self) -> u64 {
        self.slots.len() as u64
    }

    fn tenure_mut(&mut self, slot: SlotRef) -> Option<&mut RecipientSlot> {
        self.slots.get_mut(&slot.index)?.get_mut(slot.tenure)
    }
}
