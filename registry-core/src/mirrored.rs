//! Registry mirroring an externally curated list
//!
//! Admission and removal are permissionless, but only ever follow the
//! external list: an item is admitted only while the list holds it and
//! removed only once the list has dropped it. The mirror may lag the list,
//! it never leads it.

use crate::{
    events::{EventLog, RegistryEvent},
    slots::SlotLedger,
    source::RecipientSource,
    types::{Address, Metadata, RecipientId, Timestamp},
    Error, Result,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Externally curated list of recipients
pub trait ExternalList {
    /// Check whether the list currently holds the item
    fn has(&self, item_id: &RecipientId) -> bool;

    /// Raw payload of the item, if the list knows it
    fn data_of(&self, item_id: &RecipientId) -> Option<Vec<u8>>;
}

impl<L: ExternalList + ?Sized> ExternalList for Arc<L> {
    fn has(&self, item_id: &RecipientId) -> bool {
        (**self).has(item_id)
    }

    fn data_of(&self, item_id: &RecipientId) -> Option<Vec<u8>> {
        (**self).data_of(item_id)
    }
}

/// Encode a list row (column values) as an item payload
pub fn encode_row(columns: &[&str]) -> Vec<u8> {
    serde_json::Value::from(columns.to_vec()).to_string().into_bytes()
}

/// Extract the recipient address from an item payload
///
/// Payloads are JSON arrays of column values; `column` selects the one
/// holding the address.
pub fn parse_row_address(payload: &[u8], column: usize) -> Result<Address> {
    let row: Vec<serde_json::Value> = serde_json::from_slice(payload)
        .map_err(|e| Error::InvalidInput(format!("Malformed list item: {}", e)))?;

    let value = row
        .get(column)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            Error::InvalidInput(format!("List item has no address in column {}", column))
        })?;

    value.parse()
}

/// In-memory external list, shareable between its curator and a mirror
#[derive(Debug, Default)]
pub struct MemoryList {
    items: RwLock<HashMap<RecipientId, Vec<u8>>>,
}

impl MemoryList {
    /// Create empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item; its id is the hash of the payload
    pub fn add_item(&self, payload: impl Into<Vec<u8>>) -> RecipientId {
        let payload = payload.into();
        let item_id = RecipientId::of_payload(&payload);
        self.items.write().insert(item_id, payload);
        item_id
    }

    /// Drop an item, returning whether it was present
    pub fn remove_item(&self, item_id: &RecipientId) -> bool {
        self.items.write().remove(item_id).is_some()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check for an empty list
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl ExternalList for MemoryList {
    fn has(&self, item_id: &RecipientId) -> bool {
        self.items.read().contains_key(item_id)
    }

    fn data_of(&self, item_id: &RecipientId) -> Option<Vec<u8>> {
        self.items.read().get(item_id).cloned()
    }
}

/// Registry kept in lockstep with an external list
#[derive(Debug)]
pub struct MirroredRegistry<L> {
    address: Address,

    /// Allowed to raise the recipient limit
    controller: Address,

    list: L,

    /// Column of the item payload holding the recipient address
    address_column: usize,

    ledger: SlotLedger,

    events: EventLog,
}

impl<L: ExternalList> MirroredRegistry<L> {
    /// Create mirror of `list`
    pub fn new(address: Address, controller: Address, list: L, address_column: usize) -> Self {
        Self {
            address,
            controller,
            list,
            address_column,
            ledger: SlotLedger::new(),
            events: EventLog::new(),
        }
    }

    /// Registry identity
    pub fn registry_address(&self) -> Address {
        self.address
    }

    /// Controller identity
    pub fn controller(&self) -> Address {
        self.controller
    }

    /// Mirrored list
    pub fn list(&self) -> &L {
        &self.list
    }

    /// Admit an item the external list currently holds
    pub fn add(&mut self, item_id: RecipientId, now: Timestamp) -> Result<u64> {
        let payload = self
            .list
            .has(&item_id)
            .then(|| self.list.data_of(&item_id))
            .flatten()
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;

        let address = parse_row_address(&payload, self.address_column)?;
        let metadata = Metadata::new(payload);
        let index = self.ledger.add(item_id, address, metadata.clone(), now)?;

        tracing::info!(recipient_id = %item_id, %address, index, "list item mirrored");

        self.events.push(RegistryEvent::RecipientAdded {
            recipient_id: item_id,
            address,
            metadata,
            index,
            time: now,
        });
        Ok(index)
    }

    /// Remove an item the external list has already dropped
    pub fn remove(&mut self, item_id: RecipientId, now: Timestamp) -> Result<()> {
        if self.list.has(&item_id) {
            return Err(Error::ItemNotRemoved(item_id.to_string()));
        }
        self.ledger.remove(&item_id, now)?;

        tracing::info!(recipient_id = %item_id, "list item removal mirrored");

        self.events.push(RegistryEvent::RecipientRemoved {
            recipient_id: item_id,
            time: now,
        });
        Ok(())
    }

    /// Raise the recipient limit
    pub fn set_max_recipients(&mut self, caller: Address, max_recipients: u64) -> Result<()> {
        if caller != self.controller {
            return Err(Error::PermissionDenied(format!(
                "{} is not the controller",
                caller
            )));
        }
        self.ledger.set_max_slots(max_recipients)
    }
}

impl<L: ExternalList> RecipientSource for MirroredRegistry<L> {
    fn ledger(&self) -> &SlotLedger {
        &self.ledger
    }

    fn events(&self) -> &EventLog {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_RECIPIENTS: u64 = 15;

    fn setup() -> (MirroredRegistry<Arc<MemoryList>>, Arc<MemoryList>) {
        let list = Arc::new(MemoryList::new());
        let controller = Address::from_low_u64(0xc0);
        let mut registry =
            MirroredRegistry::new(Address::from_low_u64(0xa2), controller, list.clone(), 1);
        registry
            .set_max_recipients(controller, MAX_RECIPIENTS)
            .unwrap();
        (registry, list)
    }

    fn row(address: &Address) -> Vec<u8> {
        encode_row(&[&format!("test-{}", address), &address.to_string()])
    }

    #[test]
    fn test_anyone_adds_listed_item() {
        let (mut registry, list) = setup();
        let recipient = Address::from_low_u64(7);
        let item_id = list.add_item(row(&recipient));

        assert_eq!(registry.add(item_id, 50).unwrap(), 1);
        assert_eq!(registry.recipient_address(1, 50, 50), recipient);
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RecipientAdded {
                recipient_id: item_id,
                address: recipient,
                metadata: Metadata::new(row(&recipient)),
                index: 1,
                time: 50,
            })
        );

        let another = Address::from_low_u64(8);
        let another_id = list.add_item(row(&another));
        assert_eq!(registry.add(another_id, 51).unwrap(), 2);
    }

    #[test]
    fn test_unlisted_item_rejected() {
        let (mut registry, _list) = setup();
        let item_id = RecipientId::of_payload(&row(&Address::from_low_u64(7)));
        assert!(matches!(registry.add(item_id, 0), Err(Error::ItemNotFound(_))));
    }

    #[test]
    fn test_duplicate_rejected() {
        let (mut registry, list) = setup();
        let item_id = list.add_item(row(&Address::from_low_u64(7)));
        registry.add(item_id, 0).unwrap();
        assert!(matches!(
            registry.add(item_id, 1),
            Err(Error::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let (mut registry, list) = setup();
        let garbage = list.add_item(vec![0xde, 0xad]);
        assert!(matches!(registry.add(garbage, 0), Err(Error::InvalidInput(_))));

        let short_row = list.add_item(encode_row(&["only-a-name"]));
        assert!(matches!(registry.add(short_row, 0), Err(Error::InvalidInput(_))));

        let bad_address = list.add_item(encode_row(&["name", "0x1234"]));
        assert!(matches!(registry.add(bad_address, 0), Err(Error::InvalidInput(_))));
        assert_eq!(registry.recipient_count(), 0);
    }

    #[test]
    fn test_remove_follows_list() {
        let (mut registry, list) = setup();
        let recipient = Address::from_low_u64(7);
        let item_id = list.add_item(row(&recipient));
        registry.add(item_id, 10).unwrap();

        assert!(matches!(
            registry.remove(item_id, 11),
            Err(Error::ItemNotRemoved(_))
        ));

        assert!(list.remove_item(&item_id));
        registry.remove(item_id, 20).unwrap();
        assert_eq!(registry.recipient_address(1, 20, 20), Address::ZERO);
        assert_eq!(registry.recipient_count(), 0);

        assert!(matches!(
            registry.remove(item_id, 21),
            Err(Error::AlreadyRemoved(_))
        ));
    }

    #[test]
    fn test_index_reuse_through_list() {
        let (mut registry, list) = setup();
        let mut ids = Vec::new();
        for n in 1..=MAX_RECIPIENTS {
            let id = list.add_item(row(&Address::from_low_u64(0x1000 + n)));
            registry.add(id, 10).unwrap();
            ids.push(id);
        }

        for id in &ids[..2] {
            list.remove_item(id);
            registry.remove(*id, 20).unwrap();
        }

        let first = list.add_item(row(&Address::from_low_u64(0xaaa1)));
        let second = list.add_item(row(&Address::from_low_u64(0xaaa2)));
        let third = list.add_item(row(&Address::from_low_u64(0xaaa3)));
        assert_eq!(registry.add(first, 30).unwrap(), 1);
        assert_eq!(registry.add(second, 30).unwrap(), 2);
        assert!(matches!(registry.add(third, 30), Err(Error::LimitReached)));

        assert_eq!(registry.recipient_address(1, 15, 30), Address::from_low_u64(0x1001));
        assert_eq!(registry.recipient_address(1, 30, 40), Address::from_low_u64(0xaaa1));
    }

    #[test]
    fn test_only_controller_raises_limit() {
        let (mut registry, _list) = setup();
        assert!(matches!(
            registry.set_max_recipients(Address::from_low_u64(1), 100),
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(registry.max_recipients(), MAX_RECIPIENTS);
    }
}
