//! Controller-gated registry
//!
//! Every mutation requires the caller to be the configured controller.
//! No deposits, no delay.

use crate::{
    events::{EventLog, RegistryEvent},
    slots::SlotLedger,
    source::RecipientSource,
    types::{Address, Metadata, RecipientId, Timestamp},
    Error, Result,
};

/// Registry whose membership is managed by a single controller
#[derive(Debug, Clone)]
pub struct ControlledRegistry {
    /// Identity of this registry instance (salts recipient ids)
    address: Address,

    /// Only identity allowed to mutate
    controller: Address,

    ledger: SlotLedger,

    events: EventLog,
}

impl ControlledRegistry {
    /// Create registry with an unconfigured ledger
    pub fn new(address: Address, controller: Address) -> Self {
        Self {
            address,
            controller,
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

    /// Id this registry assigns to `(address, metadata)`
    pub fn recipient_id(&self, address: &Address, metadata: &Metadata) -> RecipientId {
        RecipientId::derive(&self.address, address, metadata)
    }

    /// Admit a recipient
    pub fn add(
        &mut self,
        caller: Address,
        address: Address,
        metadata: Metadata,
        now: Timestamp,
    ) -> Result<u64> {
        self.ensure_controller(&caller)?;

        let recipient_id = self.recipient_id(&address, &metadata);
        let index = self.ledger.add(recipient_id, address, metadata.clone(), now)?;

        tracing::info!(%recipient_id, %address, index, "recipient added");

        self.events.push(RegistryEvent::RecipientAdded {
            recipient_id,
            address,
            metadata,
            index,
            time: now,
        });
        Ok(index)
    }

    /// Tombstone a recipient
    pub fn remove(&mut self, caller: Address, recipient_id: RecipientId, now: Timestamp) -> Result<()> {
        self.ensure_controller(&caller)?;
        self.ledger.remove(&recipient_id, now)?;

        tracing::info!(%recipient_id, "recipient removed");

        self.events.push(RegistryEvent::RecipientRemoved {
            recipient_id,
            time: now,
        });
        Ok(())
    }

    /// Raise the recipient limit
    pub fn set_max_recipients(&mut self, caller: Address, max_recipients: u64) -> Result<()> {
        self.ensure_controller(&caller)?;
        self.ledger.set_max_slots(max_recipients)?;
        tracing::info!(max_recipients, "recipient limit raised");
        Ok(())
    }

    fn ensure_controller(&self, caller: &Address) -> Result<()> {
        if *caller != self.controller {
            return Err(Error::PermissionDenied(format!(
                "{} is not the controller",
                caller
            )));
        }
        Ok(())
    }
}

impl RecipientSource for ControlledRegistry {
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

    fn setup() -> (ControlledRegistry, Address) {
        let controller = Address::from_low_u64(0xc0);
        let mut registry = ControlledRegistry::new(Address::from_low_u64(0xa1), controller);
        registry
            .set_max_recipients(controller, MAX_RECIPIENTS)
            .unwrap();
        (registry, controller)
    }

    fn metadata() -> Metadata {
        Metadata::from(r#"{"name":"Recipient","description":"Description","imageHash":"Ipfs imageHash"}"#)
    }

    #[test]
    fn test_initial_state() {
        let registry = ControlledRegistry::new(Address::from_low_u64(1), Address::from_low_u64(2));
        assert_eq!(registry.controller(), Address::from_low_u64(2));
        assert_eq!(registry.max_recipients(), 0);
        assert_eq!(registry.recipient_count(), 0);
    }

    #[test]
    fn test_add_emits_event_and_resolves_address() {
        let (mut registry, controller) = setup();
        let recipient = Address::from_low_u64(7);

        let index = registry.add(controller, recipient, metadata(), 100).unwrap();
        assert_eq!(index, 1);
        assert_eq!(registry.recipient_address(1, 100, 100), recipient);

        let expected_id = registry.recipient_id(&recipient, &metadata());
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RecipientAdded {
                recipient_id: expected_id,
                address: recipient,
                metadata: metadata(),
                index: 1,
                time: 100,
            })
        );

        let another = Address::from_low_u64(8);
        assert_eq!(registry.add(controller, another, metadata(), 101).unwrap(), 2);
    }

    #[test]
    fn test_only_controller_mutates() {
        let (mut registry, controller) = setup();
        let stranger = Address::from_low_u64(0xbad);
        let recipient = Address::from_low_u64(7);

        assert!(matches!(
            registry.add(stranger, recipient, metadata(), 0),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            registry.set_max_recipients(stranger, 100),
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(registry.max_recipients(), MAX_RECIPIENTS);

        registry.add(controller, recipient, metadata(), 0).unwrap();
        let id = registry.recipient_id(&recipient, &metadata());
        assert!(matches!(
            registry.remove(stranger, id, 1),
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(registry.recipient_count(), 1);
        assert_eq!(registry.events().len(), 1);
    }

    #[test]
    fn test_remove_tombstones_slot() {
        let (mut registry, controller) = setup();
        let recipient = Address::from_low_u64(7);
        registry.add(controller, recipient, metadata(), 10).unwrap();
        let id = registry.recipient_id(&recipient, &metadata());

        registry.remove(controller, id, 20).unwrap();
        assert_eq!(registry.recipient_address(1, 20, 20), Address::ZERO);
        assert_eq!(registry.recipient_address(1, 10, 30), recipient);
        assert_eq!(registry.recipient_count(), 0);
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RecipientRemoved { recipient_id: id, time: 20 })
        );

        assert!(matches!(
            registry.remove(controller, id, 21),
            Err(Error::AlreadyRemoved(_))
        ));
        assert!(matches!(
            registry.remove(controller, RecipientId::from_bytes([0u8; 32]), 21),
            Err(Error::NotRegistered(_))
        ));
    }

    #[test]
    fn test_add_without_limit_fails() {
        let controller = Address::from_low_u64(0xc0);
        let mut registry = ControlledRegistry::new(Address::from_low_u64(0xa1), controller);
        let result = registry.add(controller, Address::from_low_u64(7), metadata(), 0);
        assert!(result.unwrap_err().to_string().contains("limit is not set"));
    }

    #[test]
    fn test_limit_decrease_rejected() {
        let (mut registry, controller) = setup();
        assert!(matches!(
            registry.set_max_recipients(controller, 1),
            Err(Error::LimitDecreaseRejected)
        ));
    }
}
