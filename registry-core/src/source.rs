//! Read surface shared by every registry variant
//!
//! The funding round only ever sees a `RecipientSource`. Which admission
//! policy sits behind it is decided when the registry is constructed.

use crate::{
    events::EventLog,
    slots::SlotLedger,
    types::{Address, Deposit, Timestamp},
};

/// Recipient source consulted by a funding round at tally time
pub trait RecipientSource {
    /// Read-only view of the underlying slot ledger
    fn ledger(&self) -> &SlotLedger;

    /// Events emitted so far
    fn events(&self) -> &EventLog;

    /// Address at `index` valid for the window `[start, end]`
    ///
    /// Returns the zero address when no tenure overlaps the window.
    fn recipient_address(&self, index: u64, start: Timestamp, end: Timestamp) -> Address {
        self.ledger()
            .get_address(index, start, end)
            .unwrap_or(Address::ZERO)
    }

    /// Number of active recipients
    fn recipient_count(&self) -> u64 {
        self.ledger().count()
    }

    /// Current recipient limit
    fn max_recipients(&self) -> u64 {
        self.ledger().max_slots()
    }

    /// Deposits backing open requests (zero for registries without deposits)
    fn deposits_held(&self) -> Deposit {
        Deposit::ZERO
    }
}

impl<R: RecipientSource + ?Sized> RecipientSource for Box<R> {
    fn ledger(&self) -> &SlotLedger {
        (**self).ledger()
    }

    fn events(&self) -> &EventLog {
        (**self).events()
    }

    fn deposits_held(&self) -> Deposit {
        (**self).deposits_held()
    }
}
