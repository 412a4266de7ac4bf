//! Deposit-backed registry with optimistic admission
//!
//! Anyone may submit a registration or removal request by posting the base
//! deposit. The controller acts as arbiter: it can challenge a request, which
//! pays the deposit to a beneficiary of its choice and discards the request,
//! or fast-track it by executing immediately. Once the challenge period has
//! elapsed anyone may execute; execution applies the change to the slot
//! ledger and refunds the submitter.
//!
//! # Request lifecycle
//!
//! ```text
//!            submit_*              execute
//!   None ──────────────▶ Pending ──────────▶ Executed ─┐
//!     ▲                     │                          │
//!     │                     │ challenge                │
//!     │                     ▼                          │
//!     └──────────────── Rejected ◀─────────────────────┘
//!                     (record deleted)
//! ```
//!
//! # Resolution ordering
//!
//! 1. **Check**: request exists, caller may resolve it
//! 2. **Effects**: request taken out of the pending set, ledger mutated
//! 3. **Interaction**: deposit transferred
//!
//! A failed step rolls back the earlier ones, leaving the request pending.
//!
//! # Invariants
//!
//! - At most one pending request per recipient id
//! - Deposits received == bounties + refunds + deposits still pending

use crate::{
    events::{EventLog, RegistryEvent},
    slots::{validate_recipient, SlotLedger},
    source::RecipientSource,
    transfer::ValueTransfer,
    types::{Address, Deposit, Metadata, PendingRequest, RecipientId, RequestKind, Timestamp},
    Error, Result,
};
use std::collections::HashMap;

/// Deposit accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepositBook {
    /// Total deposits posted with accepted submissions
    pub received: Deposit,

    /// Paid to challenge beneficiaries
    pub bounties: Deposit,

    /// Returned to submitters on execution
    pub refunds: Deposit,
}

impl DepositBook {
    /// Total paid out
    pub fn paid_out(&self) -> Deposit {
        self.bounties + self.refunds
    }
}

/// Registry governed by deposits and a single arbiter
#[derive(Debug)]
pub struct ChallengeRegistry<T> {
    address: Address,

    /// Arbiter: challenges, fast-tracks and configures
    controller: Address,

    base_deposit: Deposit,

    /// Seconds a request must wait before anyone may execute it
    challenge_period: u64,

    ledger: SlotLedger,

    pending: HashMap<RecipientId, PendingRequest>,

    transfer: T,

    book: DepositBook,

    events: EventLog,
}

impl<T: ValueTransfer> ChallengeRegistry<T> {
    /// Create registry with an unconfigured ledger
    pub fn new(
        address: Address,
        controller: Address,
        base_deposit: Deposit,
        challenge_period: u64,
        transfer: T,
    ) -> Self {
        Self {
            address,
            controller,
            base_deposit,
            challenge_period,
            ledger: SlotLedger::new(),
            pending: HashMap::new(),
            transfer,
            book: DepositBook::default(),
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

    /// Deposit required for new submissions
    pub fn base_deposit(&self) -> Deposit {
        self.base_deposit
    }

    /// Challenge period applied to new submissions (seconds)
    pub fn challenge_period_duration(&self) -> u64 {
        self.challenge_period
    }

    /// Id this registry assigns to `(address, metadata)`
    pub fn recipient_id(&self, address: &Address, metadata: &Metadata) -> RecipientId {
        RecipientId::derive(&self.address, address, metadata)
    }

    /// Open request for a recipient
    pub fn pending_request(&self, recipient_id: &RecipientId) -> Option<&PendingRequest> {
        self.pending.get(recipient_id)
    }

    /// Number of open requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Deposit accounting so far
    pub fn deposit_book(&self) -> DepositBook {
        self.book
    }

    /// Sum of deposits backing open requests
    pub fn deposits_held(&self) -> Deposit {
        self.pending.values().map(|request| request.deposit).sum()
    }

    /// Verify that every received deposit is either paid out or still held
    pub fn check_deposit_conservation(&self) -> bool {
        self.book.received == self.book.paid_out() + self.deposits_held()
    }

    /// Transfer collaborator
    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    /// Transfer collaborator (mutable)
    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }

    /// Submit a registration request
    pub fn submit_registration(
        &mut self,
        submitter: Address,
        address: Address,
        metadata: Metadata,
        deposit: Deposit,
        now: Timestamp,
    ) -> Result<RecipientId> {
        validate_recipient(&address, &metadata)?;
        self.ensure_deposit(deposit)?;

        let recipient_id = self.recipient_id(&address, &metadata);
        self.ensure_no_pending(&recipient_id)?;
        if self.ledger.is_active(&recipient_id) {
            return Err(Error::AlreadyRegistered(recipient_id.to_string()));
        }

        self.open_request(PendingRequest {
            recipient_id,
            kind: RequestKind::Registration,
            address,
            metadata,
            deposit,
            submitter,
            submitted_at: now,
            deadline: now.saturating_add(self.challenge_period),
        });
        Ok(recipient_id)
    }

    /// Submit a removal request for an active recipient
    pub fn submit_removal(
        &mut self,
        submitter: Address,
        recipient_id: RecipientId,
        deposit: Deposit,
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_deposit(deposit)?;
        self.ensure_no_pending(&recipient_id)?;
        self.ledger.require_active(&recipient_id)?;

        self.open_request(PendingRequest {
            recipient_id,
            kind: RequestKind::Removal,
            address: Address::ZERO,
            metadata: Metadata::default(),
            deposit,
            submitter,
            submitted_at: now,
            deadline: now.saturating_add(self.challenge_period),
        });
        Ok(())
    }

    /// Reject a pending request, paying its deposit to `beneficiary`
    pub fn challenge(
        &mut self,
        caller: Address,
        recipient_id: RecipientId,
        beneficiary: Address,
        now: Timestamp,
    ) -> Result<()> {
        self.ensure_controller(&caller)?;
        if beneficiary.is_zero() {
            return Err(Error::InvalidInput("Beneficiary address is zero".to_string()));
        }

        let request = self
            .pending
            .remove(&recipient_id)
            .ok_or_else(|| Error::RequestNotFound(recipient_id.to_string()))?;

        if let Err(e) = self.transfer.transfer(&beneficiary, request.deposit) {
            tracing::warn!(%recipient_id, %beneficiary, "bounty transfer failed, request kept: {}", e);
            self.pending.insert(recipient_id, request);
            return Err(e);
        }
        self.book.bounties += request.deposit;

        tracing::info!(
            %recipient_id,
            kind = %request.kind,
            %beneficiary,
            deposit = %request.deposit,
            "request rejected"
        );

        self.events.push(RegistryEvent::RequestResolved {
            recipient_id,
            kind: request.kind,
            rejected: true,
            index: 0,
            time: now,
        });
        Ok(())
    }

    /// Apply a pending request and refund its submitter
    ///
    /// The controller may execute at any time; anyone else only once the
    /// challenge period recorded at submission has elapsed. Returns the
    /// admitted index for registrations and 0 for removals.
    pub fn execute(&mut self, caller: Address, recipient_id: RecipientId, now: Timestamp) -> Result<u64> {
        let request = self
            .pending
            .get(&recipient_id)
            .ok_or_else(|| Error::RequestNotFound(recipient_id.to_string()))?;

        if caller != self.controller && !request.is_executable_by_anyone(now) {
            return Err(Error::ChallengePeriodNotOver {
                deadline: request.deadline,
            });
        }

        let request = self
            .pending
            .remove(&recipient_id)
            .ok_or_else(|| Error::RequestNotFound(recipient_id.to_string()))?;

        let applied = match request.kind {
            RequestKind::Registration => self
                .ledger
                .add_undoable(recipient_id, request.address, request.metadata.clone(), now),
            RequestKind::Removal => self
                .ledger
                .remove_undoable(&recipient_id, now)
                .map(|undo| (0, undo)),
        };

        let (index, undo) = match applied {
            Ok(applied) => applied,
            Err(e) => {
                tracing::warn!(%recipient_id, kind = %request.kind, "execution blocked, request kept: {}", e);
                self.pending.insert(recipient_id, request);
                return Err(e);
            }
        };

        if let Err(e) = self.transfer.transfer(&request.submitter, request.deposit) {
            tracing::warn!(%recipient_id, submitter = %request.submitter, "refund failed, execution rolled back: {}", e);
            self.ledger.rollback(undo);
            self.pending.insert(recipient_id, request);
            return Err(e);
        }
        self.book.refunds += request.deposit;

        tracing::info!(%recipient_id, kind = %request.kind, index, "request executed");

        match request.kind {
            RequestKind::Registration => self.events.push(RegistryEvent::RecipientAdded {
                recipient_id,
                address: request.address,
                metadata: request.metadata,
                index,
                time: now,
            }),
            RequestKind::Removal => self.events.push(RegistryEvent::RecipientRemoved {
                recipient_id,
                time: now,
            }),
        }
        self.events.push(RegistryEvent::RequestResolved {
            recipient_id,
            kind: request.kind,
            rejected: false,
            index,
            time: now,
        });
        Ok(index)
    }

    /// Change the deposit required for later submissions
    pub fn set_base_deposit(&mut self, caller: Address, amount: Deposit) -> Result<()> {
        self.ensure_controller(&caller)?;
        if amount.is_sign_negative() {
            return Err(Error::InvalidInput(format!("negative deposit: {}", amount)));
        }
        self.base_deposit = amount;
        tracing::info!(base_deposit = %amount, "base deposit changed");
        Ok(())
    }

    /// Change the challenge period for later submissions
    pub fn set_challenge_period_duration(&mut self, caller: Address, seconds: u64) -> Result<()> {
        self.ensure_controller(&caller)?;
        self.challenge_period = seconds;
        tracing::info!(challenge_period = seconds, "challenge period changed");
        Ok(())
    }

    /// Raise the recipient limit
    pub fn set_max_recipients(&mut self, caller: Address, max_recipients: u64) -> Result<()> {
        self.ensure_controller(&caller)?;
        self.ledger.set_max_slots(max_recipients)
    }

    fn open_request(&mut self, request: PendingRequest) {
        self.book.received += request.deposit;

        tracing::debug!(
            recipient_id = %request.recipient_id,
            kind = %request.kind,
            submitter = %request.submitter,
            deadline = request.deadline,
            "request submitted"
        );

        self.events.push(RegistryEvent::RequestSubmitted {
            recipient_id: request.recipient_id,
            kind: request.kind,
            address: request.address,
            metadata: request.metadata.clone(),
            time: request.submitted_at,
        });
        self.pending.insert(request.recipient_id, request);
    }

    fn ensure_deposit(&self, deposit: Deposit) -> Result<()> {
        if deposit != self.base_deposit {
            return Err(Error::IncorrectDeposit {
                expected: self.base_deposit,
                actual: deposit,
            });
        }
        Ok(())
    }

    fn ensure_no_pending(&self, recipient_id: &RecipientId) -> Result<()> {
        if self.pending.contains_key(recipient_id) {
            return Err(Error::RequestAlreadyPending(recipient_id.to_string()));
        }
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

impl<T: ValueTransfer> RecipientSource for ChallengeRegistry<T> {
    fn ledger(&self) -> &SlotLedger {
        &self.ledger
    }

    fn events(&self) -> &EventLog {
        &self.events
    }

    fn deposits_held(&self) -> Deposit {
        ChallengeRegistry::deposits_held(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::Vault;

    const MAX_RECIPIENTS: u64 = 15;
    const CHALLENGE_PERIOD: u64 = 86_400;
    const T0: Timestamp = 1_700_000_000;

    fn base_deposit() -> Deposit {
        Deposit::new(1, 1) // 0.1
    }

    fn controller() -> Address {
        Address::from_low_u64(0xc0)
    }

    fn requester() -> Address {
        Address::from_low_u64(0x5e)
    }

    fn metadata() -> Metadata {
        Metadata::from(r#"{"name":"Recipient","description":"Description","imageHash":"Ipfs imageHash"}"#)
    }

    fn setup() -> ChallengeRegistry<Vault> {
        let mut registry = ChallengeRegistry::new(
            Address::from_low_u64(0xa3),
            controller(),
            base_deposit(),
            CHALLENGE_PERIOD,
            Vault::new(),
        );
        registry
            .set_max_recipients(controller(), MAX_RECIPIENTS)
            .unwrap();
        registry
    }

    /// Submit and execute a registration after the challenge period
    fn register(registry: &mut ChallengeRegistry<Vault>, address: Address, now: Timestamp) -> RecipientId {
        let id = registry
            .submit_registration(requester(), address, metadata(), base_deposit(), now)
            .unwrap();
        registry
            .execute(requester(), id, now + CHALLENGE_PERIOD)
            .unwrap();
        id
    }

    #[test]
    fn test_initial_state() {
        let registry = setup();
        assert_eq!(registry.base_deposit(), base_deposit());
        assert_eq!(registry.challenge_period_duration(), CHALLENGE_PERIOD);
        assert_eq!(registry.controller(), controller());
        assert_eq!(registry.recipient_count(), 0);
    }

    #[test]
    fn test_submit_registration_opens_request() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);

        let id = registry
            .submit_registration(requester(), recipient, metadata(), base_deposit(), T0)
            .unwrap();

        assert_eq!(id, registry.recipient_id(&recipient, &metadata()));
        let request = registry.pending_request(&id).unwrap();
        assert_eq!(request.kind, RequestKind::Registration);
        assert_eq!(request.deadline, T0 + CHALLENGE_PERIOD);
        assert_eq!(registry.deposits_held(), base_deposit());
        assert_eq!(registry.recipient_count(), 0);
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RequestSubmitted {
                recipient_id: id,
                kind: RequestKind::Registration,
                address: recipient,
                metadata: metadata(),
                time: T0,
            })
        );
    }

    #[test]
    fn test_submit_registration_rejections() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);

        assert!(matches!(
            registry.submit_registration(requester(), Address::ZERO, metadata(), base_deposit(), T0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            registry.submit_registration(requester(), recipient, Metadata::default(), base_deposit(), T0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            registry.submit_registration(requester(), recipient, metadata(), base_deposit() / Deposit::TWO, T0),
            Err(Error::IncorrectDeposit { .. })
        ));

        registry
            .submit_registration(requester(), recipient, metadata(), base_deposit(), T0)
            .unwrap();
        assert!(matches!(
            registry.submit_registration(requester(), recipient, metadata(), base_deposit(), T0),
            Err(Error::RequestAlreadyPending(_))
        ));

        let id = registry.recipient_id(&recipient, &metadata());
        registry.execute(controller(), id, T0).unwrap();
        assert!(matches!(
            registry.submit_registration(requester(), recipient, metadata(), base_deposit(), T0 + 1),
            Err(Error::AlreadyRegistered(_))
        ));
        assert!(registry.check_deposit_conservation());
    }

    #[test]
    fn test_challenge_pays_beneficiary() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);
        let id = registry
            .submit_registration(requester(), recipient, metadata(), base_deposit(), T0)
            .unwrap();

        registry.challenge(controller(), id, controller(), T0 + 10).unwrap();

        assert_eq!(registry.transfer().balance_of(&controller()), base_deposit());
        assert!(registry.pending_request(&id).is_none());
        assert_eq!(registry.recipient_count(), 0);
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RequestResolved {
                recipient_id: id,
                kind: RequestKind::Registration,
                rejected: true,
                index: 0,
                time: T0 + 10,
            })
        );

        assert!(matches!(
            registry.challenge(controller(), id, requester(), T0 + 11),
            Err(Error::RequestNotFound(_))
        ));
    }

    #[test]
    fn test_only_controller_challenges() {
        let mut registry = setup();
        let id = registry
            .submit_registration(requester(), Address::from_low_u64(7), metadata(), base_deposit(), T0)
            .unwrap();

        assert!(matches!(
            registry.challenge(requester(), id, requester(), T0),
            Err(Error::PermissionDenied(_))
        ));
        assert!(registry.pending_request(&id).is_some());
    }

    #[test]
    fn test_execute_after_challenge_period() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);
        let id = registry
            .submit_registration(requester(), recipient, metadata(), base_deposit(), T0)
            .unwrap();

        assert!(matches!(
            registry.execute(requester(), id, T0 + CHALLENGE_PERIOD - 1),
            Err(Error::ChallengePeriodNotOver { deadline }) if deadline == T0 + CHALLENGE_PERIOD
        ));

        let now = T0 + CHALLENGE_PERIOD;
        assert_eq!(registry.execute(requester(), id, now).unwrap(), 1);
        assert_eq!(registry.transfer().balance_of(&requester()), base_deposit());
        assert_eq!(registry.recipient_address(1, now, now), recipient);
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RequestResolved {
                recipient_id: id,
                kind: RequestKind::Registration,
                rejected: false,
                index: 1,
                time: now,
            })
        );
        assert!(matches!(
            registry.execute(requester(), id, now),
            Err(Error::RequestNotFound(_))
        ));
    }

    #[test]
    fn test_controller_fast_tracks() {
        let mut registry = setup();
        let id = registry
            .submit_registration(requester(), Address::from_low_u64(7), metadata(), base_deposit(), T0)
            .unwrap();
        assert_eq!(registry.recipient_count(), 0);

        registry.execute(controller(), id, T0).unwrap();
        assert_eq!(registry.recipient_count(), 1);
    }

    #[test]
    fn test_deposit_snapshot_survives_base_change() {
        let mut registry = setup();
        let id = registry
            .submit_registration(requester(), Address::from_low_u64(7), metadata(), base_deposit(), T0)
            .unwrap();

        registry
            .set_base_deposit(controller(), base_deposit() * Deposit::TWO)
            .unwrap();
        registry.execute(requester(), id, T0 + CHALLENGE_PERIOD).unwrap();

        assert_eq!(registry.transfer().balance_of(&requester()), base_deposit());
        assert!(registry.check_deposit_conservation());
    }

    #[test]
    fn test_challenge_period_snapshot() {
        let mut registry = setup();
        let id = registry
            .submit_registration(requester(), Address::from_low_u64(7), metadata(), base_deposit(), T0)
            .unwrap();

        registry
            .set_challenge_period_duration(controller(), CHALLENGE_PERIOD * 2)
            .unwrap();
        registry.execute(requester(), id, T0 + CHALLENGE_PERIOD).unwrap();

        let later = registry
            .submit_registration(requester(), Address::from_low_u64(8), metadata(), base_deposit(), T0)
            .unwrap();
        assert!(matches!(
            registry.execute(requester(), later, T0 + CHALLENGE_PERIOD),
            Err(Error::ChallengePeriodNotOver { .. })
        ));
    }

    #[test]
    fn test_configuration_requires_controller() {
        let mut registry = setup();
        assert!(matches!(
            registry.set_base_deposit(requester(), Deposit::ONE),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            registry.set_challenge_period_duration(requester(), 1),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            registry.set_max_recipients(requester(), 100),
            Err(Error::PermissionDenied(_))
        ));
        assert!(matches!(
            registry.set_base_deposit(controller(), -Deposit::ONE),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(registry.base_deposit(), base_deposit());
    }

    #[test]
    fn test_removal_request_lifecycle() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);
        let id = register(&mut registry, recipient, T0);
        let now = T0 + CHALLENGE_PERIOD;

        registry
            .submit_removal(requester(), id, base_deposit(), now)
            .unwrap();
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RequestSubmitted {
                recipient_id: id,
                kind: RequestKind::Removal,
                address: Address::ZERO,
                metadata: Metadata::default(),
                time: now,
            })
        );
        assert!(matches!(
            registry.submit_removal(requester(), id, base_deposit(), now),
            Err(Error::RequestAlreadyPending(_))
        ));
        assert!(matches!(
            registry.execute(requester(), id, now + 1),
            Err(Error::ChallengePeriodNotOver { .. })
        ));

        let removed_at = now + CHALLENGE_PERIOD;
        assert_eq!(registry.execute(requester(), id, removed_at).unwrap(), 0);
        assert_eq!(registry.recipient_address(1, removed_at, removed_at), Address::ZERO);
        assert_eq!(registry.recipient_count(), 0);

        assert!(matches!(
            registry.submit_removal(requester(), id, base_deposit(), removed_at),
            Err(Error::AlreadyRemoved(_))
        ));
        assert!(matches!(
            registry.submit_removal(requester(), RecipientId::from_bytes([9u8; 32]), base_deposit(), removed_at),
            Err(Error::NotRegistered(_))
        ));
    }

    #[test]
    fn test_challenged_removal_keeps_recipient() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);
        let id = register(&mut registry, recipient, T0);
        let now = T0 + CHALLENGE_PERIOD;

        registry
            .submit_removal(requester(), id, base_deposit(), now)
            .unwrap();
        registry.challenge(controller(), id, requester(), now + 1).unwrap();

        assert_eq!(registry.recipient_address(1, now + 1, now + 1), recipient);
        assert_eq!(
            registry.events().last(),
            Some(&RegistryEvent::RequestResolved {
                recipient_id: id,
                kind: RequestKind::Removal,
                rejected: true,
                index: 0,
                time: now + 1,
            })
        );
    }

    #[test]
    fn test_execution_blocked_by_capacity_stays_pending() {
        let mut registry = setup();
        let mut ids = Vec::new();
        for n in 1..=MAX_RECIPIENTS {
            ids.push(register(&mut registry, Address::from_low_u64(n), T0));
        }

        let now = T0 + CHALLENGE_PERIOD;
        let late = registry
            .submit_registration(requester(), Address::from_low_u64(0x100), metadata(), base_deposit(), now)
            .unwrap();
        let executable_at = now + CHALLENGE_PERIOD;
        assert!(matches!(
            registry.execute(requester(), late, executable_at),
            Err(Error::LimitReached)
        ));
        assert!(registry.pending_request(&late).is_some());
        assert_eq!(registry.transfer().balance_of(&requester()), base_deposit() * Deposit::from(MAX_RECIPIENTS));
        assert!(registry.check_deposit_conservation());

        // Capacity freed by an executed removal lets the retry through
        registry
            .submit_removal(requester(), ids[0], base_deposit(), executable_at)
            .unwrap();
        registry.execute(controller(), ids[0], executable_at).unwrap();
        assert_eq!(registry.execute(requester(), late, executable_at + 1).unwrap(), 1);
        assert_eq!(registry.pending_count(), 0);
        assert!(registry.check_deposit_conservation());
    }

    #[test]
    fn test_execution_blocked_request_can_be_challenged() {
        let mut registry = setup();
        for n in 1..=MAX_RECIPIENTS {
            register(&mut registry, Address::from_low_u64(n), T0);
        }

        let now = T0 + CHALLENGE_PERIOD;
        let late = registry
            .submit_registration(requester(), Address::from_low_u64(0x100), metadata(), base_deposit(), now)
            .unwrap();
        assert!(registry.execute(controller(), late, now).is_err());

        registry.challenge(controller(), late, controller(), now).unwrap();
        assert_eq!(registry.pending_count(), 0);
        assert_eq!(registry.transfer().balance_of(&controller()), base_deposit());
        assert!(registry.check_deposit_conservation());
    }

    #[test]
    fn test_rejected_refund_rolls_back_execution() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);
        let id = registry
            .submit_registration(requester(), recipient, metadata(), base_deposit(), T0)
            .unwrap();
        let events_before = registry.events().len();

        registry.transfer_mut().reject(requester());
        let now = T0 + CHALLENGE_PERIOD;
        assert!(matches!(
            registry.execute(requester(), id, now),
            Err(Error::TransferFailed(_))
        ));
        assert_eq!(registry.recipient_count(), 0);
        assert_eq!(registry.recipient_address(1, now, now), Address::ZERO);
        assert!(registry.pending_request(&id).is_some());
        assert_eq!(registry.events().len(), events_before);

        registry.transfer_mut().accept(requester());
        assert_eq!(registry.execute(requester(), id, now).unwrap(), 1);
        assert!(registry.check_deposit_conservation());
    }

    #[test]
    fn test_rejected_refund_rolls_back_removal() {
        let mut registry = setup();
        let recipient = Address::from_low_u64(7);
        let id = register(&mut registry, recipient, T0);
        let now = T0 + CHALLENGE_PERIOD;
        registry
            .submit_removal(requester(), id, base_deposit(), now)
            .unwrap();

        registry.transfer_mut().reject(requester());
        assert!(registry.execute(controller(), id, now + 1).is_err());
        assert_eq!(registry.recipient_count(), 1);
        assert_eq!(registry.recipient_address(1, now + 1, now + 1), recipient);
        assert_eq!(registry.pending_request(&id).map(|r| r.kind), Some(RequestKind::Removal));
    }

    #[test]
    fn test_rejected_bounty_keeps_request() {
        let mut registry = setup();
        let id = registry
            .submit_registration(requester(), Address::from_low_u64(7), metadata(), base_deposit(), T0)
            .unwrap();
        let beneficiary = Address::from_low_u64(0xbe);
        registry.transfer_mut().reject(beneficiary);

        assert!(matches!(
            registry.challenge(controller(), id, beneficiary, T0),
            Err(Error::TransferFailed(_))
        ));
        assert!(registry.pending_request(&id).is_some());
        assert!(registry.check_deposit_conservation());

        registry.challenge(controller(), id, controller(), T0).unwrap();
        assert_eq!(registry.deposit_book().bounties, base_deposit());
    }

    #[test]
    fn test_recipient_ids_differ_between_registries() {
        let mut one = setup();
        let mut two = ChallengeRegistry::new(
            Address::from_low_u64(0xa4),
            controller(),
            base_deposit(),
            CHALLENGE_PERIOD,
            Vault::new(),
        );
        let recipient = Address::from_low_u64(7);

        let id_one = one
            .submit_registration(requester(), recipient, metadata(), base_deposit(), T0)
            .unwrap();
        let id_two = two
            .submit_registration(requester(), recipient, metadata(), base_deposit(), T0)
            .unwrap();
        assert_ne!(id_one, id_two);
    }
}
