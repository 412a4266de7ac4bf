//! Recipient registry for quadratic funding rounds
//!
//! Tracks which recipients are eligible at which slot index and over which
//! time window. A funding round asks, at tally time, who held slot `i`
//! during `[start, end]`.
//!
//! # Architecture
//!
//! - **Slot Ledger**: Bounded slot allocation with tenure history
//! - **Admission Policies**: Controller-gated, list-mirroring, deposit-backed
//! - **Single Writer**: A sequencer task applies transactions serially
//! - **Event Journal**: Committed events persisted for indexers
//!
//! # Invariants
//!
//! - Active recipients never exceed the recipient limit
//! - The recipient limit only grows
//! - A slot index is never shared by two tenures overlapping in time
//! - Deposits received == bounties + refunds + deposits still pending

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::all
)]

pub mod actor;
pub mod api;
pub mod challenge;
pub mod clock;
pub mod config;
pub mod controlled;
pub mod error;
pub mod events;
pub mod metrics;
pub mod mirrored;
pub mod slots;
pub mod source;
pub mod storage;
pub mod transfer;
pub mod types;

// Re-exports
pub use actor::{spawn_sequencer, SequencerHandle};
pub use challenge::{ChallengeRegistry, DepositBook};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, RegistryKind};
pub use controlled::ControlledRegistry;
pub use error::{Error, Result};
pub use events::{EventLog, RegistryEvent};
pub use mirrored::{ExternalList, MemoryList, MirroredRegistry};
pub use slots::SlotLedger;
pub use source::RecipientSource;
pub use storage::Journal;
pub use transfer::{ValueTransfer, Vault};
pub use types::{
    Address, Deposit, Metadata, PendingRequest, RecipientId, RecipientSlot, RequestKind,
    Timestamp,
};
