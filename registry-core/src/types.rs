//! Core types for the registry
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Stable identifiers (SHA-256 over packed bytes)
//! - Exact arithmetic (Decimal for deposits)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Seconds since Unix epoch, supplied by the caller's clock
pub type Timestamp = u64;

/// Deposit amount (exact decimal)
pub type Deposit = Decimal;

/// Account address (20 bytes, rendered as `0x`-prefixed hex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The null identity
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose last eight bytes hold `n` (handy for fixtures)
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check for the null identity
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        decode_hex(s, "address").map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Recipient identifier (32 bytes, rendered as `0x`-prefixed hex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecipientId([u8; 32]);

impl RecipientId {
    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the id of a recipient admitted by a specific registry
    ///
    /// SHA-256 over `registry || recipient || metadata`. Both addresses are
    /// fixed width, so the packed encoding is unambiguous.
    pub fn derive(registry: &Address, recipient: &Address, metadata: &Metadata) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(registry.as_bytes());
        hasher.update(recipient.as_bytes());
        hasher.update(metadata.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Id of an external list item (hash of its payload)
    pub fn of_payload(payload: &[u8]) -> Self {
        Self(Sha256::digest(payload).into())
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for RecipientId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        decode_hex(s, "recipient id").map(Self)
    }
}

impl TryFrom<String> for RecipientId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        value.parse()
    }
}

impl From<RecipientId> for String {
    fn from(id: RecipientId) -> Self {
        id.to_string()
    }
}

/// Parse exactly `N` hex-encoded bytes, with or without a `0x` prefix
fn decode_hex<const N: usize>(s: &str, what: &str) -> crate::Result<[u8; N]> {
    let hex = s.strip_prefix("0x").unwrap_or(s);
    if hex.len() != 2 * N || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(crate::Error::InvalidInput(format!(
            "{} must be {} hex-encoded bytes: {:?}",
            what, N, s
        )));
    }

    let mut bytes = [0u8; N];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
            .map_err(|_| crate::Error::InvalidInput(format!("invalid hex in {}: {:?}", what, s)))?;
    }
    Ok(bytes)
}

/// Opaque recipient metadata (usually a JSON document)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata(#[serde(with = "serde_bytes")] Vec<u8>);

impl Metadata {
    /// Create from bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check for an empty payload
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Metadata {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Metadata {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<Vec<u8>> for Metadata {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// One tenure of a slot: a recipient occupying an index over time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSlot {
    /// Slot index (1-based)
    pub index: u64,

    /// Recipient identifier
    pub recipient_id: RecipientId,

    /// Payout address
    pub address: Address,

    /// Recipient metadata
    pub metadata: Metadata,

    /// Admission timestamp
    pub registered_at: Timestamp,

    /// Tombstone timestamp
    pub removed_at: Option<Timestamp>,
}

impl RecipientSlot {
    /// Check whether the tenure is still active
    pub fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }

    /// Temporal-overlap rule: registered by `end`, not removed by `start`
    pub fn overlaps(&self, start: Timestamp, end: Timestamp) -> bool {
        self.registered_at <= end && self.removed_at.map_or(true, |removed| removed > start)
    }
}

/// Kind of change a pending request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestKind {
    /// Admit a new recipient
    Registration = 0,
    /// Tombstone an active recipient
    Removal = 1,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Registration => write!(f, "registration"),
            RequestKind::Removal => write!(f, "removal"),
        }
    }
}

/// Open request awaiting challenge or execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Recipient the request is about
    pub recipient_id: RecipientId,

    /// Registration or removal
    pub kind: RequestKind,

    /// Recipient address (zero for removals)
    pub address: Address,

    /// Recipient metadata (empty for removals)
    pub metadata: Metadata,

    /// Deposit paid at submission
    pub deposit: Deposit,

    /// Who paid the deposit
    pub submitter: Address,

    /// Submission timestamp
    pub submitted_at: Timestamp,

    /// Earliest timestamp at which anyone may execute
    pub deadline: Timestamp,
}

impl PendingRequest {
    /// Check whether the challenge period has elapsed
    pub fn is_executable_by_anyone(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }
}
