//! Error types for the registry

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Registry errors
///
/// Every variant is a synchronous rejection: the attempted transition leaves
/// no partial state behind.
#[derive(Error, Debug)]
pub enum Error {
    /// Recipient limit has never been configured
    #[error("Recipient limit is not set")]
    NotConfigured,

    /// All slots are occupied
    #[error("Recipient limit reached")]
    LimitReached,

    /// Attempt to lower (or keep) the recipient limit
    #[error("Max number of recipients can not be decreased")]
    LimitDecreaseRejected,

    /// Recipient already holds an active slot
    #[error("Recipient already registered: {0}")]
    AlreadyRegistered(String),

    /// Recipient slot is already tombstoned
    #[error("Recipient already removed: {0}")]
    AlreadyRemoved(String),

    /// Recipient is not in the registry
    #[error("Recipient is not in the registry: {0}")]
    NotRegistered(String),

    /// Malformed address, metadata or payload
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller is not the controller
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Item is absent from the external list
    #[error("Item not found in external list: {0}")]
    ItemNotFound(String),

    /// Item is still present in the external list
    #[error("Item is not removed from external list: {0}")]
    ItemNotRemoved(String),

    /// Deposit does not match the configured base deposit
    #[error("Incorrect deposit amount: expected {expected}, got {actual}")]
    IncorrectDeposit {
        /// Currently configured base deposit
        expected: rust_decimal::Decimal,
        /// Amount attached to the submission
        actual: rust_decimal::Decimal,
    },

    /// A request for this recipient is already open
    #[error("Request already submitted: {0}")]
    RequestAlreadyPending(String),

    /// No open request for this recipient
    #[error("Request does not exist: {0}")]
    RequestNotFound(String),

    /// Non-controller tried to execute before the deadline
    #[error("Challenge period is not over: executable at {deadline}")]
    ChallengePeriodNotOver {
        /// First timestamp at which anyone may execute
        deadline: u64,
    },

    /// Value transfer rejected by the target
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics could not be rendered
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
