//! Core type definitions for LightKV.

use std::fmt;

/// Largest key the engine accepts, in bytes.
pub const MAX_KEY_SIZE: usize = 511;

/// Wrapper-side identifier of a transaction.
///
/// Transaction IDs are monotonically increasing per environment and never
/// reused. They key the hierarchy bookkeeping; the engine handle itself is
/// never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Lifecycle state of a transaction.
///
/// `Committed` and `Aborted` are terminal. `Reset` is only reachable by
/// read-only transactions and cycles back to `Active` through renew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Transaction can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
    /// Read-only transaction whose snapshot was released.
    Reset,
}

impl TransactionState {
    /// Returns true for `Committed` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
            Self::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// A key/value pair read from the engine.
pub type Entry = (Vec<u8>, Vec<u8>);
