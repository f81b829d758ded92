//! Handles, flags and value types shared by every engine.

use std::cmp::Ordering;
use std::fmt;
use std::ops::BitOr;
use std::path::PathBuf;

/// A key or duplicate-value comparison function attached to a database.
///
/// Comparators must be pure and induce a total order; the engine's tree
/// ordering depends on it.
pub type KeyCompare = fn(&[u8], &[u8]) -> Ordering;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw engine identifier.
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw engine identifier.
            #[must_use]
            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

opaque_handle!(
    /// Opaque identifier of an open environment.
    EnvHandle,
    "env"
);
opaque_handle!(
    /// Opaque identifier of a live transaction.
    TxnHandle,
    "txn"
);
opaque_handle!(
    /// Opaque identifier of an open database.
    DbHandle,
    "dbi"
);
opaque_handle!(
    /// Opaque identifier of an open cursor.
    CursorHandle,
    "cursor"
);

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* $flag:ident = $bit:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: $name = $name($bit); )*

            /// No flags set.
            #[must_use]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Builds a flag set from raw bits, dropping unknown bits.
            #[must_use]
            pub const fn from_bits_truncate(bits: u32) -> Self {
                Self(bits & (0 $(| $bit)*))
            }

            /// Returns the raw bits.
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Returns true if every flag in `other` is set.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Returns true if no flag is set.
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Returns the union of both sets.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Returns `self` without the flags in `other`.
            #[must_use]
            pub const fn difference(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut set = f.debug_set();
                $( if self.contains(Self::$flag) && $bit != 0 { set.entry(&stringify!($flag)); } )*
                set.finish()
            }
        }
    };
}

flag_set! {
    /// Environment open flags.
    EnvFlags {
        /// Open the environment read-only; write transactions fail with `ACCESS`.
        READ_ONLY = 0x2_0000;
        /// Do not fsync the data image after commit.
        NO_SYNC = 0x1_0000;
        /// Do not take the directory lock file.
        NO_LOCK = 0x40_0000;
    }
}

flag_set! {
    /// Transaction begin flags.
    TxnFlags {
        /// Read-only transaction.
        READ_ONLY = 0x2_0000;
    }
}

flag_set! {
    /// Database open flags.
    ///
    /// `CREATE` only affects the open call; the others are persisted with the
    /// database and must match on later opens.
    DbFlags {
        /// Reverse key order (keys compared from the end).
        REVERSE_KEY = 0x02;
        /// Allow sorted duplicate values per key.
        DUP_SORT = 0x04;
        /// Keys are native-endian unsigned integers of 4 or 8 bytes.
        INTEGER_KEY = 0x08;
        /// Create the named database if it doesn't exist.
        CREATE = 0x4_0000;
    }
}

impl DbFlags {
    /// Flags stored with the database and checked on reopen.
    pub const PERSISTENT: DbFlags = DbFlags(0x02 | 0x04 | 0x08);
}

flag_set! {
    /// Put flags.
    PutFlags {
        /// Fail with `KEY_EXIST` if the key already exists.
        NO_OVERWRITE = 0x10;
        /// Fail with `KEY_EXIST` if the exact key/value pair exists (dup-sorted).
        NO_DUP_DATA = 0x20;
        /// Keys must be appended in order; `KEY_EXIST` otherwise.
        APPEND = 0x2_0000;
    }
}

/// Cursor positioning operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorOp {
    /// Position at the first key/value pair.
    First,
    /// Position at the last key/value pair.
    Last,
    /// Position at the next pair.
    Next,
    /// Position at the previous pair.
    Prev,
    /// Return the pair at the current position.
    GetCurrent,
    /// Position at the given key.
    Set,
    /// Position at the given key and return it.
    SetKey,
    /// Position at the first key greater than or equal to the given key.
    SetRange,
    /// Position at the first value of the next key.
    NextNoDup,
    /// Position at the last value of the previous key.
    PrevNoDup,
    /// Position at the first value of the current key.
    FirstDup,
    /// Position at the last value of the current key.
    LastDup,
    /// Position at the next value of the current key.
    NextDup,
    /// Position at the previous value of the current key.
    PrevDup,
    /// Position at the exact key/value pair.
    GetBoth,
    /// Position at the key, nearest value greater than or equal to the given one.
    GetBothRange,
}

impl CursorOp {
    /// Returns true if the operation needs a key argument.
    #[must_use]
    pub const fn needs_key(self) -> bool {
        matches!(
            self,
            Self::Set | Self::SetKey | Self::SetRange | Self::GetBoth | Self::GetBothRange
        )
    }

    /// Returns true if the operation needs a value argument.
    #[must_use]
    pub const fn needs_value(self) -> bool {
        matches!(self, Self::GetBoth | Self::GetBothRange)
    }
}

/// Options for opening an environment.
#[derive(Debug, Clone)]
pub struct EnvOptions {
    /// Directory holding the environment; `None` keeps it purely in memory.
    pub path: Option<PathBuf>,
    /// Maximum total size of stored keys and values, in bytes.
    pub map_size: u64,
    /// Maximum number of named databases.
    pub max_dbs: u32,
    /// Maximum number of concurrent read-only transactions.
    pub max_readers: u32,
    /// Environment flags.
    pub flags: EnvFlags,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            path: None,
            map_size: 10 * 1024 * 1024, // 10 MB
            max_dbs: 0,
            max_readers: 126,
            flags: EnvFlags::empty(),
        }
    }
}

/// Engine library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
    /// Patch version.
    pub patch: u16,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DbStat {
    /// Number of key/value pairs (duplicates counted individually).
    pub entries: u64,
    /// Total bytes of keys and values.
    pub bytes: u64,
}

/// Engine-side state of a transaction handle.
///
/// Queried after a failed commit to learn whether the engine released the
/// handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// Handle is live and usable.
    Live,
    /// Read-only handle whose snapshot was released by `reset_txn`.
    Reset,
    /// Handle is live but a failed operation means it can only be aborted.
    Broken,
    /// Handle was released; any further use is invalid.
    Released,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_compose() {
        let flags = DbFlags::CREATE | DbFlags::DUP_SORT;
        assert!(flags.contains(DbFlags::CREATE));
        assert!(flags.contains(DbFlags::DUP_SORT));
        assert!(!flags.contains(DbFlags::INTEGER_KEY));
        assert_eq!(flags.difference(DbFlags::CREATE), DbFlags::DUP_SORT);
    }

    #[test]
    fn persistent_flags_exclude_create() {
        let flags = DbFlags::CREATE | DbFlags::REVERSE_KEY;
        assert_eq!(
            DbFlags::from_bits_truncate(flags.bits() & DbFlags::PERSISTENT.bits()),
            DbFlags::REVERSE_KEY
        );
    }

    #[test]
    fn from_bits_drops_unknown() {
        let flags = PutFlags::from_bits_truncate(0xFFFF_FFFF);
        assert!(flags.contains(PutFlags::NO_OVERWRITE | PutFlags::APPEND));
        assert_eq!(flags.bits() & 0x1, 0);
    }

    #[test]
    fn handle_display() {
        assert_eq!(TxnHandle::from_raw(7).to_string(), "txn:7");
        assert_eq!(DbHandle::from_raw(2).to_string(), "dbi:2");
    }

    #[test]
    fn cursor_op_arguments() {
        assert!(CursorOp::SetRange.needs_key());
        assert!(!CursorOp::First.needs_key());
        assert!(CursorOp::GetBoth.needs_value());
        assert!(!CursorOp::Set.needs_value());
    }
}
