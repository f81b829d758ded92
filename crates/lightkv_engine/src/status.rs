//! Engine status codes.

use std::fmt;
use thiserror::Error;

/// Result type for engine primitives.
pub type EngineResult<T> = Result<T, Status>;

/// A nonzero status code returned by an engine primitive.
///
/// The numeric values follow the engine's C ABI so that codes surfaced to
/// callers (and logged) line up with the engine's own documentation.
/// [`Status::NOT_FOUND`] is the sentinel for "key/entry not found": read
/// paths turn it into an absent result, mutating paths keep it an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("{} ({})", self.description(), self.0)]
pub struct Status(pub i32);

impl Status {
    /// Successful result.
    pub const SUCCESS: Status = Status(0);
    /// Key/data pair already exists.
    pub const KEY_EXIST: Status = Status(-30799);
    /// Key/data pair not found.
    pub const NOT_FOUND: Status = Status(-30798);
    /// Environment map size reached.
    pub const MAP_FULL: Status = Status(-30792);
    /// Environment `max_dbs` reached.
    pub const DBS_FULL: Status = Status(-30791);
    /// Environment `max_readers` reached.
    pub const READERS_FULL: Status = Status(-30790);
    /// Transaction has too many dirty pages.
    pub const TXN_FULL: Status = Status(-30788);
    /// Operation and database are incompatible, or database flags changed.
    pub const INCOMPATIBLE: Status = Status(-30784);
    /// Transaction must abort, has a child, or is invalid.
    pub const BAD_TXN: Status = Status(-30782);
    /// The specified database handle was changed unexpectedly or is closed.
    pub const BAD_DBI: Status = Status(-30780);
    /// I/O failure.
    pub const IO: Status = Status(5);
    /// Permission denied (e.g. write in a read-only transaction).
    pub const ACCESS: Status = Status(13);
    /// Resource busy.
    pub const BUSY: Status = Status(16);
    /// Invalid argument.
    pub const INVALID: Status = Status(22);

    /// Returns the raw numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Returns true for the "not found" sentinel.
    #[must_use]
    pub const fn is_not_found(self) -> bool {
        self.0 == Self::NOT_FOUND.0
    }

    /// Short description of the code.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::SUCCESS => "successful result",
            Self::KEY_EXIST => "key/data pair already exists",
            Self::NOT_FOUND => "no matching key/data pair found",
            Self::MAP_FULL => "environment mapsize limit reached",
            Self::DBS_FULL => "environment maxdbs limit reached",
            Self::READERS_FULL => "environment maxreaders limit reached",
            Self::TXN_FULL => "transaction has too many dirty pages",
            Self::INCOMPATIBLE => "operation and database incompatible",
            Self::BAD_TXN => "transaction must abort, has a child, or is invalid",
            Self::BAD_DBI => "the specified database handle was changed unexpectedly",
            Self::IO => "input/output error",
            Self::ACCESS => "permission denied",
            Self::BUSY => "device or resource busy",
            Self::INVALID => "invalid argument",
            _ => "unknown engine status",
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({}: {})", self.0, self.description())
    }
}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::ACCESS,
            std::io::ErrorKind::NotFound => Self::INVALID,
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => Self::INVALID,
            _ => err.raw_os_error().map(Status).unwrap_or(Self::IO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_sentinel() {
        assert!(Status::NOT_FOUND.is_not_found());
        assert!(!Status::KEY_EXIST.is_not_found());
        assert!(!Status::SUCCESS.is_not_found());
    }

    #[test]
    fn display_includes_code() {
        let text = Status::MAP_FULL.to_string();
        assert!(text.contains("-30792"));
        assert!(text.contains("mapsize"));
    }

    #[test]
    fn unknown_code_has_generic_description() {
        assert_eq!(Status(-1).description(), "unknown engine status");
    }

    #[test]
    fn io_error_maps_to_access() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(Status::from(err), Status::ACCESS);
    }
}
