//! Environment, transaction and database configuration.

use crate::comparator::Comparator;
use lightkv_engine::{DbFlags, EnvFlags, EnvOptions, TxnFlags};
use std::path::Path;

/// Configuration for opening an environment.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Whether to create the environment directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Maximum total size of stored keys and values, in bytes.
    pub map_size: u64,

    /// Maximum number of named databases.
    pub max_dbs: u32,

    /// Maximum number of concurrent read-only transactions.
    pub max_readers: u32,

    /// Open the environment read-only.
    pub read_only: bool,

    /// Skip fsync after commit (faster, not crash-safe).
    pub no_sync: bool,

    /// Skip the directory lock file.
    pub no_lock: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            map_size: 10 * 1024 * 1024, // 10 MB
            max_dbs: 16,
            max_readers: 126,
            read_only: false,
            no_sync: false,
            no_lock: false,
        }
    }
}

impl EnvironmentConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the environment directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the map size in bytes.
    #[must_use]
    pub const fn map_size(mut self, size: u64) -> Self {
        self.map_size = size;
        self
    }

    /// Sets the maximum number of named databases.
    #[must_use]
    pub const fn max_dbs(mut self, count: u32) -> Self {
        self.max_dbs = count;
        self
    }

    /// Sets the maximum number of concurrent readers.
    #[must_use]
    pub const fn max_readers(mut self, count: u32) -> Self {
        self.max_readers = count;
        self
    }

    /// Sets whether the environment is read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether to skip fsync after commit.
    #[must_use]
    pub const fn no_sync(mut self, value: bool) -> Self {
        self.no_sync = value;
        self
    }

    /// Sets whether to skip the directory lock.
    #[must_use]
    pub const fn no_lock(mut self, value: bool) -> Self {
        self.no_lock = value;
        self
    }

    /// Builds engine options for an environment at `path`.
    pub(crate) fn to_options(&self, path: Option<&Path>) -> EnvOptions {
        let mut flags = EnvFlags::empty();
        if self.read_only {
            flags = flags | EnvFlags::READ_ONLY;
        }
        if self.no_sync {
            flags = flags | EnvFlags::NO_SYNC;
        }
        if self.no_lock {
            flags = flags | EnvFlags::NO_LOCK;
        }
        EnvOptions {
            path: path.map(Path::to_path_buf),
            map_size: self.map_size,
            max_dbs: self.max_dbs,
            max_readers: self.max_readers,
            flags,
        }
    }
}

/// Configuration for beginning a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Begin a read-only transaction.
    pub read_only: bool,
}

impl TransactionConfig {
    /// Read-write transaction configuration.
    #[must_use]
    pub const fn read_write() -> Self {
        Self { read_only: false }
    }

    /// Read-only transaction configuration.
    #[must_use]
    pub const fn read_only() -> Self {
        Self { read_only: true }
    }

    pub(crate) fn flags(self) -> TxnFlags {
        if self.read_only {
            TxnFlags::READ_ONLY
        } else {
            TxnFlags::empty()
        }
    }
}

/// Configuration for opening a database.
///
/// Two opens of the same name share a cached handle only when their
/// configurations are equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DatabaseConfig {
    /// Engine open flags.
    pub flags: DbFlags,
    /// Key order; `None` keeps the engine default.
    pub key_comparator: Option<Comparator>,
    /// Duplicate value order for `DUP_SORT` databases.
    pub dup_comparator: Option<Comparator>,
}

impl DatabaseConfig {
    /// Creates a configuration with no flags and default ordering.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flags: DbFlags::empty(),
            key_comparator: None,
            dup_comparator: None,
        }
    }

    /// Sets the open flags.
    #[must_use]
    pub const fn flags(mut self, flags: DbFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Adds `CREATE` to the open flags.
    #[must_use]
    pub const fn create(mut self) -> Self {
        self.flags = self.flags.union(DbFlags::CREATE);
        self
    }

    /// Sets the key comparator.
    #[must_use]
    pub const fn key_comparator(mut self, comparator: Comparator) -> Self {
        self.key_comparator = Some(comparator);
        self
    }

    /// Sets the duplicate value comparator.
    #[must_use]
    pub const fn dup_comparator(mut self, comparator: Comparator) -> Self {
        self.dup_comparator = Some(comparator);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EnvironmentConfig::default();
        assert!(config.create_if_missing);
        assert!(!config.read_only);
        assert!(!config.no_sync);
        assert_eq!(config.max_dbs, 16);
    }

    #[test]
    fn builder_pattern() {
        let config = EnvironmentConfig::new()
            .create_if_missing(false)
            .no_sync(true)
            .map_size(1024)
            .max_dbs(2);

        assert!(!config.create_if_missing);
        assert!(config.no_sync);
        assert_eq!(config.map_size, 1024);
        assert_eq!(config.max_dbs, 2);
    }

    #[test]
    fn options_carry_flags() {
        let options = EnvironmentConfig::new()
            .read_only(true)
            .no_lock(true)
            .to_options(Some(Path::new("/tmp/env")));
        assert!(options.flags.contains(EnvFlags::READ_ONLY | EnvFlags::NO_LOCK));
        assert!(!options.flags.contains(EnvFlags::NO_SYNC));
        assert_eq!(options.path.as_deref(), Some(Path::new("/tmp/env")));
    }

    #[test]
    fn database_config_equality_includes_comparator() {
        let plain = DatabaseConfig::new().create();
        let sorted = plain.key_comparator(Comparator::LexicographicDescending);
        assert_ne!(plain, sorted);
        assert_eq!(plain, DatabaseConfig::new().flags(DbFlags::CREATE));
    }

    #[test]
    fn transaction_config_flags() {
        assert_eq!(TransactionConfig::read_only().flags(), TxnFlags::READ_ONLY);
        assert!(TransactionConfig::read_write().flags().is_empty());
    }
}
