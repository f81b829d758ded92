//! Put and delete commands.

use super::{open_database, open_environment, CliResult, Encoding};
use lightkv_core::PutFlags;
use std::path::Path;
use tracing::info;

/// Options for the put command.
#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    /// Fail if the key already exists.
    pub no_overwrite: bool,
    /// Create the named database if it is missing.
    pub create: bool,
}

/// Stores `value` under `key` in one write transaction.
pub fn put(
    path: &Path,
    db: Option<&str>,
    key: &str,
    value: &str,
    encoding: Encoding,
    options: PutOptions,
) -> CliResult<()> {
    let raw_key = encoding.parse(key)?;
    let raw_value = encoding.parse(value)?;
    let flags = if options.no_overwrite {
        PutFlags::NO_OVERWRITE
    } else {
        PutFlags::empty()
    };

    let env = open_environment(path, false)?;
    let txn = env.begin_transaction()?;
    let database = open_database(&txn, db, options.create)?;
    txn.put_with(&database, &raw_key, &raw_value, flags)?;
    txn.commit()?;

    info!(db = db.unwrap_or("<default>"), "stored {} bytes", raw_value.len());
    Ok(())
}

/// Deletes `key` and all its values in one write transaction.
pub fn delete(path: &Path, db: Option<&str>, key: &str, encoding: Encoding) -> CliResult<()> {
    let raw_key = encoding.parse(key)?;

    let env = open_environment(path, false)?;
    let txn = env.begin_transaction()?;
    let database = open_database(&txn, db, false)?;
    txn.delete(&database, &raw_key)?;
    txn.commit()?;

    info!(db = db.unwrap_or("<default>"), "deleted key");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CliError;
    use lightkv_core::{DatabaseConfig, Environment, EnvironmentConfig, Status};

    fn read(path: &Path, db: Option<&str>, key: &[u8]) -> Option<Vec<u8>> {
        let env = Environment::open(path, EnvironmentConfig::default()).unwrap();
        let txn = env.begin_read_transaction().unwrap();
        let database = txn.open_database(db, DatabaseConfig::new()).unwrap();
        txn.get(&database, key).unwrap()
    }

    #[test]
    fn put_then_delete() {
        let dir = tempfile::TempDir::new().unwrap();
        let create = PutOptions {
            create: true,
            ..PutOptions::default()
        };
        put(dir.path(), Some("users"), "alice", "admin", Encoding::Text, create).unwrap();
        assert_eq!(read(dir.path(), Some("users"), b"alice"), Some(b"admin".to_vec()));

        delete(dir.path(), Some("users"), "alice", Encoding::Text).unwrap();
        assert_eq!(read(dir.path(), Some("users"), b"alice"), None);
    }

    #[test]
    fn no_overwrite_keeps_existing_value() {
        let dir = tempfile::TempDir::new().unwrap();
        put(dir.path(), None, "6b", "01", Encoding::Hex, PutOptions::default()).unwrap();

        let strict = PutOptions {
            no_overwrite: true,
            ..PutOptions::default()
        };
        let err = put(dir.path(), None, "6b", "02", Encoding::Hex, strict).unwrap_err();
        assert!(matches!(err, CliError::Core(ref e) if e.status() == Some(Status::KEY_EXIST)));
        assert_eq!(read(dir.path(), None, b"k"), Some(vec![0x01]));
    }

    #[test]
    fn missing_named_database_without_create_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = put(dir.path(), Some("nope"), "k", "v", Encoding::Text, PutOptions::default())
            .unwrap_err();
        assert!(matches!(err, CliError::Core(ref e) if e.status() == Some(Status::NOT_FOUND)));
    }
}
