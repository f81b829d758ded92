//! Get command implementation.

use super::{open_database, open_environment, CliError, CliResult, Encoding};
use std::path::Path;
use tracing::debug;

/// Prints the value stored under `key`.
pub fn run(path: &Path, db: Option<&str>, key: &str, encoding: Encoding) -> CliResult<()> {
    let env = open_environment(path, true)?;
    let txn = env.begin_read_transaction()?;
    let database = open_database(&txn, db, false)?;

    let raw_key = encoding.parse(key)?;
    debug!(key_len = raw_key.len(), "looking up key");
    match txn.get(&database, &raw_key)? {
        Some(value) => {
            println!("{}", encoding.render(&value));
            Ok(())
        }
        None => Err(CliError::KeyNotFound(key.to_string())),
    }
}
