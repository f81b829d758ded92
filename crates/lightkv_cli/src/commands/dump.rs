//! Dump command implementation.

use super::{open_database, open_environment, CliResult, Encoding};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// A dumped key/value pair.
#[derive(Debug, Serialize)]
pub struct DumpEntry {
    /// Rendered key.
    pub key: String,
    /// Rendered value.
    pub value: String,
}

/// Dump options.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Database name; the default database when unset.
    pub db: Option<String>,
    /// First key to dump (inclusive, by the database's key order).
    pub from: Option<String>,
    /// Maximum number of pairs.
    pub limit: Option<usize>,
}

/// Walks the database in key order and prints each pair.
pub fn run(path: &Path, options: &DumpOptions, encoding: Encoding, format: &str) -> CliResult<()> {
    let env = open_environment(path, true)?;
    let txn = env.begin_read_transaction()?;
    let database = open_database(&txn, options.db.as_deref(), false)?;
    let cursor = txn.open_cursor(&database)?;

    let iter = match &options.from {
        Some(from) => cursor.iter_from(&encoding.parse(from)?),
        None => cursor.into_iter(),
    };

    let mut entries = Vec::new();
    for entry in iter.take(options.limit.unwrap_or(usize::MAX)) {
        let (key, value) = entry?;
        entries.push(DumpEntry {
            key: encoding.render(&key),
            value: encoding.render(&value),
        });
    }
    info!("dumped {} entries", entries.len());

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            for entry in &entries {
                println!("{}\t{}", entry.key, entry.value);
            }
        }
    }
    Ok(())
}
