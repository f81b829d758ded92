//! Stat command implementation.

use super::{open_database, open_environment, CliResult};
use lightkv_core::DATA_FILE;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Environment statistics.
#[derive(Debug, Serialize)]
pub struct StatResult {
    /// Environment path.
    pub path: String,
    /// Engine name.
    pub engine: String,
    /// Engine version.
    pub engine_version: String,
    /// Size of the data image in bytes.
    pub data_size: u64,
    /// Per-database statistics.
    pub databases: Vec<DatabaseStat>,
}

/// Statistics for a single database.
#[derive(Debug, Serialize)]
pub struct DatabaseStat {
    /// Database name; `None` for the default database.
    pub name: Option<String>,
    /// Number of entries.
    pub entries: u64,
}

/// Runs the stat command for the default database and every name in
/// `databases`.
pub fn run(path: &Path, databases: &[String], format: &str) -> CliResult<()> {
    let env = open_environment(path, true)?;
    let txn = env.begin_read_transaction()?;

    let names = std::iter::once(None).chain(databases.iter().map(|n| Some(n.as_str())));
    let mut stats = Vec::new();
    for name in names {
        let db = open_database(&txn, name, false)?;
        stats.push(DatabaseStat {
            name: name.map(str::to_string),
            entries: txn.entry_count(&db)?,
        });
    }
    drop(txn);

    let result = StatResult {
        path: path.display().to_string(),
        engine: env.engine_name().to_string(),
        engine_version: env.engine_version().to_string(),
        data_size: fs::metadata(path.join(DATA_FILE)).map(|m| m.len()).unwrap_or(0),
        databases: stats,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &StatResult) {
    println!("LightKV Environment");
    println!("===================");
    println!();
    println!("Path:   {}", result.path);
    println!("Engine: {} {}", result.engine, result.engine_version);
    println!("Data:   {}", format_size(result.data_size));
    println!();
    println!("Databases:");
    for db in &result.databases {
        println!(
            "  {:<24} {} entries",
            db.name.as_deref().unwrap_or("<default>"),
            db.entries
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
