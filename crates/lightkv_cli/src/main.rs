//! LightKV CLI
//!
//! Command-line tools for LightKV environments.
//!
//! # Commands
//!
//! - `stat` - Display environment and database statistics
//! - `get` - Print the value stored under a key
//! - `put` - Store a key/value pair
//! - `delete` - Delete a key
//! - `dump` - Print key/value pairs in key order
//! - `copy` - Write a consistent copy of the environment

mod commands;

use clap::{Parser, Subcommand};
use commands::{dump::DumpOptions, edit::PutOptions, Encoding};
use lightkv_core::{Environment, EnvironmentConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LightKV command-line environment tools.
#[derive(Parser)]
#[command(name = "lightkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the environment directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display environment and database statistics
    Stat {
        /// Named databases to report besides the default one
        #[arg(short, long)]
        db: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key to look up
        key: String,

        /// Named database (default database if omitted)
        #[arg(short, long)]
        db: Option<String>,

        /// Keys and values are hex encoded
        #[arg(short = 'x', long)]
        hex: bool,
    },

    /// Store a key/value pair
    Put {
        /// Key to store
        key: String,

        /// Value to store
        value: String,

        /// Named database (default database if omitted)
        #[arg(short, long)]
        db: Option<String>,

        /// Create the named database if it is missing
        #[arg(short, long)]
        create: bool,

        /// Fail if the key already exists
        #[arg(short, long)]
        no_overwrite: bool,

        /// Keys and values are hex encoded
        #[arg(short = 'x', long)]
        hex: bool,
    },

    /// Delete a key and all its values
    Delete {
        /// Key to delete
        key: String,

        /// Named database (default database if omitted)
        #[arg(short, long)]
        db: Option<String>,

        /// Key is hex encoded
        #[arg(short = 'x', long)]
        hex: bool,
    },

    /// Print key/value pairs in key order
    Dump {
        /// Named database (default database if omitted)
        #[arg(short, long)]
        db: Option<String>,

        /// Start at the first key not ordered before this one
        #[arg(long)]
        from: Option<String>,

        /// Maximum number of pairs to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keys and values are hex encoded
        #[arg(short = 'x', long)]
        hex: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write a consistent copy of the environment
    Copy {
        /// Destination directory; must not hold an environment already
        destination: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Stat { db, format } => {
            let path = cli.path.ok_or("Environment path required for stat")?;
            commands::stat::run(&path, &db, &format)?;
        }
        Commands::Get { key, db, hex } => {
            let path = cli.path.ok_or("Environment path required for get")?;
            commands::get::run(&path, db.as_deref(), &key, Encoding::from_flag(hex))?;
        }
        Commands::Put {
            key,
            value,
            db,
            create,
            no_overwrite,
            hex,
        } => {
            let path = cli.path.ok_or("Environment path required for put")?;
            let options = PutOptions {
                no_overwrite,
                create,
            };
            commands::edit::put(
                &path,
                db.as_deref(),
                &key,
                &value,
                Encoding::from_flag(hex),
                options,
            )?;
        }
        Commands::Delete { key, db, hex } => {
            let path = cli.path.ok_or("Environment path required for delete")?;
            commands::edit::delete(&path, db.as_deref(), &key, Encoding::from_flag(hex))?;
        }
        Commands::Dump {
            db,
            from,
            limit,
            hex,
            format,
        } => {
            let path = cli.path.ok_or("Environment path required for dump")?;
            let options = DumpOptions { db, from, limit };
            commands::dump::run(&path, &options, Encoding::from_flag(hex), &format)?;
        }
        Commands::Copy { destination } => {
            let path = cli.path.ok_or("Environment path required for copy")?;
            commands::copy::run(&path, &destination)?;
        }
        Commands::Version => {
            println!("LightKV CLI v{}", env!("CARGO_PKG_VERSION"));
            let env = Environment::open_in_memory(EnvironmentConfig::default())?;
            println!("Engine: {} v{}", env.engine_name(), env.engine_version());
        }
    }

    Ok(())
}
