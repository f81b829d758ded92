//! CLI command implementations.

pub mod copy;
pub mod dump;
pub mod edit;
pub mod get;
pub mod stat;

use lightkv_core::{
    CoreError, Database, DatabaseConfig, Environment, EnvironmentConfig, Transaction, DATA_FILE,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No environment image in the directory.
    #[error("no environment found at {}", .0.display())]
    NoEnvironment(PathBuf),

    /// A hex argument could not be decoded.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// The requested key is absent.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Error from the core library.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// JSON output failed.
    #[error("cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
}

/// How keys and values are read from arguments and written to output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8 text; non-UTF-8 output is escaped.
    Text,
    /// Lowercase hex.
    Hex,
}

impl Encoding {
    /// Picks hex when `hex` is set.
    pub fn from_flag(hex: bool) -> Self {
        if hex {
            Self::Hex
        } else {
            Self::Text
        }
    }

    /// Decodes a command-line argument.
    pub fn parse(self, arg: &str) -> CliResult<Vec<u8>> {
        match self {
            Self::Text => Ok(arg.as_bytes().to_vec()),
            Self::Hex => decode_hex(arg),
        }
    }

    /// Renders stored bytes for output.
    pub fn render(self, bytes: &[u8]) -> String {
        match self {
            Self::Text => String::from_utf8_lossy(bytes).escape_debug().to_string(),
            Self::Hex => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }
}

fn decode_hex(arg: &str) -> CliResult<Vec<u8>> {
    if arg.len() % 2 != 0 {
        return Err(CliError::InvalidHex(arg.to_string()));
    }
    (0..arg.len())
        .step_by(2)
        .map(|i| {
            arg.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::InvalidHex(arg.to_string()))
        })
        .collect()
}

/// Opens an existing environment. Read-only commands never create one.
pub fn open_environment(path: &Path, read_only: bool) -> CliResult<Environment> {
    if !path.join(DATA_FILE).exists() && read_only {
        return Err(CliError::NoEnvironment(path.to_path_buf()));
    }
    let config = EnvironmentConfig::default()
        .create_if_missing(!read_only)
        .read_only(read_only);
    Ok(Environment::open(path, config)?)
}

/// Opens `name` (or the default database) in `txn`, creating a named
/// database only when `create` is set.
pub fn open_database(txn: &Transaction, name: Option<&str>, create: bool) -> CliResult<Database> {
    let config = if create && name.is_some() {
        DatabaseConfig::new().create()
    } else {
        DatabaseConfig::new()
    };
    Ok(txn.open_database(name, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let bytes = Encoding::Hex.parse("00ff10").unwrap();
        assert_eq!(bytes, vec![0x00, 0xff, 0x10]);
        assert_eq!(Encoding::Hex.render(&bytes), "00ff10");
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(matches!(Encoding::Hex.parse("abc"), Err(CliError::InvalidHex(_))));
        assert!(matches!(Encoding::Hex.parse("zz"), Err(CliError::InvalidHex(_))));
    }

    #[test]
    fn text_escapes_binary() {
        assert_eq!(Encoding::Text.render(b"a\nb"), "a\\nb");
    }

    #[test]
    fn read_only_open_needs_an_image() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            open_environment(dir.path(), true),
            Err(CliError::NoEnvironment(_))
        ));
    }
}
