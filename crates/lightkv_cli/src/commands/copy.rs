//! Copy command implementation.

use super::{open_environment, CliResult};
use std::path::Path;
use tracing::info;

/// Writes a consistent copy of the environment at `path` into
/// `destination`. The destination must not already hold an image.
pub fn run(path: &Path, destination: &Path) -> CliResult<()> {
    let env = open_environment(path, true)?;
    env.copy_to(destination)?;
    info!("copied {} to {}", path.display(), destination.display());
    println!("Copied environment to {}", destination.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightkv_core::{DatabaseConfig, Environment, EnvironmentConfig, DATA_FILE};

    #[test]
    fn copy_creates_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("source");
        {
            let env = Environment::open(&source, EnvironmentConfig::default()).unwrap();
            env.transaction(|txn| {
                let db = txn.open_database(None, DatabaseConfig::new())?;
                txn.put(&db, b"k", b"v")
            })
            .unwrap();
        }

        let destination = dir.path().join("copy");
        run(&source, &destination).unwrap();
        assert!(destination.join(DATA_FILE).exists());
        assert!(run(&source, &destination).is_err());
    }
}
