//! Test fixtures and environment helpers.
//!
//! Every fixture gets its own engine instance, so tests never share state
//! through the process-wide engine selection.

use lightkv_core::{Database, DatabaseConfig, Environment, EnvironmentConfig};
use lightkv_engine::{Engine, MemoryEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Directory name of the environment inside a fixture's temp dir.
const ENV_DIR: &str = "env";

/// A test environment with automatic cleanup.
pub struct TestEnvironment {
    /// The environment instance.
    pub env: Environment,
    /// The engine backing the environment.
    pub engine: Arc<MemoryEngine>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestEnvironment {
    /// Creates an in-memory environment with a default configuration that
    /// allows named databases.
    pub fn memory() -> Self {
        Self::memory_with(EnvironmentConfig::default())
    }

    /// Creates an in-memory environment with `config`.
    pub fn memory_with(config: EnvironmentConfig) -> Self {
        let engine = Arc::new(MemoryEngine::new());
        let env = Environment::open_with_engine(engine.clone(), None, config)
            .expect("Failed to open in-memory environment");
        Self {
            env,
            engine,
            _temp_dir: None,
        }
    }

    /// Creates an environment persisted in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = Arc::new(MemoryEngine::new());
        let env = Environment::open_with_engine(
            engine.clone(),
            Some(temp_dir.path().join(ENV_DIR).as_path()),
            EnvironmentConfig::default(),
        )
        .expect("Failed to open file environment");
        Self {
            env,
            engine,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the environment directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join(ENV_DIR))
    }

    /// Closes the environment and reopens it on the same directory and
    /// engine. Panics for in-memory fixtures.
    pub fn reopen(&mut self) {
        let path = self.path().expect("Only file environments can be reopened");
        self.env.close();
        self.env = Environment::open_with_engine(
            self.engine.clone(),
            Some(path.as_path()),
            EnvironmentConfig::default(),
        )
        .expect("Failed to reopen environment");
    }
}

impl std::ops::Deref for TestEnvironment {
    type Target = Environment;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}

/// Opens an environment on an explicit engine, for failure-injection tests.
pub fn env_with_engine(engine: Arc<dyn Engine>) -> Environment {
    Environment::open_with_engine(engine, None, EnvironmentConfig::default())
        .expect("Failed to open environment")
}

/// Runs a test with a temporary in-memory environment.
///
/// # Example
///
/// ```rust
/// use lightkv_testkit::with_temp_env;
///
/// with_temp_env(|env| {
///     let txn = env.begin_read_transaction().unwrap();
///     assert!(txn.is_read_only());
/// });
/// ```
pub fn with_temp_env<F, R>(f: F) -> R
where
    F: FnOnce(&Environment) -> R,
{
    let test_env = TestEnvironment::memory();
    f(&test_env.env)
}

/// Runs a test with a temporary file-based environment.
pub fn with_file_env<F, R>(f: F) -> R
where
    F: FnOnce(&Environment, &Path) -> R,
{
    let test_env = TestEnvironment::file();
    let path = test_env.path().expect("File environment should have a path");
    f(&test_env.env, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates an environment whose default database holds `count` entries
    /// keyed `key-00000`, `key-00001`, ... with values `value-N`.
    pub fn populated_environment(count: usize) -> (TestEnvironment, Database) {
        let test_env = TestEnvironment::memory();
        let db = test_env
            .env
            .transaction(|txn| {
                let db = txn.open_database(None, DatabaseConfig::new())?;
                for i in 0..count {
                    txn.put(&db, &numbered_key(i), format!("value-{i}").as_bytes())?;
                }
                Ok(db)
            })
            .expect("Failed to populate environment");
        (test_env, db)
    }

    /// Creates an environment with `count` named databases `db_0`..,
    /// each holding one entry.
    pub fn multi_database_environment(count: usize) -> (TestEnvironment, Vec<Database>) {
        let test_env = TestEnvironment::memory_with(
            EnvironmentConfig::default().max_dbs(u32::try_from(count).unwrap_or(u32::MAX)),
        );
        let databases = test_env
            .env
            .transaction(|txn| {
                let mut databases = Vec::with_capacity(count);
                for i in 0..count {
                    let name = format!("db_{i}");
                    let db = txn.open_database(Some(name.as_str()), DatabaseConfig::new().create())?;
                    txn.put(&db, b"id", &(i as u64).to_ne_bytes())?;
                    databases.push(db);
                }
                Ok(databases)
            })
            .expect("Failed to create databases");
        (test_env, databases)
    }

    /// The key used for entry `i` by [`populated_environment`].
    pub fn numbered_key(i: usize) -> Vec<u8> {
        format!("key-{i:05}").into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_environment() {
        let test_env = TestEnvironment::memory();
        assert!(test_env.path().is_none());
        assert!(!test_env.is_closed());
    }

    #[test]
    fn test_with_temp_env() {
        with_temp_env(|env| {
            assert_eq!(env.open_transaction_count(), 0);
        });
    }

    #[test]
    fn test_file_environment_survives_reopen() {
        let mut test_env = TestEnvironment::file();
        let db = test_env
            .transaction(|txn| {
                let db = txn.open_database(None, DatabaseConfig::new())?;
                txn.put(&db, b"durable", b"yes")?;
                Ok(db)
            })
            .unwrap();
        assert!(db.name().is_none());

        test_env.reopen();
        let txn = test_env.begin_read_transaction().unwrap();
        let db = txn.open_database(None, DatabaseConfig::new()).unwrap();
        assert_eq!(txn.get(&db, b"durable").unwrap(), Some(b"yes".to_vec()));
    }

    #[test]
    fn test_populated_scenario() {
        let (test_env, db) = scenarios::populated_environment(10);
        let txn = test_env.begin_read_transaction().unwrap();
        assert_eq!(txn.entry_count(&db).unwrap(), 10);
    }

    #[test]
    fn test_multi_database_scenario() {
        let (test_env, databases) = scenarios::multi_database_environment(3);
        assert_eq!(databases.len(), 3);
        assert_eq!(test_env.open_database_count(), 3);
    }
}
