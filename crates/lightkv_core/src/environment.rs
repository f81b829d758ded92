//! Environment lifecycle.

use crate::config::{EnvironmentConfig, TransactionConfig};
use crate::database::DatabaseCache;
use crate::engine::default_engine;
use crate::error::{CoreError, CoreResult, StatusExt};
use crate::transaction::{Owner, Transaction, TransactionHierarchy};
use crate::types::TransactionId;
use lightkv_engine::{Engine, EngineVersion, EnvHandle};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// State shared by an environment and everything opened through it.
pub(crate) struct EnvShared {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) handle: EnvHandle,
    pub(crate) databases: DatabaseCache,
    closed: AtomicBool,
    next_txn_id: AtomicU64,
}

impl EnvShared {
    pub(crate) fn next_txn_id(&self) -> TransactionId {
        TransactionId::new(self.next_txn_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct EnvCore {
    shared: Arc<EnvShared>,
    roots: Arc<TransactionHierarchy>,
    path: Option<PathBuf>,
    config: EnvironmentConfig,
}

impl EnvCore {
    fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let aborted = self.roots.abort_all();
        self.shared.databases.close_all();
        self.shared.engine.close_env(self.shared.handle);
        debug!(env = %self.shared.handle, aborted, "closed environment");
    }
}

impl Drop for EnvCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// An open environment: the unit of transactions and databases.
///
/// Cloning is cheap; clones share the same environment. The environment
/// closes on [`Environment::close`] or when the last clone is dropped.
/// Closing aborts every open transaction, nested ones included.
///
/// # Example
///
/// ```rust
/// use lightkv_core::{DatabaseConfig, Environment, EnvironmentConfig};
///
/// let env = Environment::open_in_memory(EnvironmentConfig::default())?;
/// let db = env.transaction(|txn| {
///     let db = txn.open_database(Some("users"), DatabaseConfig::new().create())?;
///     txn.put(&db, b"alice", b"admin")?;
///     Ok(db)
/// })?;
///
/// let txn = env.begin_read_transaction()?;
/// assert!(txn.contains_key(&db, b"alice")?);
/// # Ok::<(), lightkv_core::CoreError>(())
/// ```
#[derive(Clone)]
pub struct Environment {
    core: Arc<EnvCore>,
}

impl Environment {
    /// Opens (or creates) an environment in the directory at `path`, using
    /// the process-wide engine.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the directory is missing
    /// and `create_if_missing` is off, or the engine error (`BUSY` if
    /// another environment holds the directory).
    pub fn open(path: impl AsRef<Path>, config: EnvironmentConfig) -> CoreResult<Self> {
        let path = path.as_ref();
        if !config.create_if_missing && !path.exists() {
            return Err(CoreError::invalid_argument(format!(
                "environment directory {} does not exist",
                path.display()
            )));
        }
        Self::open_with_engine(Arc::clone(&default_engine().engine), Some(path), config)
    }

    /// Opens an environment that lives only in memory.
    pub fn open_in_memory(config: EnvironmentConfig) -> CoreResult<Self> {
        Self::open_with_engine(Arc::clone(&default_engine().engine), None, config)
    }

    /// Opens an environment on an explicit engine instance.
    pub fn open_with_engine(
        engine: Arc<dyn Engine>,
        path: Option<&Path>,
        config: EnvironmentConfig,
    ) -> CoreResult<Self> {
        let handle = engine.open_env(&config.to_options(path)).during("open_env")?;
        info!(
            engine = engine.name(),
            path = ?path,
            read_only = config.read_only,
            "opened environment"
        );

        let shared = Arc::new(EnvShared {
            databases: DatabaseCache::new(Arc::clone(&engine), handle),
            engine,
            handle,
            closed: AtomicBool::new(false),
            next_txn_id: AtomicU64::new(1),
        });
        Ok(Self {
            core: Arc::new(EnvCore {
                shared,
                roots: Arc::new(TransactionHierarchy::new()),
                path: path.map(Path::to_path_buf),
                config,
            }),
        })
    }

    /// Directory of the environment, if it is persisted.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.core.path.as_deref()
    }

    /// The configuration the environment was opened with.
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.core.config
    }

    /// Begins a root read-write transaction, waiting for the current writer
    /// to finish if there is one.
    pub fn begin_transaction(&self) -> CoreResult<Transaction> {
        self.begin_transaction_with(TransactionConfig::read_write())
    }

    /// Begins a root read-only transaction.
    pub fn begin_read_transaction(&self) -> CoreResult<Transaction> {
        self.begin_transaction_with(TransactionConfig::read_only())
    }

    /// Begins a root transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EnvironmentClosed`] once the environment is
    /// closed, including when it closes while this call waits for the
    /// writer lock.
    pub fn begin_transaction_with(&self, config: TransactionConfig) -> CoreResult<Transaction> {
        let core = &self.core;
        if core.shared.is_closed() {
            return Err(CoreError::EnvironmentClosed);
        }
        if !config.read_only && core.config.read_only {
            return Err(CoreError::invalid_state(
                "cannot begin read-write transaction: environment is read-only",
            ));
        }

        let owner = Owner::Environment(Arc::downgrade(&core.roots));
        let inner = match core.roots.create(&core.shared, owner, None, config) {
            Ok(inner) => inner,
            Err(_) if core.shared.is_closed() => return Err(CoreError::EnvironmentClosed),
            Err(err) => return Err(err),
        };
        let txn = Transaction::from_inner(inner);

        // Teardown may have started while the engine call was blocked; it
        // either saw this transaction or we see the closed flag here.
        if core.shared.is_closed() {
            txn.abort();
            return Err(CoreError::EnvironmentClosed);
        }
        Ok(txn)
    }

    /// Runs `f` in a read-write transaction, committing if it returns `Ok`
    /// and aborting otherwise.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Transaction) -> CoreResult<T>,
    {
        let txn = self.begin_transaction()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.abort();
                Err(err)
            }
        }
    }

    /// Writes a copy of the committed state into `destination`.
    pub fn copy_to(&self, destination: impl AsRef<Path>) -> CoreResult<()> {
        let destination = destination.as_ref();
        let shared = &self.core.shared;
        if shared.is_closed() {
            return Err(CoreError::EnvironmentClosed);
        }
        shared
            .engine
            .copy_env(shared.handle, destination)
            .during("copy_env")?;
        info!(destination = %destination.display(), "copied environment");
        Ok(())
    }

    /// Closes the environment: aborts every open transaction, closes every
    /// database handle, then releases the engine environment. Idempotent.
    pub fn close(&self) {
        self.core.shutdown();
    }

    /// Returns true once the environment is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.core.shared.is_closed()
    }

    /// Number of live root transactions.
    #[must_use]
    pub fn open_transaction_count(&self) -> usize {
        self.core.roots.len()
    }

    /// Number of open database handles.
    #[must_use]
    pub fn open_database_count(&self) -> usize {
        self.core.shared.databases.open_count()
    }

    /// Name of the engine backing this environment.
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.core.shared.engine.name()
    }

    /// Version of the engine backing this environment.
    #[must_use]
    pub fn engine_version(&self) -> EngineVersion {
        self.core.shared.engine.version()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("handle", &self.core.shared.handle)
            .field("path", &self.core.path)
            .field("closed", &self.is_closed())
            .field("transactions", &self.core.roots)
            .finish()
    }
}
