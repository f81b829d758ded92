//! Transactions and their hierarchy.
//!
//! LightKV transactions follow the engine's model:
//! - **Single writer**: at most one root read-write transaction per
//!   environment; beginning another blocks until it ends
//! - **Snapshot readers**: read-only transactions see the state committed
//!   when they began (or were last renewed)
//! - **Nesting**: a read-write transaction may run one nested transaction at
//!   a time; its changes fold into the parent on commit
//!
//! Ending a transaction ends its nested transactions first and invalidates
//! every cursor opened through it.

mod hierarchy;
mod state;

pub(crate) use hierarchy::TransactionHierarchy;
pub(crate) use state::{Owner, TxnInner};

use crate::config::DatabaseConfig;
use crate::cursor::Cursor;
use crate::database::Database;
use crate::error::{found, CoreError, CoreResult, StatusExt};
use crate::types::{TransactionId, TransactionState, MAX_KEY_SIZE};
use lightkv_engine::PutFlags;
use std::fmt;
use std::sync::Arc;

/// Rejects keys the engine cannot store.
pub(crate) fn validate_key(key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::invalid_argument("key must not be empty"));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(CoreError::invalid_argument(format!(
            "key is {} bytes, maximum is {MAX_KEY_SIZE}",
            key.len()
        )));
    }
    Ok(())
}

/// A transaction against an environment.
///
/// Dropping a transaction that has not committed or aborted aborts it.
///
/// # Example
///
/// ```rust
/// use lightkv_core::{DatabaseConfig, Environment, EnvironmentConfig};
///
/// let env = Environment::open_in_memory(EnvironmentConfig::default())?;
/// let txn = env.begin_transaction()?;
/// let db = txn.open_database(None, DatabaseConfig::new())?;
/// txn.put(&db, b"key", b"value")?;
/// txn.commit()?;
///
/// let reader = env.begin_read_transaction()?;
/// assert_eq!(reader.get(&db, b"key")?, Some(b"value".to_vec()));
/// # Ok::<(), lightkv_core::CoreError>(())
/// ```
pub struct Transaction {
    inner: Arc<TxnInner>,
}

impl Transaction {
    pub(crate) fn from_inner(inner: Arc<TxnInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<TxnInner> {
        &self.inner
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.state()
    }

    /// Checks if the transaction can run operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Returns true for read-only transactions.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// ID of the enclosing transaction, for nested transactions.
    #[must_use]
    pub fn parent_id(&self) -> Option<TransactionId> {
        self.inner.parent_id()
    }

    /// Number of live nested transactions.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.len()
    }

    /// Begins a nested read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] if this transaction is read-only,
    /// not active, or already has a live nested transaction.
    pub fn begin_child(&self) -> CoreResult<Transaction> {
        self.inner.begin_child().map(Self::from_inner)
    }

    /// Commits the transaction.
    ///
    /// Live nested transactions are aborted first. If the engine rejects the
    /// commit, [`Transaction::state`] reports what the engine did: `Aborted`
    /// when it released the transaction, `Active` when it is still pending
    /// and must be aborted by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] unless the transaction is active,
    /// or the engine error.
    pub fn commit(&self) -> CoreResult<()> {
        self.inner.commit()
    }

    /// Aborts the transaction and all nested transactions. Aborting a
    /// finished transaction does nothing.
    pub fn abort(&self) {
        self.inner.abort();
    }

    /// Releases a read-only transaction's snapshot, keeping it for
    /// [`Transaction::renew`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] for read-write or inactive
    /// transactions.
    pub fn reset(&self) -> CoreResult<()> {
        self.inner.reset()
    }

    /// Takes a fresh snapshot for a reset transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] unless the transaction is reset.
    pub fn renew(&self) -> CoreResult<()> {
        self.inner.renew()
    }

    /// Opens a database, reusing the environment's cached handle when the
    /// configuration matches. `None` opens the default database.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for an empty name, or the
    /// engine error (`NOT_FOUND` for a missing database without `CREATE`).
    pub fn open_database(&self, name: Option<&str>, config: DatabaseConfig) -> CoreResult<Database> {
        if name.is_some_and(str::is_empty) {
            return Err(CoreError::invalid_argument("database name must not be empty"));
        }
        let inner = &self.inner;
        let handle = inner.with_active("open database", |txn| {
            let (handle, fresh) = inner.shared.databases.open_database(name, txn, &config)?;
            if fresh {
                inner.remember_opened(name, handle);
            }
            Ok(handle)
        })?;
        Ok(Database::new(name, handle, config, Arc::clone(&inner.shared)))
    }

    /// Deletes a named database and closes its handle. The default database
    /// cannot be deleted and is emptied instead.
    pub fn drop_database(&self, db: &Database) -> CoreResult<()> {
        let handle = db.checked_handle(&self.inner.shared)?;
        self.inner.with_writable("drop database", |txn| {
            self.inner.engine().drop_db(txn, handle, true).during("drop_db")
        })?;
        if db.name().is_some() {
            self.inner.shared.databases.forget(db.name(), db.handle());
        }
        Ok(())
    }

    /// Removes every entry of a database.
    pub fn truncate(&self, db: &Database) -> CoreResult<()> {
        let handle = db.checked_handle(&self.inner.shared)?;
        self.inner.with_writable("truncate database", |txn| {
            self.inner.engine().drop_db(txn, handle, false).during("drop_db")
        })
    }

    /// Number of entries as seen by this transaction.
    pub fn entry_count(&self, db: &Database) -> CoreResult<u64> {
        let handle = db.checked_handle(&self.inner.shared)?;
        self.inner.with_active("read statistics", |txn| {
            let stat = self.inner.engine().db_stat(txn, handle).during("db_stat")?;
            Ok(stat.entries)
        })
    }

    /// Reads the value stored under `key`; `None` if absent.
    pub fn get(&self, db: &Database, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let handle = db.checked_handle(&self.inner.shared)?;
        self.inner
            .with_active("get", |txn| found(self.inner.engine().get(txn, handle, key), "get"))
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, db: &Database, key: &[u8]) -> CoreResult<bool> {
        Ok(self.get(db, key)?.is_some())
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put(&self, db: &Database, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.put_with(db, key, value, PutFlags::empty())
    }

    /// Stores `value` under `key` with explicit put flags.
    ///
    /// # Errors
    ///
    /// Returns the `KEY_EXIST` engine error when `flags` forbid the write and
    /// `MAP_FULL` when the environment is out of space. After `MAP_FULL`
    /// the transaction can only be aborted.
    pub fn put_with(&self, db: &Database, key: &[u8], value: &[u8], flags: PutFlags) -> CoreResult<()> {
        validate_key(key)?;
        let handle = db.checked_handle(&self.inner.shared)?;
        self.inner.with_writable("put", |txn| {
            self.inner
                .engine()
                .put(txn, handle, key, value, flags)
                .during("put")
        })
    }

    /// Deletes `key` and all of its values.
    ///
    /// # Errors
    ///
    /// An absent key is reported as the `NOT_FOUND` engine error.
    pub fn delete(&self, db: &Database, key: &[u8]) -> CoreResult<()> {
        self.delete_entry(db, key, None)
    }

    /// Deletes a single value of a dup-sorted key.
    pub fn delete_value(&self, db: &Database, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.delete_entry(db, key, Some(value))
    }

    fn delete_entry(&self, db: &Database, key: &[u8], value: Option<&[u8]>) -> CoreResult<()> {
        validate_key(key)?;
        let handle = db.checked_handle(&self.inner.shared)?;
        self.inner.with_writable("delete", |txn| {
            self.inner
                .engine()
                .delete(txn, handle, key, value)
                .during("delete")
        })
    }

    /// Opens a cursor over `db` scoped to this transaction.
    pub fn open_cursor(&self, db: &Database) -> CoreResult<Cursor<'_>> {
        let handle = db.checked_handle(&self.inner.shared)?;
        let inner = &self.inner;
        let cursor = inner.with_active("open cursor", |txn| {
            let cursor = inner
                .engine()
                .open_cursor(txn, handle)
                .during("open_cursor")?;
            inner.cursors.register(cursor);
            Ok(cursor)
        })?;
        Ok(Cursor::new(self, db.clone(), cursor))
    }

    /// Number of cursors currently open.
    #[must_use]
    pub fn open_cursor_count(&self) -> usize {
        self.inner.cursors.len()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.inner.state().is_terminal() {
            self.inner.abort();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("read_only", &self.inner.read_only)
            .field("parent", &self.inner.parent_id())
            .finish()
    }
}
