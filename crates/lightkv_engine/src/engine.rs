//! Engine primitive surface.

use crate::status::EngineResult;
use crate::types::{
    CursorHandle, CursorOp, DbFlags, DbHandle, DbStat, EngineVersion, EnvHandle, EnvOptions,
    KeyCompare, PutFlags, TxnFlags, TxnHandle, TxnStatus,
};
use std::path::Path;

/// The primitive operation surface of an embedded key-value engine.
///
/// Engines are **opaque**: they hand out handles and status codes and know
/// nothing about the bookkeeping layered on top of them. Every call either
/// succeeds or returns the engine's own [`crate::Status`].
///
/// # Invariants
///
/// - At most one live root read-write transaction per environment; a second
///   `begin_txn` for a writer blocks until the first one ends
/// - Read-only transactions see the snapshot taken at begin/renew
/// - Ending a transaction invalidates its cursors engine-side
/// - `abort_txn`, `close_db` and `close_cursor` never fail; they ignore
///   handles that are already released
/// - `NOT_FOUND` is returned by `get`, `cursor_move` and `delete` when the
///   entry is absent
///
/// # Implementors
///
/// - [`super::MemoryEngine`] - in-process reference engine
pub trait Engine: Send + Sync {
    /// Short engine name used for selection and logs.
    fn name(&self) -> &'static str;

    /// Engine library version.
    fn version(&self) -> EngineVersion;

    /// Opens an environment.
    ///
    /// # Errors
    ///
    /// Returns `BUSY` if the directory is locked by another environment,
    /// `INVALID` for malformed data files, or an I/O status.
    fn open_env(&self, options: &EnvOptions) -> EngineResult<EnvHandle>;

    /// Closes an environment, releasing everything still bound to it.
    fn close_env(&self, env: EnvHandle);

    /// Begins a transaction, nested under `parent` when given.
    ///
    /// # Errors
    ///
    /// Returns `BAD_TXN` if the parent is not usable, `READERS_FULL` when
    /// too many readers are live, `ACCESS` for a writer on a read-only
    /// environment.
    fn begin_txn(
        &self,
        env: EnvHandle,
        parent: Option<TxnHandle>,
        flags: TxnFlags,
    ) -> EngineResult<TxnHandle>;

    /// Commits a transaction. The handle is released whether or not the
    /// commit succeeds; [`Engine::txn_status`] reports what happened.
    ///
    /// # Errors
    ///
    /// Returns `BAD_TXN` if the transaction is broken or has a live child,
    /// or an I/O status if persisting the commit failed.
    fn commit_txn(&self, txn: TxnHandle) -> EngineResult<()>;

    /// Aborts a transaction and every live nested transaction under it.
    fn abort_txn(&self, txn: TxnHandle);

    /// Releases a read-only transaction's snapshot, keeping the handle.
    ///
    /// # Errors
    ///
    /// Returns `INVALID` for a read-write transaction.
    fn reset_txn(&self, txn: TxnHandle) -> EngineResult<()>;

    /// Reacquires a snapshot for a reset read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns `INVALID` if the transaction was not reset.
    fn renew_txn(&self, txn: TxnHandle) -> EngineResult<()>;

    /// Reports the engine-side state of a transaction handle.
    fn txn_status(&self, txn: TxnHandle) -> TxnStatus;

    /// Opens a database by name (`None` is the unnamed default database).
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the database doesn't exist and `CREATE` is not
    /// set, `DBS_FULL` if `max_dbs` is reached, `INCOMPATIBLE` if persisted
    /// flags differ.
    fn open_db(&self, txn: TxnHandle, name: Option<&str>, flags: DbFlags)
        -> EngineResult<DbHandle>;

    /// Sets the key comparator and, for dup-sorted databases, the value
    /// comparator of an open database.
    ///
    /// # Errors
    ///
    /// Returns `BAD_DBI` for an unknown handle.
    fn set_compare(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key_compare: Option<KeyCompare>,
        dup_compare: Option<KeyCompare>,
    ) -> EngineResult<()>;

    /// Closes a database handle.
    fn close_db(&self, env: EnvHandle, db: DbHandle);

    /// Empties a database, removing it from the environment when `delete`
    /// is set (which also closes the handle).
    ///
    /// # Errors
    ///
    /// Returns `ACCESS` in a read-only transaction.
    fn drop_db(&self, txn: TxnHandle, db: DbHandle, delete: bool) -> EngineResult<()>;

    /// Returns statistics for a database as seen by the transaction.
    ///
    /// # Errors
    ///
    /// Returns `BAD_DBI` or `BAD_TXN` for unusable handles.
    fn db_stat(&self, txn: TxnHandle, db: DbHandle) -> EngineResult<DbStat>;

    /// Opens a cursor bound to a transaction and database.
    ///
    /// # Errors
    ///
    /// Returns `BAD_TXN` or `BAD_DBI` for unusable handles.
    fn open_cursor(&self, txn: TxnHandle, db: DbHandle) -> EngineResult<CursorHandle>;

    /// Closes a cursor.
    fn close_cursor(&self, cursor: CursorHandle);

    /// Moves a cursor and returns the key/value pair at the new position.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` when there is no pair at the requested position,
    /// `INVALID` when a required argument is missing or the cursor is not
    /// positioned.
    fn cursor_move(
        &self,
        cursor: CursorHandle,
        op: CursorOp,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> EngineResult<(Vec<u8>, Vec<u8>)>;

    /// Stores a key/value pair.
    ///
    /// # Errors
    ///
    /// Returns `KEY_EXIST` when a put flag forbids the write, `MAP_FULL`
    /// when the map is exhausted, `ACCESS` in a read-only transaction.
    fn put(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key: &[u8],
        value: &[u8],
        flags: PutFlags,
    ) -> EngineResult<()>;

    /// Deletes a key (all its values), or one value of a dup-sorted key.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if nothing matched.
    fn delete(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> EngineResult<()>;

    /// Reads the (first) value stored under a key.
    ///
    /// # Errors
    ///
    /// Returns `NOT_FOUND` if the key is absent.
    fn get(&self, txn: TxnHandle, db: DbHandle, key: &[u8]) -> EngineResult<Vec<u8>>;

    /// Copies the committed state of the environment into `destination`.
    ///
    /// # Errors
    ///
    /// Returns an I/O status if the copy cannot be written.
    fn copy_env(&self, env: EnvHandle, destination: &Path) -> EngineResult<()>;
}
