//! Fault-injecting engine.
//!
//! [`FaultyEngine`] wraps a [`MemoryEngine`] and fails selected primitives
//! on demand. It also counts calls per primitive, so tests can check that an
//! operation rejected up front never reached the engine.

use lightkv_engine::{
    CursorHandle, CursorOp, DbFlags, DbHandle, DbStat, Engine, EngineResult, EngineVersion,
    EnvHandle, EnvOptions, KeyCompare, MemoryEngine, PutFlags, Status, TxnFlags, TxnHandle,
    TxnStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

/// What the engine does with a transaction whose commit is made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The transaction is aborted and its handle released.
    Released,
    /// The transaction stays live and must be aborted by the caller.
    Kept,
    /// The commit goes through but the injected status is still returned.
    Committed,
}

#[derive(Default)]
struct Faults {
    commit: Option<(Status, CommitOutcome)>,
    put: Option<Status>,
    open_db: Option<Status>,
    begin: Option<Status>,
    calls: HashMap<&'static str, usize>,
}

/// A [`MemoryEngine`] with injectable failures.
///
/// Each injected fault fires once, on the next call of its primitive.
#[derive(Default)]
pub struct FaultyEngine {
    inner: MemoryEngine,
    faults: Mutex<Faults>,
}

impl FaultyEngine {
    /// Creates an engine with no pending faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped engine, for inspecting live handles.
    pub fn inner(&self) -> &MemoryEngine {
        &self.inner
    }

    /// Makes the next `commit_txn` return `status` with the given outcome.
    pub fn fail_next_commit(&self, status: Status, outcome: CommitOutcome) {
        self.faults.lock().commit = Some((status, outcome));
    }

    /// Makes the next `put` return `status` without writing.
    pub fn fail_next_put(&self, status: Status) {
        self.faults.lock().put = Some(status);
    }

    /// Makes the next `open_db` return `status`.
    pub fn fail_next_open_db(&self, status: Status) {
        self.faults.lock().open_db = Some(status);
    }

    /// Makes the next `begin_txn` return `status`.
    pub fn fail_next_begin(&self, status: Status) {
        self.faults.lock().begin = Some(status);
    }

    /// Number of calls made to `primitive` so far.
    pub fn calls(&self, primitive: &str) -> usize {
        self.faults.lock().calls.get(primitive).copied().unwrap_or(0)
    }

    fn record(&self, primitive: &'static str) {
        *self.faults.lock().calls.entry(primitive).or_insert(0) += 1;
    }
}

impl std::fmt::Debug for FaultyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultyEngine")
            .field("inner", &self.inner)
            .finish()
    }
}

impl Engine for FaultyEngine {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn version(&self) -> EngineVersion {
        self.inner.version()
    }

    fn open_env(&self, options: &EnvOptions) -> EngineResult<EnvHandle> {
        self.record("open_env");
        self.inner.open_env(options)
    }

    fn close_env(&self, env: EnvHandle) {
        self.record("close_env");
        self.inner.close_env(env);
    }

    fn begin_txn(
        &self,
        env: EnvHandle,
        parent: Option<TxnHandle>,
        flags: TxnFlags,
    ) -> EngineResult<TxnHandle> {
        self.record("begin_txn");
        if let Some(status) = self.faults.lock().begin.take() {
            return Err(status);
        }
        self.inner.begin_txn(env, parent, flags)
    }

    fn commit_txn(&self, txn: TxnHandle) -> EngineResult<()> {
        self.record("commit_txn");
        let fault = self.faults.lock().commit.take();
        match fault {
            None => self.inner.commit_txn(txn),
            Some((status, CommitOutcome::Released)) => {
                self.inner.abort_txn(txn);
                Err(status)
            }
            Some((status, CommitOutcome::Kept)) => Err(status),
            Some((status, CommitOutcome::Committed)) => {
                self.inner.commit_txn(txn)?;
                Err(status)
            }
        }
    }

    fn abort_txn(&self, txn: TxnHandle) {
        self.record("abort_txn");
        self.inner.abort_txn(txn);
    }

    fn reset_txn(&self, txn: TxnHandle) -> EngineResult<()> {
        self.record("reset_txn");
        self.inner.reset_txn(txn)
    }

    fn renew_txn(&self, txn: TxnHandle) -> EngineResult<()> {
        self.record("renew_txn");
        self.inner.renew_txn(txn)
    }

    fn txn_status(&self, txn: TxnHandle) -> TxnStatus {
        self.inner.txn_status(txn)
    }

    fn open_db(
        &self,
        txn: TxnHandle,
        name: Option<&str>,
        flags: DbFlags,
    ) -> EngineResult<DbHandle> {
        self.record("open_db");
        if let Some(status) = self.faults.lock().open_db.take() {
            return Err(status);
        }
        self.inner.open_db(txn, name, flags)
    }

    fn set_compare(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key_compare: Option<KeyCompare>,
        dup_compare: Option<KeyCompare>,
    ) -> EngineResult<()> {
        self.record("set_compare");
        self.inner.set_compare(txn, db, key_compare, dup_compare)
    }

    fn close_db(&self, env: EnvHandle, db: DbHandle) {
        self.record("close_db");
        self.inner.close_db(env, db);
    }

    fn drop_db(&self, txn: TxnHandle, db: DbHandle, delete: bool) -> EngineResult<()> {
        self.record("drop_db");
        self.inner.drop_db(txn, db, delete)
    }

    fn db_stat(&self, txn: TxnHandle, db: DbHandle) -> EngineResult<DbStat> {
        self.record("db_stat");
        self.inner.db_stat(txn, db)
    }

    fn open_cursor(&self, txn: TxnHandle, db: DbHandle) -> EngineResult<CursorHandle> {
        self.record("open_cursor");
        self.inner.open_cursor(txn, db)
    }

    fn close_cursor(&self, cursor: CursorHandle) {
        self.record("close_cursor");
        self.inner.close_cursor(cursor);
    }

    fn cursor_move(
        &self,
        cursor: CursorHandle,
        op: CursorOp,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> EngineResult<(Vec<u8>, Vec<u8>)> {
        self.record("cursor_move");
        self.inner.cursor_move(cursor, op, key, value)
    }

    fn put(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key: &[u8],
        value: &[u8],
        flags: PutFlags,
    ) -> EngineResult<()> {
        self.record("put");
        if let Some(status) = self.faults.lock().put.take() {
            return Err(status);
        }
        self.inner.put(txn, db, key, value, flags)
    }

    fn delete(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> EngineResult<()> {
        self.record("delete");
        self.inner.delete(txn, db, key, value)
    }

    fn get(&self, txn: TxnHandle, db: DbHandle, key: &[u8]) -> EngineResult<Vec<u8>> {
        self.record("get");
        self.inner.get(txn, db, key)
    }

    fn copy_env(&self, env: EnvHandle, destination: &Path) -> EngineResult<()> {
        self.record("copy_env");
        self.inner.copy_env(env, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(engine: &FaultyEngine) -> TxnHandle {
        let env = engine.open_env(&EnvOptions::default()).unwrap();
        engine.begin_txn(env, None, TxnFlags::empty()).unwrap()
    }

    #[test]
    fn kept_commit_leaves_transaction_live() {
        let engine = FaultyEngine::new();
        let txn = begin(&engine);
        engine.fail_next_commit(Status::IO, CommitOutcome::Kept);
        assert_eq!(engine.commit_txn(txn), Err(Status::IO));
        assert_eq!(engine.txn_status(txn), TxnStatus::Live);
        engine.abort_txn(txn);
        assert_eq!(engine.txn_status(txn), TxnStatus::Released);
    }

    #[test]
    fn released_commit_frees_the_writer() {
        let engine = FaultyEngine::new();
        let txn = begin(&engine);
        engine.fail_next_commit(Status::MAP_FULL, CommitOutcome::Released);
        assert_eq!(engine.commit_txn(txn), Err(Status::MAP_FULL));
        assert_eq!(engine.txn_status(txn), TxnStatus::Released);
        assert_eq!(engine.inner().live_txn_count(), 0);
    }

    #[test]
    fn faults_fire_once_and_calls_are_counted() {
        let engine = FaultyEngine::new();
        let txn = begin(&engine);
        let db = engine.open_db(txn, None, DbFlags::empty()).unwrap();
        engine.fail_next_put(Status::TXN_FULL);
        assert_eq!(
            engine.put(txn, db, b"k", b"v", PutFlags::empty()),
            Err(Status::TXN_FULL)
        );
        assert!(engine.put(txn, db, b"k", b"v", PutFlags::empty()).is_ok());
        assert_eq!(engine.calls("put"), 2);
        assert_eq!(engine.calls("open_db"), 1);
    }
}
