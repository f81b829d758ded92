//! In-process reference engine.

use crate::engine::Engine;
use crate::persist::{self, Catalog};
use crate::status::{EngineResult, Status};
use crate::table::Table;
use crate::types::{
    CursorHandle, CursorOp, DbFlags, DbHandle, DbStat, EngineVersion, EnvFlags, EnvHandle,
    EnvOptions, KeyCompare, PutFlags, TxnFlags, TxnHandle, TxnStatus,
};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An engine that keeps every environment in process memory.
///
/// This engine implements the full primitive contract and is suitable for:
/// - Unit and integration tests
/// - Ephemeral environments
/// - Small persisted environments: when [`EnvOptions::path`] is set, the
///   committed state is loaded at open and rewritten atomically on every
///   root write commit
///
/// # Concurrency
///
/// One live root write transaction per environment; further writers block
/// until it ends. Readers work on immutable snapshots and never block.
///
/// # Example
///
/// ```rust
/// use lightkv_engine::{DbFlags, Engine, EnvOptions, MemoryEngine, PutFlags, TxnFlags};
///
/// let engine = MemoryEngine::new();
/// let env = engine.open_env(&EnvOptions::default()).unwrap();
/// let txn = engine.begin_txn(env, None, TxnFlags::empty()).unwrap();
/// let db = engine.open_db(txn, None, DbFlags::empty()).unwrap();
/// engine.put(txn, db, b"key", b"value", PutFlags::empty()).unwrap();
/// assert_eq!(engine.get(txn, db, b"key").unwrap(), b"value");
/// engine.commit_txn(txn).unwrap();
/// ```
#[derive(Default)]
pub struct MemoryEngine {
    next_id: AtomicU64,
    state: Mutex<EngineState>,
    writer_released: Condvar,
}

#[derive(Default)]
struct EngineState {
    envs: HashMap<EnvHandle, EnvSlot>,
    txns: HashMap<TxnHandle, TxnRecord>,
    cursors: HashMap<CursorHandle, CursorRecord>,
}

#[derive(Clone, Copy, Default)]
struct Comparators {
    key: Option<KeyCompare>,
    dup: Option<KeyCompare>,
}

struct EnvSlot {
    options: EnvOptions,
    committed: Arc<Catalog>,
    dbis: HashMap<DbHandle, Option<String>>,
    comparators: HashMap<Option<String>, Comparators>,
    readers: u32,
    writer: Option<TxnHandle>,
    _lock: Option<File>,
}

enum View {
    Snapshot(Arc<Catalog>),
    Working(Catalog),
    Detached,
}

struct TxnRecord {
    env: EnvHandle,
    parent: Option<TxnHandle>,
    child: Option<TxnHandle>,
    read_only: bool,
    status: TxnStatus,
    view: View,
}

struct CursorRecord {
    txn: TxnHandle,
    db: DbHandle,
    position: Option<(Vec<u8>, Vec<u8>)>,
}

impl View {
    fn catalog(&self) -> Option<&Catalog> {
        match self {
            View::Snapshot(catalog) => Some(catalog),
            View::Working(catalog) => Some(catalog),
            View::Detached => None,
        }
    }
}

impl MemoryEngine {
    /// Engine name used by engine selection.
    pub const NAME: &'static str = "memory";

    /// Creates an engine with no open environments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live transactions across all environments.
    #[must_use]
    pub fn live_txn_count(&self) -> usize {
        self.state.lock().txns.len()
    }

    /// Returns the number of open cursors across all environments.
    #[must_use]
    pub fn open_cursor_count(&self) -> usize {
        self.state.lock().cursors.len()
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl EngineState {
    fn env(&self, env: EnvHandle) -> EngineResult<&EnvSlot> {
        self.envs.get(&env).ok_or(Status::INVALID)
    }

    /// Returns a transaction that may run data operations.
    fn usable_txn(&self, txn: TxnHandle) -> EngineResult<&TxnRecord> {
        let record = self.txns.get(&txn).ok_or(Status::BAD_TXN)?;
        if record.status != TxnStatus::Live || record.child.is_some() {
            return Err(Status::BAD_TXN);
        }
        Ok(record)
    }

    fn db_name(&self, env: EnvHandle, db: DbHandle) -> EngineResult<Option<String>> {
        self.env(env)?.dbis.get(&db).cloned().ok_or(Status::BAD_DBI)
    }

    fn table(&self, txn: TxnHandle, db: DbHandle) -> EngineResult<&Table> {
        let record = self.usable_txn(txn)?;
        let name = self.db_name(record.env, db)?;
        record
            .view
            .catalog()
            .and_then(|catalog| catalog.get(&name))
            .map(|table| table.as_ref())
            .ok_or(Status::BAD_DBI)
    }

    fn table_mut(&mut self, txn: TxnHandle, db: DbHandle) -> EngineResult<(&mut Table, u64)> {
        let record = self.usable_txn(txn)?;
        if record.read_only {
            return Err(Status::ACCESS);
        }
        let name = self.db_name(record.env, db)?;
        let map_size = self.env(record.env)?.options.map_size;
        let record = self.txns.get_mut(&txn).ok_or(Status::BAD_TXN)?;
        match &mut record.view {
            View::Working(catalog) => {
                let table = catalog.get_mut(&name).ok_or(Status::BAD_DBI)?;
                Ok((Arc::make_mut(table), map_size))
            }
            _ => Err(Status::ACCESS),
        }
    }

    fn working_bytes(&self, txn: TxnHandle) -> u64 {
        self.txns
            .get(&txn)
            .and_then(|record| record.view.catalog())
            .map(|catalog| catalog.values().map(|t| t.bytes()).sum())
            .unwrap_or(0)
    }

    fn mark_broken(&mut self, txn: TxnHandle) {
        if let Some(record) = self.txns.get_mut(&txn) {
            record.status = TxnStatus::Broken;
        }
    }

    /// Releases a transaction and its live descendants, youngest first.
    fn release(&mut self, txn: TxnHandle) -> bool {
        let Some(child) = self.txns.get(&txn).map(|r| r.child) else {
            return false;
        };
        if let Some(child) = child {
            self.release(child);
        }

        self.cursors.retain(|_, cursor| cursor.txn != txn);
        let Some(record) = self.txns.remove(&txn) else {
            return false;
        };

        let mut writer_released = false;
        if let Some(parent) = record.parent {
            if let Some(parent) = self.txns.get_mut(&parent) {
                parent.child = None;
            }
        } else if let Some(env) = self.envs.get_mut(&record.env) {
            if env.writer == Some(txn) {
                env.writer = None;
                writer_released = true;
            } else if record.read_only && record.status == TxnStatus::Live {
                env.readers = env.readers.saturating_sub(1);
            }
        }
        writer_released
    }
}

fn status_from_lock_error(err: io::Error) -> Status {
    if err.kind() == io::ErrorKind::WouldBlock {
        Status::BUSY
    } else {
        Status::from(err)
    }
}

impl Engine for MemoryEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn version(&self) -> EngineVersion {
        EngineVersion {
            major: 0,
            minor: 9,
            patch: 70,
        }
    }

    fn open_env(&self, options: &EnvOptions) -> EngineResult<EnvHandle> {
        let read_only = options.flags.contains(EnvFlags::READ_ONLY);
        let (lock, committed) = match &options.path {
            Some(path) => {
                if !path.is_dir() {
                    if read_only {
                        return Err(Status::INVALID);
                    }
                    std::fs::create_dir_all(path)?;
                }
                let lock = if options.flags.contains(EnvFlags::NO_LOCK) {
                    None
                } else {
                    Some(persist::lock_directory(path).map_err(status_from_lock_error)?)
                };
                (lock, persist::read_image(path)?)
            }
            None => (None, None),
        };

        let mut committed = committed.unwrap_or_default();
        committed
            .entry(None)
            .or_insert_with(|| Arc::new(Table::new(DbFlags::empty())));

        let handle = EnvHandle::from_raw(self.allocate());
        self.state.lock().envs.insert(
            handle,
            EnvSlot {
                options: options.clone(),
                committed: Arc::new(committed),
                dbis: HashMap::new(),
                comparators: HashMap::new(),
                readers: 0,
                writer: None,
                _lock: lock,
            },
        );
        Ok(handle)
    }

    fn close_env(&self, env: EnvHandle) {
        let mut state = self.state.lock();
        let roots: Vec<TxnHandle> = state
            .txns
            .iter()
            .filter(|(_, r)| r.env == env && r.parent.is_none())
            .map(|(h, _)| *h)
            .collect();
        for txn in roots {
            state.release(txn);
        }
        state.envs.remove(&env);
        drop(state);
        self.writer_released.notify_all();
    }

    fn begin_txn(
        &self,
        env: EnvHandle,
        parent: Option<TxnHandle>,
        flags: TxnFlags,
    ) -> EngineResult<TxnHandle> {
        let read_only = flags.contains(TxnFlags::READ_ONLY);
        let mut state = self.state.lock();

        if let Some(parent) = parent {
            let record = state.usable_txn(parent)?;
            if record.env != env || record.read_only || read_only {
                return Err(Status::INVALID);
            }
            let view = match &record.view {
                View::Working(catalog) => View::Working(catalog.clone()),
                _ => return Err(Status::BAD_TXN),
            };
            let handle = TxnHandle::from_raw(self.allocate());
            if let Some(record) = state.txns.get_mut(&parent) {
                record.child = Some(handle);
            }
            state.txns.insert(
                handle,
                TxnRecord {
                    env,
                    parent: Some(parent),
                    child: None,
                    read_only: false,
                    status: TxnStatus::Live,
                    view,
                },
            );
            return Ok(handle);
        }

        let handle = TxnHandle::from_raw(self.allocate());
        if read_only {
            let slot = state.envs.get_mut(&env).ok_or(Status::INVALID)?;
            if slot.readers >= slot.options.max_readers {
                return Err(Status::READERS_FULL);
            }
            slot.readers += 1;
            let view = View::Snapshot(Arc::clone(&slot.committed));
            state.txns.insert(
                handle,
                TxnRecord {
                    env,
                    parent: None,
                    child: None,
                    read_only: true,
                    status: TxnStatus::Live,
                    view,
                },
            );
            return Ok(handle);
        }

        // Single writer: wait for the current root writer to finish.
        loop {
            let slot = state.env(env)?;
            if slot.options.flags.contains(EnvFlags::READ_ONLY) {
                return Err(Status::ACCESS);
            }
            if slot.writer.is_none() {
                break;
            }
            self.writer_released.wait(&mut state);
        }
        let slot = state.envs.get_mut(&env).ok_or(Status::INVALID)?;
        slot.writer = Some(handle);
        let view = View::Working(slot.committed.as_ref().clone());
        state.txns.insert(
            handle,
            TxnRecord {
                env,
                parent: None,
                child: None,
                read_only: false,
                status: TxnStatus::Live,
                view,
            },
        );
        Ok(handle)
    }

    fn commit_txn(&self, txn: TxnHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        let Some(record) = state.txns.get(&txn) else {
            return Err(Status::BAD_TXN);
        };

        if record.status == TxnStatus::Broken || record.child.is_some() {
            // The engine aborts a transaction whose commit fails.
            let released = state.release(txn);
            drop(state);
            if released {
                self.writer_released.notify_all();
            }
            return Err(Status::BAD_TXN);
        }

        if record.read_only {
            state.release(txn);
            return Ok(());
        }
        if record.status != TxnStatus::Live {
            state.release(txn);
            return Err(Status::BAD_TXN);
        }

        let parent = record.parent;
        let env = record.env;
        let working = match state.txns.get_mut(&txn).map(|r| std::mem::replace(&mut r.view, View::Detached)) {
            Some(View::Working(catalog)) => catalog,
            _ => Catalog::new(),
        };

        let result = match parent {
            Some(parent) => {
                if let Some(parent) = state.txns.get_mut(&parent) {
                    parent.view = View::Working(working);
                }
                Ok(())
            }
            None => {
                let slot = state.envs.get_mut(&env).ok_or(Status::INVALID)?;
                let sync = !slot.options.flags.contains(EnvFlags::NO_SYNC);
                let persisted = match &slot.options.path {
                    Some(path) => persist::write_image(path, &working, sync).map_err(Status::from),
                    None => Ok(()),
                };
                if persisted.is_ok() {
                    slot.committed = Arc::new(working);
                }
                persisted
            }
        };

        let released = state.release(txn);
        drop(state);
        if released {
            self.writer_released.notify_all();
        }
        result
    }

    fn abort_txn(&self, txn: TxnHandle) {
        let released = self.state.lock().release(txn);
        if released {
            self.writer_released.notify_all();
        }
    }

    fn reset_txn(&self, txn: TxnHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        let record = state.txns.get_mut(&txn).ok_or(Status::BAD_TXN)?;
        if !record.read_only {
            return Err(Status::INVALID);
        }
        if record.status != TxnStatus::Live {
            return Err(Status::BAD_TXN);
        }
        record.status = TxnStatus::Reset;
        record.view = View::Detached;
        let env = record.env;
        state.cursors.retain(|_, cursor| cursor.txn != txn);
        if let Some(slot) = state.envs.get_mut(&env) {
            slot.readers = slot.readers.saturating_sub(1);
        }
        Ok(())
    }

    fn renew_txn(&self, txn: TxnHandle) -> EngineResult<()> {
        let mut state = self.state.lock();
        let env = match state.txns.get(&txn) {
            Some(record) if record.status == TxnStatus::Reset => record.env,
            Some(_) => return Err(Status::INVALID),
            None => return Err(Status::BAD_TXN),
        };
        let slot = state.envs.get_mut(&env).ok_or(Status::INVALID)?;
        if slot.readers >= slot.options.max_readers {
            return Err(Status::READERS_FULL);
        }
        slot.readers += 1;
        let snapshot = Arc::clone(&slot.committed);
        if let Some(record) = state.txns.get_mut(&txn) {
            record.status = TxnStatus::Live;
            record.view = View::Snapshot(snapshot);
        }
        Ok(())
    }

    fn txn_status(&self, txn: TxnHandle) -> TxnStatus {
        self.state
            .lock()
            .txns
            .get(&txn)
            .map(|record| record.status)
            .unwrap_or(TxnStatus::Released)
    }

    fn open_db(
        &self,
        txn: TxnHandle,
        name: Option<&str>,
        flags: DbFlags,
    ) -> EngineResult<DbHandle> {
        let mut state = self.state.lock();
        let record = state.usable_txn(txn)?;
        let env = record.env;
        let read_only = record.read_only;
        let key = name.map(str::to_string);
        let requested = DbFlags::from_bits_truncate(flags.bits() & DbFlags::PERSISTENT.bits());

        let existing = record
            .view
            .catalog()
            .and_then(|catalog| catalog.get(&key))
            .map(|table| table.flags());

        match existing {
            Some(stored) if stored != requested && key.is_some() => {
                return Err(Status::INCOMPATIBLE);
            }
            Some(_) => {}
            None => {
                if !flags.contains(DbFlags::CREATE) {
                    return Err(Status::NOT_FOUND);
                }
                if read_only {
                    return Err(Status::ACCESS);
                }
                let slot = state.env(env)?;
                let max_dbs = slot.options.max_dbs as usize;
                let comparators = slot.comparators.get(&key).copied().unwrap_or_default();
                let record = state.txns.get_mut(&txn).ok_or(Status::BAD_TXN)?;
                let View::Working(catalog) = &mut record.view else {
                    return Err(Status::ACCESS);
                };
                let named = catalog.keys().filter(|k| k.is_some()).count();
                if named >= max_dbs {
                    return Err(Status::DBS_FULL);
                }
                let mut table = Table::new(requested);
                if comparators.key.is_some() || comparators.dup.is_some() {
                    table.set_comparators(comparators.key, comparators.dup);
                }
                catalog.insert(key.clone(), Arc::new(table));
            }
        }

        let handle = DbHandle::from_raw(self.allocate());
        let slot = state.envs.get_mut(&env).ok_or(Status::INVALID)?;
        slot.dbis.insert(handle, key);
        Ok(handle)
    }

    fn set_compare(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key_compare: Option<KeyCompare>,
        dup_compare: Option<KeyCompare>,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        let env = state.usable_txn(txn)?.env;
        let name = state.db_name(env, db)?;
        let comparators = Comparators {
            key: key_compare,
            dup: dup_compare,
        };

        let slot = state.envs.get_mut(&env).ok_or(Status::INVALID)?;
        slot.comparators.insert(name.clone(), comparators);
        if slot.committed.contains_key(&name) {
            let mut committed = slot.committed.as_ref().clone();
            if let Some(table) = committed.get_mut(&name) {
                Arc::make_mut(table).set_comparators(key_compare, dup_compare);
            }
            slot.committed = Arc::new(committed);
        }

        // Every live view of this environment must agree on the order.
        for record in state.txns.values_mut().filter(|r| r.env == env) {
            match &mut record.view {
                View::Working(catalog) => {
                    if let Some(table) = catalog.get_mut(&name) {
                        Arc::make_mut(table).set_comparators(key_compare, dup_compare);
                    }
                }
                View::Snapshot(snapshot) => {
                    if snapshot.contains_key(&name) {
                        let catalog = Arc::make_mut(snapshot);
                        if let Some(table) = catalog.get_mut(&name) {
                            Arc::make_mut(table).set_comparators(key_compare, dup_compare);
                        }
                    }
                }
                View::Detached => {}
            }
        }
        Ok(())
    }

    fn close_db(&self, env: EnvHandle, db: DbHandle) {
        if let Some(slot) = self.state.lock().envs.get_mut(&env) {
            slot.dbis.remove(&db);
        }
    }

    fn drop_db(&self, txn: TxnHandle, db: DbHandle, delete: bool) -> EngineResult<()> {
        let mut state = self.state.lock();
        let record = state.usable_txn(txn)?;
        if record.read_only {
            return Err(Status::ACCESS);
        }
        let env = record.env;
        let name = state.db_name(env, db)?;

        if delete && name.is_some() {
            let record = state.txns.get_mut(&txn).ok_or(Status::BAD_TXN)?;
            if let View::Working(catalog) = &mut record.view {
                catalog.remove(&name).ok_or(Status::BAD_DBI)?;
            }
            state.cursors.retain(|_, cursor| cursor.db != db);
            if let Some(slot) = state.envs.get_mut(&env) {
                slot.dbis.remove(&db);
            }
        } else {
            let (table, _) = state.table_mut(txn, db)?;
            table.clear();
        }
        Ok(())
    }

    fn db_stat(&self, txn: TxnHandle, db: DbHandle) -> EngineResult<DbStat> {
        let state = self.state.lock();
        let table = state.table(txn, db)?;
        Ok(DbStat {
            entries: table.len() as u64,
            bytes: table.bytes(),
        })
    }

    fn open_cursor(&self, txn: TxnHandle, db: DbHandle) -> EngineResult<CursorHandle> {
        let mut state = self.state.lock();
        state.table(txn, db)?;
        let handle = CursorHandle::from_raw(self.allocate());
        state.cursors.insert(
            handle,
            CursorRecord {
                txn,
                db,
                position: None,
            },
        );
        Ok(handle)
    }

    fn close_cursor(&self, cursor: CursorHandle) {
        self.state.lock().cursors.remove(&cursor);
    }

    fn cursor_move(
        &self,
        cursor: CursorHandle,
        op: CursorOp,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> EngineResult<(Vec<u8>, Vec<u8>)> {
        let mut state = self.state.lock();
        let (txn, db, position) = {
            let record = state.cursors.get(&cursor).ok_or(Status::INVALID)?;
            (record.txn, record.db, record.position.clone())
        };
        let table = state.table(txn, db)?;
        let index = seek(table, op, position.as_ref(), key, value)?;
        let (k, v) = table.entry(index).ok_or(Status::NOT_FOUND)?;
        let pair = (k.to_vec(), v.to_vec());

        if let Some(record) = state.cursors.get_mut(&cursor) {
            record.position = Some(pair.clone());
        }
        Ok(pair)
    }

    fn put(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key: &[u8],
        value: &[u8],
        flags: PutFlags,
    ) -> EngineResult<()> {
        if key.is_empty() {
            return Err(Status::INVALID);
        }
        let mut state = self.state.lock();
        let used = state.working_bytes(txn);
        let (_, map_size) = state.table_mut(txn, db)?;
        if used + (key.len() + value.len()) as u64 > map_size {
            state.mark_broken(txn);
            return Err(Status::MAP_FULL);
        }
        let (table, _) = state.table_mut(txn, db)?;
        table.put(key, value, flags)
    }

    fn delete(
        &self,
        txn: TxnHandle,
        db: DbHandle,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        let (table, _) = state.table_mut(txn, db)?;
        table.delete(key, value)
    }

    fn get(&self, txn: TxnHandle, db: DbHandle, key: &[u8]) -> EngineResult<Vec<u8>> {
        let state = self.state.lock();
        state
            .table(txn, db)?
            .get(key)
            .map(<[u8]>::to_vec)
            .ok_or(Status::NOT_FOUND)
    }

    fn copy_env(&self, env: EnvHandle, destination: &Path) -> EngineResult<()> {
        let committed = Arc::clone(&self.state.lock().env(env)?.committed);
        persist::copy_image(destination, &committed)?;
        Ok(())
    }
}

/// Resolves a cursor operation to an entry index.
fn seek(
    table: &Table,
    op: CursorOp,
    position: Option<&(Vec<u8>, Vec<u8>)>,
    key: Option<&[u8]>,
    value: Option<&[u8]>,
) -> EngineResult<usize> {
    let len = table.len();
    let dup = table.is_dup_sort();
    let last = len.checked_sub(1);

    let dup_only = matches!(
        op,
        CursorOp::FirstDup
            | CursorOp::LastDup
            | CursorOp::NextDup
            | CursorOp::PrevDup
            | CursorOp::GetBothRange
    );
    if dup_only && !dup {
        return Err(Status::INCOMPATIBLE);
    }
    if op.needs_key() && key.is_none() {
        return Err(Status::INVALID);
    }
    if op.needs_value() && value.is_none() {
        return Err(Status::INVALID);
    }

    // Where the current position sits now: exact index, or insertion point
    // if the pair was deleted since.
    let current = position.map(|(k, v)| table.find(k, v));

    let index = match op {
        CursorOp::First => (len > 0).then_some(0),
        CursorOp::Last => last,
        CursorOp::Next => match current {
            None => (len > 0).then_some(0),
            Some(Ok(i)) => Some(i + 1),
            Some(Err(i)) => Some(i),
        },
        CursorOp::Prev => match current {
            None => last,
            Some(Ok(i)) | Some(Err(i)) => i.checked_sub(1),
        },
        CursorOp::GetCurrent => match current {
            None => return Err(Status::INVALID),
            Some(Ok(i)) => Some(i),
            Some(Err(_)) => None,
        },
        CursorOp::Set | CursorOp::SetKey => {
            let key = key.unwrap_or_default();
            let (start, end) = table.key_range(key);
            (start < end).then_some(start)
        }
        CursorOp::SetRange => Some(table.lower_bound(key.unwrap_or_default())),
        CursorOp::NextNoDup => match position {
            None => (len > 0).then_some(0),
            Some((k, _)) => Some(table.key_range(k).1),
        },
        CursorOp::PrevNoDup => match position {
            None => last,
            Some((k, _)) => table.key_range(k).0.checked_sub(1),
        },
        CursorOp::FirstDup | CursorOp::LastDup => {
            let (k, _) = position.ok_or(Status::INVALID)?;
            let (start, end) = table.key_range(k);
            if start == end {
                None
            } else if op == CursorOp::FirstDup {
                Some(start)
            } else {
                Some(end - 1)
            }
        }
        CursorOp::NextDup => {
            let (k, _) = position.ok_or(Status::INVALID)?;
            let (_, end) = table.key_range(k);
            let next = match current {
                Some(Ok(i)) => i + 1,
                Some(Err(i)) => i,
                None => end,
            };
            (next < end).then_some(next)
        }
        CursorOp::PrevDup => {
            let (k, _) = position.ok_or(Status::INVALID)?;
            let (start, _) = table.key_range(k);
            match current {
                Some(Ok(i)) | Some(Err(i)) if i > start => Some(i - 1),
                _ => None,
            }
        }
        CursorOp::GetBoth => {
            let key = key.unwrap_or_default();
            let value = value.unwrap_or_default();
            match table.find(key, value) {
                Ok(i) if dup || table.entry(i).map(|(_, v)| v) == Some(value) => Some(i),
                _ => None,
            }
        }
        CursorOp::GetBothRange => {
            let key = key.unwrap_or_default();
            let (_, end) = table.key_range(key);
            let i = table.lower_bound_pair(key, value.unwrap_or_default());
            (i < end).then_some(i)
        }
    };

    index.filter(|&i| i < len).ok_or(Status::NOT_FOUND)
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryEngine")
            .field("environments", &state.envs.len())
            .field("transactions", &state.txns.len())
            .field("cursors", &state.cursors.len())
            .finish()
    }
}
