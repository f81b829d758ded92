//! Per-transaction cursor bookkeeping.

use lightkv_engine::{CursorHandle, Engine};
use parking_lot::Mutex;
use std::collections::HashSet;

/// The set of cursors a transaction has open.
///
/// Owns cursor lifetime: a cursor is usable only while its handle is
/// registered here.
#[derive(Debug, Default)]
pub(crate) struct CursorRegistry {
    open: Mutex<HashSet<CursorHandle>>,
}

impl CursorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, handle: CursorHandle) {
        self.open.lock().insert(handle);
    }

    pub(crate) fn contains(&self, handle: CursorHandle) -> bool {
        self.open.lock().contains(&handle)
    }

    /// Closes one cursor. Returns false if it was already gone.
    ///
    /// The entry is removed before the engine call so the registry never
    /// keeps a handle the engine no longer knows.
    pub(crate) fn close(&self, engine: &dyn Engine, handle: CursorHandle) -> bool {
        let mut open = self.open.lock();
        if !open.remove(&handle) {
            return false;
        }
        engine.close_cursor(handle);
        true
    }

    /// Forgets every cursor. Used when the owning transaction ends or
    /// resets; the engine has already invalidated the handles.
    pub(crate) fn close_all(&self) -> usize {
        let mut open = self.open.lock();
        let count = open.len();
        open.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.open.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightkv_engine::{DbFlags, EnvOptions, MemoryEngine, TxnFlags};

    #[test]
    fn close_removes_and_releases() {
        let engine = MemoryEngine::new();
        let env = engine.open_env(&EnvOptions::default()).unwrap();
        let txn = engine.begin_txn(env, None, TxnFlags::empty()).unwrap();
        let db = engine.open_db(txn, None, DbFlags::empty()).unwrap();
        let cursor = engine.open_cursor(txn, db).unwrap();

        let registry = CursorRegistry::new();
        registry.register(cursor);
        assert!(registry.contains(cursor));

        assert!(registry.close(&engine, cursor));
        assert!(!registry.contains(cursor));
        assert_eq!(engine.open_cursor_count(), 0);
        assert!(!registry.close(&engine, cursor));
    }

    #[test]
    fn close_all_only_touches_bookkeeping() {
        let registry = CursorRegistry::new();
        registry.register(CursorHandle::from_raw(1));
        registry.register(CursorHandle::from_raw(2));
        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.len(), 0);
    }
}
